//! Access resolution.
//!
//! Decides whether an identity may use a paid category by merging three
//! sources, in precedence order: the administrator allow-list, the local
//! subscription cache, and the payment processor. The processor is the
//! source of truth; the cache exists so a processor outage degrades to
//! the last known answer instead of locking paying customers out.

use thiserror::Error;
use tracing::{instrument, warn};

use fizko_core::{Email, IdentityId, ProductCategory, SubscriptionStatus, SubscriptionTier};

use crate::db::subscriptions::{SubscriptionRepository, SubscriptionUpsert};
use crate::db::RepositoryError;
use crate::models::subscription::Subscription;
use crate::services::billing::{BillingError, BillingGrant, BillingProvider};

/// Errors from access resolution.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The local subscription cache failed.
    #[error("subscription store error: {0}")]
    Store(#[from] RepositoryError),

    /// The processor is unreachable and no cached decision exists. The
    /// category's status is unknown, which is not a denial.
    #[error("access temporarily unavailable: {0}")]
    Unavailable(#[source] BillingError),
}

/// Which source granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSource {
    /// Administrator allow-list.
    Administrator,
    /// Local subscription cache.
    Cache,
    /// Live payment processor answer.
    Processor,
}

/// The outcome of resolving one identity + category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub granted: bool,
    /// Present only when granted.
    pub source: Option<AccessSource>,
    /// Tier of the granting subscription, when recurring.
    pub tier: Option<SubscriptionTier>,
}

impl AccessDecision {
    #[must_use]
    pub const fn granted(source: AccessSource, tier: Option<SubscriptionTier>) -> Self {
        Self {
            granted: true,
            source: Some(source),
            tier,
        }
    }

    #[must_use]
    pub const fn denied() -> Self {
        Self {
            granted: false,
            source: None,
            tier: None,
        }
    }
}

/// Read/write seam over the local subscription cache.
#[allow(async_fn_in_trait)]
pub trait SubscriptionStore {
    /// The active cached row for an identity + category, if any.
    async fn active_for(
        &self,
        identity_id: IdentityId,
        category: ProductCategory,
    ) -> Result<Option<Subscription>, RepositoryError>;

    /// Idempotent upsert keyed by identity + category.
    async fn upsert_active(&self, entry: &SubscriptionUpsert) -> Result<(), RepositoryError>;
}

impl SubscriptionStore for SubscriptionRepository<'_> {
    async fn active_for(
        &self,
        identity_id: IdentityId,
        category: ProductCategory,
    ) -> Result<Option<Subscription>, RepositoryError> {
        self.find_active(identity_id, category).await
    }

    async fn upsert_active(&self, entry: &SubscriptionUpsert) -> Result<(), RepositoryError> {
        self.upsert(entry).await
    }
}

/// Merges allow-list, cache, and processor into one access decision.
pub struct AccessResolver<'a, B, S> {
    admin_emails: &'a [String],
    billing: &'a B,
    store: &'a S,
}

impl<'a, B, S> AccessResolver<'a, B, S>
where
    B: BillingProvider,
    S: SubscriptionStore,
{
    #[must_use]
    pub const fn new(admin_emails: &'a [String], billing: &'a B, store: &'a S) -> Self {
        Self {
            admin_emails,
            billing,
            store,
        }
    }

    /// Exact, case-sensitive allow-list membership.
    fn is_admin(&self, email: &Email) -> bool {
        self.admin_emails.iter().any(|a| a == email.as_str())
    }

    /// Cache-first resolution, used on every gated request.
    ///
    /// Allow-list wins outright with no store read and no processor
    /// call. A cached active row answers next. Only a cache miss reaches
    /// the processor; a grant there is written back so the next request
    /// stays local.
    ///
    /// # Errors
    ///
    /// `AccessError::Unavailable` when the processor is down and no
    /// cached row exists; `AccessError::Store` when the cache fails.
    #[instrument(skip(self, email), fields(category = %category.as_str()))]
    pub async fn resolve(
        &self,
        identity_id: IdentityId,
        email: &Email,
        category: ProductCategory,
    ) -> Result<AccessDecision, AccessError> {
        if self.is_admin(email) {
            return Ok(AccessDecision::granted(AccessSource::Administrator, None));
        }

        if let Some(row) = self.store.active_for(identity_id, category).await? {
            return Ok(AccessDecision::granted(AccessSource::Cache, row.tier));
        }

        match self.billing.grants_for(email).await {
            Ok(grants) => {
                self.apply_grants(identity_id, email, category, &grants)
                    .await
            }
            // No cached row to fall back on at this point.
            Err(e) => Err(AccessError::Unavailable(e)),
        }
    }

    /// Processor-first resolution, used by the account dashboard so it
    /// reflects new purchases immediately.
    ///
    /// Identical fallback semantics: a processor failure degrades to the
    /// cached row, and only the absence of both is reported as
    /// unavailable.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve`].
    #[instrument(skip(self, email), fields(category = %category.as_str()))]
    pub async fn refresh(
        &self,
        identity_id: IdentityId,
        email: &Email,
        category: ProductCategory,
    ) -> Result<AccessDecision, AccessError> {
        if self.is_admin(email) {
            return Ok(AccessDecision::granted(AccessSource::Administrator, None));
        }

        match self.billing.grants_for(email).await {
            Ok(grants) => {
                self.apply_grants(identity_id, email, category, &grants)
                    .await
            }
            Err(e) => {
                warn!(error = %e, "processor unreachable, falling back to cached decision");
                match self.store.active_for(identity_id, category).await? {
                    Some(row) => Ok(AccessDecision::granted(AccessSource::Cache, row.tier)),
                    None => Err(AccessError::Unavailable(e)),
                }
            }
        }
    }

    /// Turn a processor answer into a decision, caching a matching grant.
    ///
    /// Zero matching grants leave the cache untouched: an absence of
    /// entitlement is not a fact worth recording, and writing it would
    /// race a checkout completing concurrently.
    async fn apply_grants(
        &self,
        identity_id: IdentityId,
        email: &Email,
        category: ProductCategory,
        grants: &[BillingGrant],
    ) -> Result<AccessDecision, AccessError> {
        let matching: Vec<&BillingGrant> =
            grants.iter().filter(|g| g.category == category).collect();

        // Subscription or one-time payment both grant; when both exist,
        // the recurring one carries tier and period data.
        let Some(grant) = matching
            .iter()
            .find(|g| g.recurring)
            .or_else(|| matching.first())
        else {
            return Ok(AccessDecision::denied());
        };

        self.store
            .upsert_active(&SubscriptionUpsert {
                identity_id,
                email: email.clone(),
                category,
                status: SubscriptionStatus::Active,
                tier: grant.tier,
                current_period_end: grant.current_period_end,
                processor_customer_id: Some(grant.customer_id.clone()),
                processor_subscription_id: grant.subscription_id.clone(),
            })
            .await?;

        Ok(AccessDecision::granted(AccessSource::Processor, grant.tier))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::Utc;
    use uuid::Uuid;

    use crate::services::billing::{CheckoutRequest, CheckoutSession};

    use super::*;

    struct FakeBilling {
        grants: Vec<BillingGrant>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeBilling {
        fn with_grants(grants: Vec<BillingGrant>) -> Self {
            Self {
                grants,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn down() -> Self {
            Self {
                grants: Vec::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl BillingProvider for FakeBilling {
        async fn grants_for(&self, _email: &Email) -> Result<Vec<BillingGrant>, BillingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BillingError::Api {
                    status: 503,
                    message: "processor down".to_owned(),
                });
            }
            Ok(self.grants.clone())
        }

        async fn create_checkout(
            &self,
            _request: &CheckoutRequest,
        ) -> Result<CheckoutSession, BillingError> {
            unreachable!("resolution never creates checkouts")
        }
    }

    #[derive(Default)]
    struct FakeStore {
        rows: Mutex<Vec<Subscription>>,
        reads: AtomicUsize,
        upserts: Mutex<Vec<SubscriptionUpsert>>,
    }

    impl FakeStore {
        fn with_row(row: Subscription) -> Self {
            Self {
                rows: Mutex::new(vec![row]),
                ..Self::default()
            }
        }

        fn read_count(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn upserted(&self) -> Vec<SubscriptionUpsert> {
            self.upserts.lock().unwrap().clone()
        }
    }

    impl SubscriptionStore for FakeStore {
        async fn active_for(
            &self,
            identity_id: IdentityId,
            category: ProductCategory,
        ) -> Result<Option<Subscription>, RepositoryError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| {
                    r.identity_id == identity_id
                        && r.category == category
                        && r.status == SubscriptionStatus::Active
                })
                .cloned())
        }

        async fn upsert_active(&self, entry: &SubscriptionUpsert) -> Result<(), RepositoryError> {
            self.upserts.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn identity() -> IdentityId {
        IdentityId::from(Uuid::from_u128(7))
    }

    fn email(addr: &str) -> Email {
        Email::parse(addr).unwrap()
    }

    fn recurring_grant(category: ProductCategory, tier: SubscriptionTier) -> BillingGrant {
        BillingGrant {
            category,
            recurring: true,
            tier: Some(tier),
            current_period_end: Some(Utc::now()),
            customer_id: "cus_123".to_owned(),
            subscription_id: Some("sub_123".to_owned()),
        }
    }

    fn one_time_grant(category: ProductCategory) -> BillingGrant {
        BillingGrant {
            category,
            recurring: false,
            tier: None,
            current_period_end: None,
            customer_id: "cus_123".to_owned(),
            subscription_id: None,
        }
    }

    fn active_row(category: ProductCategory) -> Subscription {
        Subscription {
            identity_id: identity(),
            email: email("cached@fizko.com.br"),
            category,
            status: SubscriptionStatus::Active,
            tier: Some(SubscriptionTier::Basic),
            current_period_end: None,
            processor_customer_id: Some("cus_123".to_owned()),
            processor_subscription_id: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn admin_short_circuits_store_and_billing() {
        let admins = vec!["ops@fizko.com.br".to_owned()];
        let billing = FakeBilling::down();
        let store = FakeStore::default();
        let resolver = AccessResolver::new(&admins, &billing, &store);

        let decision = resolver
            .resolve(
                identity(),
                &email("ops@fizko.com.br"),
                ProductCategory::TablesFarmacia,
            )
            .await
            .unwrap();

        assert!(decision.granted);
        assert_eq!(decision.source, Some(AccessSource::Administrator));
        assert_eq!(billing.call_count(), 0);
        assert_eq!(store.read_count(), 0);
        assert!(store.upserted().is_empty());
    }

    #[tokio::test]
    async fn admin_match_is_case_sensitive() {
        let admins = vec!["Ops@fizko.com.br".to_owned()];
        let billing = FakeBilling::with_grants(Vec::new());
        let store = FakeStore::default();
        let resolver = AccessResolver::new(&admins, &billing, &store);

        let decision = resolver
            .resolve(
                identity(),
                &email("ops@fizko.com.br"),
                ProductCategory::Subscription,
            )
            .await
            .unwrap();

        assert!(!decision.granted);
        assert_eq!(billing.call_count(), 1);
    }

    #[tokio::test]
    async fn cached_active_row_grants_without_billing_call() {
        let admins = Vec::new();
        let billing = FakeBilling::down();
        let store = FakeStore::with_row(active_row(ProductCategory::ChatbotPremium));
        let resolver = AccessResolver::new(&admins, &billing, &store);

        let decision = resolver
            .resolve(
                identity(),
                &email("user@x.com"),
                ProductCategory::ChatbotPremium,
            )
            .await
            .unwrap();

        assert!(decision.granted);
        assert_eq!(decision.source, Some(AccessSource::Cache));
        assert_eq!(decision.tier, Some(SubscriptionTier::Basic));
        assert_eq!(billing.call_count(), 0);
    }

    #[tokio::test]
    async fn processor_grant_is_cached_and_granted() {
        let admins = Vec::new();
        let billing = FakeBilling::with_grants(vec![recurring_grant(
            ProductCategory::Subscription,
            SubscriptionTier::Premium,
        )]);
        let store = FakeStore::default();
        let resolver = AccessResolver::new(&admins, &billing, &store);

        let decision = resolver
            .resolve(
                identity(),
                &email("user@x.com"),
                ProductCategory::Subscription,
            )
            .await
            .unwrap();

        assert!(decision.granted);
        assert_eq!(decision.source, Some(AccessSource::Processor));
        assert_eq!(decision.tier, Some(SubscriptionTier::Premium));

        let upserts = store.upserted();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].category, ProductCategory::Subscription);
        assert_eq!(upserts[0].status, SubscriptionStatus::Active);
        assert_eq!(upserts[0].processor_subscription_id.as_deref(), Some("sub_123"));
    }

    #[tokio::test]
    async fn one_time_payment_grants_table_category() {
        let admins = Vec::new();
        let billing =
            FakeBilling::with_grants(vec![one_time_grant(ProductCategory::TablesHortifruti)]);
        let store = FakeStore::default();
        let resolver = AccessResolver::new(&admins, &billing, &store);

        let decision = resolver
            .resolve(
                identity(),
                &email("user@x.com"),
                ProductCategory::TablesHortifruti,
            )
            .await
            .unwrap();

        assert!(decision.granted);
        assert_eq!(decision.tier, None);
        assert_eq!(store.upserted().len(), 1);
    }

    #[tokio::test]
    async fn zero_grants_denies_without_upsert() {
        let admins = Vec::new();
        let billing = FakeBilling::with_grants(vec![recurring_grant(
            ProductCategory::ChatbotPremium,
            SubscriptionTier::Basic,
        )]);
        let store = FakeStore::default();
        let resolver = AccessResolver::new(&admins, &billing, &store);

        // The grant is for a different category.
        let decision = resolver
            .resolve(
                identity(),
                &email("user@x.com"),
                ProductCategory::TablesFarmacia,
            )
            .await
            .unwrap();

        assert!(!decision.granted);
        assert!(store.upserted().is_empty());
    }

    #[tokio::test]
    async fn billing_failure_without_cache_is_unavailable_not_denial() {
        let admins = Vec::new();
        let billing = FakeBilling::down();
        let store = FakeStore::default();
        let resolver = AccessResolver::new(&admins, &billing, &store);

        let result = resolver
            .resolve(
                identity(),
                &email("user@x.com"),
                ProductCategory::Subscription,
            )
            .await;

        assert!(matches!(result, Err(AccessError::Unavailable(_))));
    }

    #[tokio::test]
    async fn refresh_falls_back_to_cache_when_processor_is_down() {
        let admins = Vec::new();
        let billing = FakeBilling::down();
        let store = FakeStore::with_row(active_row(ProductCategory::Subscription));
        let resolver = AccessResolver::new(&admins, &billing, &store);

        let decision = resolver
            .refresh(
                identity(),
                &email("user@x.com"),
                ProductCategory::Subscription,
            )
            .await
            .unwrap();

        assert!(decision.granted);
        assert_eq!(decision.source, Some(AccessSource::Cache));
        assert_eq!(billing.call_count(), 1);
    }

    #[tokio::test]
    async fn refresh_consults_processor_before_cache() {
        let admins = Vec::new();
        let billing = FakeBilling::with_grants(vec![recurring_grant(
            ProductCategory::Subscription,
            SubscriptionTier::Enterprise,
        )]);
        let store = FakeStore::with_row(active_row(ProductCategory::Subscription));
        let resolver = AccessResolver::new(&admins, &billing, &store);

        let decision = resolver
            .refresh(
                identity(),
                &email("user@x.com"),
                ProductCategory::Subscription,
            )
            .await
            .unwrap();

        assert_eq!(decision.source, Some(AccessSource::Processor));
        assert_eq!(decision.tier, Some(SubscriptionTier::Enterprise));
    }

    #[tokio::test]
    async fn recurring_grant_preferred_over_one_time_for_same_category() {
        let admins = Vec::new();
        let billing = FakeBilling::with_grants(vec![
            one_time_grant(ProductCategory::ChatbotPremium),
            recurring_grant(ProductCategory::ChatbotPremium, SubscriptionTier::Basic),
        ]);
        let store = FakeStore::default();
        let resolver = AccessResolver::new(&admins, &billing, &store);

        let decision = resolver
            .resolve(
                identity(),
                &email("user@x.com"),
                ProductCategory::ChatbotPremium,
            )
            .await
            .unwrap();

        assert_eq!(decision.tier, Some(SubscriptionTier::Basic));
        let upserts = store.upserted();
        assert_eq!(upserts.len(), 1);
        assert!(upserts[0].processor_subscription_id.is_some());
    }
}
