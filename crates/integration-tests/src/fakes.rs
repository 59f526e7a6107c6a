//! In-memory fakes for the service seams.
//!
//! Each fake records its calls so scenarios can assert not just on the
//! outcome but on which providers were consulted.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use fizko_core::{Email, IdentityId, ProductCategory, SubscriptionTier};
use fizko_site::db::subscriptions::SubscriptionUpsert;
use fizko_site::db::RepositoryError;
use fizko_site::models::subscription::Subscription;
use fizko_site::services::access::SubscriptionStore;
use fizko_site::services::assistant::{AssistantError, AssistantReply, AssistantTransport};
use fizko_site::services::billing::{
    BillingError, BillingGrant, BillingProvider, CheckoutRequest, CheckoutSession,
};

/// Build a recurring grant for a category.
#[must_use]
pub fn recurring_grant(category: ProductCategory, tier: SubscriptionTier) -> BillingGrant {
    BillingGrant {
        category,
        recurring: true,
        tier: Some(tier),
        current_period_end: Some(Utc::now()),
        customer_id: "cus_test".to_owned(),
        subscription_id: Some("sub_test".to_owned()),
    }
}

/// Build a one-time payment grant for a category.
#[must_use]
pub fn one_time_grant(category: ProductCategory) -> BillingGrant {
    BillingGrant {
        category,
        recurring: false,
        tier: None,
        current_period_end: None,
        customer_id: "cus_test".to_owned(),
        subscription_id: None,
    }
}

/// Scriptable payment processor.
pub struct MemoryBilling {
    grants: Mutex<Vec<BillingGrant>>,
    down: Mutex<bool>,
    checkout_url: Mutex<Option<String>>,
    pub grants_calls: AtomicUsize,
    pub checkout_calls: AtomicUsize,
}

impl Default for MemoryBilling {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBilling {
    #[must_use]
    pub fn new() -> Self {
        Self {
            grants: Mutex::new(Vec::new()),
            down: Mutex::new(false),
            checkout_url: Mutex::new(Some("https://pay.test/session".to_owned())),
            grants_calls: AtomicUsize::new(0),
            checkout_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_grants(&self, grants: Vec<BillingGrant>) {
        *self.grants.lock().unwrap() = grants;
    }

    /// Simulate a processor outage (or recovery).
    pub fn set_down(&self, down: bool) {
        *self.down.lock().unwrap() = down;
    }

    /// Script the redirect URL returned by checkout creation.
    pub fn set_checkout_url(&self, url: Option<&str>) {
        *self.checkout_url.lock().unwrap() = url.map(str::to_owned);
    }
}

impl BillingProvider for MemoryBilling {
    async fn grants_for(&self, _email: &Email) -> Result<Vec<BillingGrant>, BillingError> {
        self.grants_calls.fetch_add(1, Ordering::SeqCst);
        if *self.down.lock().unwrap() {
            return Err(BillingError::Api {
                status: 503,
                message: "processor down".to_owned(),
            });
        }
        Ok(self.grants.lock().unwrap().clone())
    }

    async fn create_checkout(
        &self,
        _request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        self.checkout_calls.fetch_add(1, Ordering::SeqCst);
        if *self.down.lock().unwrap() {
            return Err(BillingError::Api {
                status: 503,
                message: "processor down".to_owned(),
            });
        }
        Ok(CheckoutSession {
            id: "cs_test".to_owned(),
            url: self.checkout_url.lock().unwrap().clone(),
        })
    }
}

/// In-memory subscription cache keyed by identity + category.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Subscription>>,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, row: Subscription) {
        self.rows.lock().unwrap().push(row);
    }

    #[must_use]
    pub fn rows(&self) -> Vec<Subscription> {
        self.rows.lock().unwrap().clone()
    }
}

impl SubscriptionStore for MemoryStore {
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
                    && r.status.grants_access()
            })
            .cloned())
    }

    async fn upsert_active(&self, entry: &SubscriptionUpsert) -> Result<(), RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|r| !(r.identity_id == entry.identity_id && r.category == entry.category));
        rows.push(Subscription {
            identity_id: entry.identity_id,
            email: entry.email.clone(),
            category: entry.category,
            status: entry.status,
            tier: entry.tier,
            current_period_end: entry.current_period_end,
            processor_customer_id: entry.processor_customer_id.clone(),
            processor_subscription_id: entry.processor_subscription_id.clone(),
            updated_at: Utc::now(),
        });
        Ok(())
    }
}

/// One scripted assistant turn.
pub enum AssistantStep {
    Reply(&'static str),
    Fail,
}

/// Assistant transport that plays back a script.
pub struct ScriptedAssistant {
    script: Mutex<VecDeque<AssistantStep>>,
    pub calls: AtomicUsize,
}

impl ScriptedAssistant {
    #[must_use]
    pub fn new(steps: Vec<AssistantStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A transport that answers every turn with the same text.
    #[must_use]
    pub fn always(reply: &'static str, turns: usize) -> Self {
        Self::new((0..turns).map(|_| AssistantStep::Reply(reply)).collect())
    }
}

impl AssistantTransport for ScriptedAssistant {
    async fn send(
        &self,
        _message: &str,
        _conversation_id: Option<&str>,
        _user_id: Option<&str>,
    ) -> Result<AssistantReply, AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(AssistantStep::Reply(text)) => Ok(AssistantReply {
                text: text.to_owned(),
                conversation_id: Some("conv_test".to_owned()),
            }),
            Some(AssistantStep::Fail) | None => Err(AssistantError::EmptyReply),
        }
    }
}
