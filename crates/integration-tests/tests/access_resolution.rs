//! Access resolution scenarios across allow-list, cache, and processor.

#![allow(clippy::unwrap_used)]

use uuid::Uuid;

use fizko_core::{Email, IdentityId, ProductCategory, SubscriptionTier};
use fizko_integration_tests::fakes::{recurring_grant, MemoryBilling, MemoryStore};
use fizko_site::services::access::{AccessError, AccessResolver, AccessSource};

fn identity() -> IdentityId {
    IdentityId::new(Uuid::from_u128(42))
}

fn email(addr: &str) -> Email {
    Email::parse(addr).unwrap()
}

/// An administrator with zero subscription rows and zero purchases gets
/// access to the pharmacy table, and resolution leaves no trace: no
/// processor call, no cache write.
#[tokio::test]
async fn administrator_uses_pharmacy_table_without_any_subscription() {
    let admins = vec!["fiscal@fizko.com.br".to_owned()];
    let billing = MemoryBilling::new();
    billing.set_down(true);
    let store = MemoryStore::new();
    let resolver = AccessResolver::new(&admins, &billing, &store);

    let decision = resolver
        .resolve(
            identity(),
            &email("fiscal@fizko.com.br"),
            ProductCategory::TablesFarmacia,
        )
        .await
        .unwrap();

    assert!(decision.granted);
    assert_eq!(decision.source, Some(AccessSource::Administrator));
    assert_eq!(billing.grants_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(store.rows().is_empty());
}

/// First resolution reaches the processor and caches the grant; the
/// second is answered locally.
#[tokio::test]
async fn second_resolution_is_served_from_cache() {
    let admins = Vec::new();
    let billing = MemoryBilling::new();
    billing.set_grants(vec![recurring_grant(
        ProductCategory::ChatbotPremium,
        SubscriptionTier::Premium,
    )]);
    let store = MemoryStore::new();
    let resolver = AccessResolver::new(&admins, &billing, &store);

    let first = resolver
        .resolve(identity(), &email("user@x.com"), ProductCategory::ChatbotPremium)
        .await
        .unwrap();
    assert_eq!(first.source, Some(AccessSource::Processor));
    assert_eq!(store.rows().len(), 1);

    let second = resolver
        .resolve(identity(), &email("user@x.com"), ProductCategory::ChatbotPremium)
        .await
        .unwrap();
    assert_eq!(second.source, Some(AccessSource::Cache));
    assert_eq!(second.tier, Some(SubscriptionTier::Premium));
    assert_eq!(
        billing.grants_calls.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

/// A subscriber keeps access through a processor outage because the
/// cached row answers for it.
#[tokio::test]
async fn subscriber_keeps_access_during_processor_outage() {
    let admins = Vec::new();
    let billing = MemoryBilling::new();
    billing.set_grants(vec![recurring_grant(
        ProductCategory::Subscription,
        SubscriptionTier::Enterprise,
    )]);
    let store = MemoryStore::new();
    let resolver = AccessResolver::new(&admins, &billing, &store);

    // Cache warms up while the processor is reachable.
    resolver
        .resolve(identity(), &email("user@x.com"), ProductCategory::Subscription)
        .await
        .unwrap();

    billing.set_down(true);

    let cached = resolver
        .resolve(identity(), &email("user@x.com"), ProductCategory::Subscription)
        .await
        .unwrap();
    assert!(cached.granted);
    assert_eq!(cached.source, Some(AccessSource::Cache));

    // The dashboard's processor-first path degrades the same way.
    let refreshed = resolver
        .refresh(identity(), &email("user@x.com"), ProductCategory::Subscription)
        .await
        .unwrap();
    assert!(refreshed.granted);
    assert_eq!(refreshed.source, Some(AccessSource::Cache));
}

/// With no cached decision and the processor down, the status is
/// unknown, which must never read as a denial.
#[tokio::test]
async fn outage_without_cache_reports_unavailable() {
    let admins = Vec::new();
    let billing = MemoryBilling::new();
    billing.set_down(true);
    let store = MemoryStore::new();
    let resolver = AccessResolver::new(&admins, &billing, &store);

    let result = resolver
        .resolve(identity(), &email("user@x.com"), ProductCategory::TablesHortifruti)
        .await;

    assert!(matches!(result, Err(AccessError::Unavailable(_))));
    assert!(store.rows().is_empty());
}

/// A visitor with no entitlement at all is denied and nothing is
/// written to the cache.
#[tokio::test]
async fn no_entitlement_is_denied_without_cache_write() {
    let admins = Vec::new();
    let billing = MemoryBilling::new();
    let store = MemoryStore::new();
    let resolver = AccessResolver::new(&admins, &billing, &store);

    let decision = resolver
        .resolve(identity(), &email("user@x.com"), ProductCategory::TablesFarmacia)
        .await
        .unwrap();

    assert!(!decision.granted);
    assert!(store.rows().is_empty());
}
