//! Purchase initiation scenarios, including the post-payment access path.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;

use uuid::Uuid;

use fizko_core::{Email, IdentityId, ProductCategory};
use fizko_integration_tests::fakes::{one_time_grant, MemoryBilling, MemoryStore};
use fizko_site::models::product::find_by_category;
use fizko_site::services::access::{AccessResolver, AccessSource};
use fizko_site::services::checkout::{CheckoutError, PurchaseInitiator};

const BASE_URL: &str = "https://fizko.com.br";

fn email() -> Email {
    Email::parse("comprador@fizko.com.br").unwrap()
}

/// Anonymous visitors are rejected before a single processor call.
#[tokio::test]
async fn anonymous_visitor_cannot_start_checkout() {
    let billing = MemoryBilling::new();
    let initiator = PurchaseInitiator::new(&billing, BASE_URL);
    let product = find_by_category(ProductCategory::TablesHortifruti).unwrap();

    let result = initiator.initiate(None, product).await;

    assert!(matches!(result, Err(CheckoutError::AuthenticationRequired)));
    assert_eq!(billing.checkout_calls.load(Ordering::SeqCst), 0);
}

/// A checkout session that comes back without a redirect URL is a retry
/// error, not a panic and not a silent success.
#[tokio::test]
async fn missing_redirect_url_fails_the_initiation() {
    let billing = MemoryBilling::new();
    billing.set_checkout_url(None);
    let initiator = PurchaseInitiator::new(&billing, BASE_URL);
    let product = find_by_category(ProductCategory::ChatbotPremium).unwrap();

    let result = initiator.initiate(Some(&email()), product).await;

    assert!(matches!(result, Err(CheckoutError::MissingRedirectUrl)));
    assert_eq!(billing.checkout_calls.load(Ordering::SeqCst), 1);
}

/// Full purchase arc: checkout redirects, payment completes on the
/// processor's side, and the next dashboard refresh grants access and
/// caches the row.
#[tokio::test]
async fn completed_payment_shows_up_on_the_next_refresh() {
    let identity = IdentityId::new(Uuid::from_u128(9));
    let billing = MemoryBilling::new();
    let store = MemoryStore::new();
    let admins = Vec::new();

    let initiator = PurchaseInitiator::new(&billing, BASE_URL);
    let product = find_by_category(ProductCategory::TablesHortifruti).unwrap();
    let redirect = initiator.initiate(Some(&email()), product).await.unwrap();
    assert_eq!(redirect.url, "https://pay.test/session");

    // Payment completes out-of-band; the processor now reports a grant.
    billing.set_grants(vec![one_time_grant(ProductCategory::TablesHortifruti)]);

    let resolver = AccessResolver::new(&admins, &billing, &store);
    let decision = resolver
        .refresh(identity, &email(), ProductCategory::TablesHortifruti)
        .await
        .unwrap();

    assert!(decision.granted);
    assert_eq!(decision.source, Some(AccessSource::Processor));

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].category, ProductCategory::TablesHortifruti);

    // Other categories remain denied and uncached.
    let other = resolver
        .refresh(identity, &email(), ProductCategory::TablesFarmacia)
        .await
        .unwrap();
    assert!(!other.granted);
    assert_eq!(store.rows().len(), 1);
}
