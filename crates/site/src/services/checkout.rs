//! Purchase initiation.
//!
//! Turns a catalog product plus an authenticated identity into a hosted
//! checkout redirect. Initiation is deliberately not idempotent: an
//! abandoned session costs nothing, and the processor deduplicates on
//! its side. Payment completion happens entirely on the processor's
//! hosted page; access shows up on the next resolution.

use thiserror::Error;
use tracing::instrument;

use fizko_core::Email;

use crate::models::product::Product;
use crate::services::billing::{BillingError, BillingProvider, CheckoutRequest};

/// Errors from purchase initiation.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No identity; checkout requires a signed-in visitor.
    #[error("authentication required to start a purchase")]
    AuthenticationRequired,

    /// The processor accepted the session but returned no redirect URL.
    #[error("checkout session missing redirect URL")]
    MissingRedirectUrl,

    /// The processor call failed.
    #[error("billing error: {0}")]
    Billing(#[from] BillingError),
}

/// Where to send the visitor to complete payment.
#[derive(Debug, Clone)]
pub struct CheckoutRedirect {
    pub url: String,
}

/// Creates hosted checkout sessions for catalog products.
pub struct PurchaseInitiator<'a, B> {
    billing: &'a B,
    base_url: &'a str,
}

impl<'a, B: BillingProvider> PurchaseInitiator<'a, B> {
    #[must_use]
    pub const fn new(billing: &'a B, base_url: &'a str) -> Self {
        Self { billing, base_url }
    }

    /// Start a purchase for the given product.
    ///
    /// An absent identity fails before any network call is made.
    ///
    /// # Errors
    ///
    /// `AuthenticationRequired` without an identity, `MissingRedirectUrl`
    /// when the processor omits the redirect, `Billing` otherwise.
    #[instrument(skip(self, email), fields(category = %product.category.as_str()))]
    pub async fn initiate(
        &self,
        email: Option<&Email>,
        product: &Product,
    ) -> Result<CheckoutRedirect, CheckoutError> {
        let email = email.ok_or(CheckoutError::AuthenticationRequired)?;

        let request = CheckoutRequest {
            customer_email: email.clone(),
            product_name: product.title.to_owned(),
            unit_amount: product.price.centavos(),
            category: product.category,
            success_url: format!("{}/conta?compra=sucesso", self.base_url),
            cancel_url: format!("{}/produtos?compra=cancelada", self.base_url),
        };

        let session = self.billing.create_checkout(&request).await?;

        session
            .url
            .map(|url| CheckoutRedirect { url })
            .ok_or(CheckoutError::MissingRedirectUrl)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use fizko_core::ProductCategory;

    use crate::models::product;
    use crate::services::billing::{BillingGrant, CheckoutSession};

    use super::*;

    struct FakeBilling {
        url: Option<String>,
        calls: AtomicUsize,
        last_request: Mutex<Option<CheckoutRequest>>,
    }

    impl FakeBilling {
        fn returning_url(url: Option<&str>) -> Self {
            Self {
                url: url.map(str::to_owned),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }
    }

    impl BillingProvider for FakeBilling {
        async fn grants_for(&self, _email: &Email) -> Result<Vec<BillingGrant>, BillingError> {
            unreachable!("initiation never lists grants")
        }

        async fn create_checkout(
            &self,
            request: &CheckoutRequest,
        ) -> Result<CheckoutSession, BillingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            Ok(CheckoutSession {
                id: "cs_test_1".to_owned(),
                url: self.url.clone(),
            })
        }
    }

    fn email() -> Email {
        Email::parse("user@fizko.com.br").unwrap()
    }

    #[tokio::test]
    async fn anonymous_initiation_makes_no_network_call() {
        let billing = FakeBilling::returning_url(Some("https://pay.example/cs_test_1"));
        let initiator = PurchaseInitiator::new(&billing, "https://fizko.com.br");
        let chatbot = product::find_by_category(ProductCategory::ChatbotPremium).unwrap();

        let result = initiator.initiate(None, chatbot).await;

        assert!(matches!(result, Err(CheckoutError::AuthenticationRequired)));
        assert_eq!(billing.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_initiation_returns_redirect() {
        let billing = FakeBilling::returning_url(Some("https://pay.example/cs_test_1"));
        let initiator = PurchaseInitiator::new(&billing, "https://fizko.com.br");
        let kit = product::find_by_category(ProductCategory::TablesHortifruti).unwrap();

        let redirect = initiator.initiate(Some(&email()), kit).await.unwrap();

        assert_eq!(redirect.url, "https://pay.example/cs_test_1");
        let request = billing.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.category, ProductCategory::TablesHortifruti);
        assert_eq!(request.unit_amount, 4990);
        assert_eq!(request.customer_email.as_str(), "user@fizko.com.br");
    }

    #[tokio::test]
    async fn missing_redirect_url_is_an_error() {
        let billing = FakeBilling::returning_url(None);
        let initiator = PurchaseInitiator::new(&billing, "https://fizko.com.br");
        let chatbot = product::find_by_category(ProductCategory::ChatbotPremium).unwrap();

        let result = initiator.initiate(Some(&email()), chatbot).await;

        assert!(matches!(result, Err(CheckoutError::MissingRedirectUrl)));
        assert_eq!(billing.calls.load(Ordering::SeqCst), 1);
    }
}
