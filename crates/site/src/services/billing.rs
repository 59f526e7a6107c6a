//! Payment processor client.
//!
//! The processor is the source of truth for entitlements. Two read paths
//! feed the access resolver: active recurring subscriptions and succeeded
//! one-time payments, both looked up by customer email. The write path
//! creates hosted checkout sessions; payment completion stays entirely on
//! the processor's side.

use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use fizko_core::{Email, ProductCategory, SubscriptionTier};

use crate::config::BillingConfig;

const API_BASE: &str = "https://api.stripe.com/v1";

/// Request timeout for processor calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size when scanning one-time payments for a customer.
const PAYMENT_SCAN_LIMIT: u32 = 100;

/// Processor product ids with a fixed category mapping.
///
/// One-time payments carry the purchased product id in metadata; these
/// entries translate it back to the category it grants. Recurring
/// subscriptions not listed here grant the general subscription category.
const PRODUCT_CATEGORIES: &[(&str, ProductCategory)] = &[
    ("prod_SmClFA0KKsWJjp", ProductCategory::TablesHortifruti),
    ("prod_SmCmT2xVaR3dQf", ProductCategory::TablesFarmacia),
    ("prod_SmClL8v57p0wX7", ProductCategory::ChatbotPremium),
];

/// Errors from the payment processor.
#[derive(Debug, Error)]
pub enum BillingError {
    /// HTTP transport failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Processor returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the processor response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// One entitlement reported by the processor.
#[derive(Debug, Clone)]
pub struct BillingGrant {
    /// Category the grant unlocks.
    pub category: ProductCategory,
    /// True for recurring subscriptions, false for one-time payments.
    pub recurring: bool,
    /// Tier derived from the charged amount (recurring grants only).
    pub tier: Option<SubscriptionTier>,
    /// End of the current billing period (recurring grants only).
    pub current_period_end: Option<DateTime<Utc>>,
    /// Processor customer id the grant belongs to.
    pub customer_id: String,
    /// Processor subscription id (recurring grants only).
    pub subscription_id: Option<String>,
}

/// Parameters for creating a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_email: Email,
    pub product_name: String,
    /// Amount in centavos.
    pub unit_amount: i64,
    pub category: ProductCategory,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created checkout session.
///
/// `url` is where the visitor completes payment. The processor may omit
/// it; callers must treat that as a failed initiation.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Source of entitlements and checkout sessions.
///
/// Implemented by [`ProcessorClient`] in production and by in-memory
/// fakes in tests.
#[allow(async_fn_in_trait)]
pub trait BillingProvider {
    /// List every entitlement the processor holds for an email.
    async fn grants_for(&self, email: &Email) -> Result<Vec<BillingGrant>, BillingError>;

    /// Create a hosted checkout session.
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError>;
}

// Wire shapes.

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CustomerObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: String,
    current_period_end: Option<i64>,
    items: SubscriptionItems,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItems {
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: PriceObject,
}

#[derive(Debug, Deserialize)]
struct PriceObject {
    product: Option<String>,
    unit_amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentObject {
    customer: Option<String>,
    status: String,
    #[serde(default)]
    metadata: PaymentMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentMetadata {
    product_type: Option<String>,
    product_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// REST client for the payment processor.
#[derive(Clone)]
pub struct ProcessorClient {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl ProcessorClient {
    /// Create a new processor client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &BillingConfig) -> Result<Self, BillingError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            secret_key: config.secret_key.expose_secret().to_owned(),
            api_base: API_BASE.to_owned(),
        })
    }

    /// Override the API base URL. Used by tests against a local stub.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Find the processor customer for an email, if one exists.
    async fn find_customer(&self, email: &Email) -> Result<Option<String>, BillingError> {
        let url = format!("{}/customers", self.api_base);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .query(&[("email", email.as_str()), ("limit", "1")])
            .send()
            .await?;
        let list: ListResponse<CustomerObject> = parse_response(response).await?;

        Ok(list.data.into_iter().next().map(|c| c.id))
    }

    /// Active recurring subscriptions for a customer, as grants.
    async fn subscription_grants(
        &self,
        customer_id: &str,
    ) -> Result<Vec<BillingGrant>, BillingError> {
        let url = format!("{}/subscriptions", self.api_base);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .query(&[("customer", customer_id), ("status", "active")])
            .send()
            .await?;
        let list: ListResponse<SubscriptionObject> = parse_response(response).await?;

        let mut grants = Vec::new();
        for subscription in list.data {
            let period_end = subscription
                .current_period_end
                .and_then(|ts| DateTime::from_timestamp(ts, 0));

            for item in subscription.items.data {
                let category = item
                    .price
                    .product
                    .as_deref()
                    .and_then(category_for_product)
                    .unwrap_or(ProductCategory::Subscription);
                let tier = item
                    .price
                    .unit_amount
                    .map(SubscriptionTier::from_unit_amount);

                grants.push(BillingGrant {
                    category,
                    recurring: true,
                    tier,
                    current_period_end: period_end,
                    customer_id: subscription.customer.clone(),
                    subscription_id: Some(subscription.id.clone()),
                });
            }
        }

        Ok(grants)
    }

    /// Succeeded one-time payments for a customer, as grants.
    ///
    /// Only payments tagged with a known product in metadata count; stray
    /// charges grant nothing.
    async fn payment_grants(&self, customer_id: &str) -> Result<Vec<BillingGrant>, BillingError> {
        let url = format!("{}/payment_intents", self.api_base);
        let limit = PAYMENT_SCAN_LIMIT.to_string();

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .query(&[("customer", customer_id), ("limit", limit.as_str())])
            .send()
            .await?;
        let list: ListResponse<PaymentIntentObject> = parse_response(response).await?;

        let grants = list
            .data
            .into_iter()
            .filter(|p| p.status == "succeeded")
            .filter_map(|payment| {
                let category = payment
                    .metadata
                    .product_type
                    .as_deref()
                    .and_then(|t| t.parse().ok())
                    .or_else(|| {
                        payment
                            .metadata
                            .product_id
                            .as_deref()
                            .and_then(category_for_product)
                    })?;

                Some(BillingGrant {
                    category,
                    recurring: false,
                    tier: None,
                    current_period_end: None,
                    customer_id: payment
                        .customer
                        .unwrap_or_else(|| customer_id.to_owned()),
                    subscription_id: None,
                })
            })
            .collect();

        Ok(grants)
    }
}

impl BillingProvider for ProcessorClient {
    /// List entitlements for an email: active subscriptions plus
    /// succeeded one-time payments.
    ///
    /// An email with no processor customer has no grants; that is an
    /// empty result, not an error.
    #[instrument(skip(self))]
    async fn grants_for(&self, email: &Email) -> Result<Vec<BillingGrant>, BillingError> {
        let Some(customer_id) = self.find_customer(email).await? else {
            return Ok(Vec::new());
        };

        let mut grants = self.subscription_grants(&customer_id).await?;
        grants.extend(self.payment_grants(&customer_id).await?);

        Ok(grants)
    }

    #[instrument(skip(self, request), fields(category = %request.category.as_str()))]
    async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        let url = format!("{}/checkout/sessions", self.api_base);
        let unit_amount = request.unit_amount.to_string();

        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("success_url", &request.success_url),
            ("cancel_url", &request.cancel_url),
            ("customer_email", request.customer_email.as_str()),
            ("metadata[product_type]", request.category.as_str()),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", "brl"),
            ("line_items[0][price_data][unit_amount]", &unit_amount),
            (
                "line_items[0][price_data][product_data][name]",
                &request.product_name,
            ),
        ];

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;
        let session: SessionObject = parse_response(response).await?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }
}

/// Look up the category a processor product id grants.
fn category_for_product(product_id: &str) -> Option<ProductCategory> {
    PRODUCT_CATEGORIES
        .iter()
        .find(|(id, _)| *id == product_id)
        .map(|(_, category)| *category)
}

/// Deserialize a processor response, mapping non-success statuses to
/// `BillingError::Api` with the processor's own message when present.
async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BillingError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .json::<ApiErrorEnvelope>()
            .await
            .ok()
            .and_then(|e| e.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| "unknown processor error".to_owned());

        return Err(BillingError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| BillingError::Parse(e.to_string()))
}
