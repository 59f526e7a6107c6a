//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::SiteConfig;
use crate::services::assistant::AssistantClient;
use crate::services::billing::ProcessorClient;
use crate::services::identity::IdentityClient;
use crate::services::postal::PostalClient;
use crate::services::support::SupportClient;
use crate::services::taxdata::TaxDataClient;

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("identity client: {0}")]
    Identity(#[from] crate::services::identity::IdentityError),
    #[error("billing client: {0}")]
    Billing(#[from] crate::services::billing::BillingError),
    #[error("assistant client: {0}")]
    Assistant(#[from] crate::services::assistant::AssistantError),
    #[error("postal client: {0}")]
    Postal(#[from] crate::services::postal::PostalError),
    #[error("tax-data client: {0}")]
    TaxData(#[from] crate::services::taxdata::TaxDataError),
    #[error("support client: {0}")]
    Support(#[from] crate::services::support::SupportError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and external clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SiteConfig,
    pool: PgPool,
    identity: IdentityClient,
    billing: ProcessorClient,
    assistant: AssistantClient,
    postal: PostalClient,
    taxdata: TaxDataClient,
    support: SupportClient,
}

impl AppState {
    /// Create a new application state, building every external client
    /// from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any client fails to build.
    pub fn new(config: SiteConfig, pool: PgPool) -> Result<Self, StateError> {
        let identity = IdentityClient::new(&config.identity)?;
        let billing = ProcessorClient::new(&config.billing)?;
        let assistant = AssistantClient::new(&config.assistant)?;
        let postal = PostalClient::new(&config.postal_api_url)?;
        let taxdata = TaxDataClient::new(&config.taxdata)?;
        let support = SupportClient::new(&config.support)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                identity,
                billing,
                assistant,
                postal,
                taxdata,
                support,
            }),
        })
    }

    /// Get a reference to the site configuration.
    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the identity provider client.
    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.inner.identity
    }

    /// Get a reference to the payment processor client.
    #[must_use]
    pub fn billing(&self) -> &ProcessorClient {
        &self.inner.billing
    }

    /// Get a reference to the assistant client.
    #[must_use]
    pub fn assistant(&self) -> &AssistantClient {
        &self.inner.assistant
    }

    /// Get a reference to the postal lookup client.
    #[must_use]
    pub fn postal(&self) -> &PostalClient {
        &self.inner.postal
    }

    /// Get a reference to the tax-data client.
    #[must_use]
    pub fn taxdata(&self) -> &TaxDataClient {
        &self.inner.taxdata
    }

    /// Get a reference to the support email client.
    #[must_use]
    pub fn support(&self) -> &SupportClient {
        &self.inner.support
    }
}
