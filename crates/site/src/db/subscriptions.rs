//! Subscription cache repository.
//!
//! Rows here are a local cache of the payment processor's view, written by
//! the access resolver after a successful processor query. The upsert is
//! idempotent and keyed by identity + product category, so redundant
//! concurrent resolutions are safe without locking.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use fizko_core::{Email, IdentityId, ProductCategory, SubscriptionStatus, SubscriptionTier};

use super::RepositoryError;
use crate::models::subscription::Subscription;

/// Raw row shape, converted to the domain type after fetching.
#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    identity_id: IdentityId,
    email: String,
    product_type: String,
    status: String,
    tier: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    processor_customer_id: Option<String>,
    processor_subscription_id: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = RepositoryError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let category: ProductCategory = row.product_type.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product_type in database: {e}"))
        })?;
        let status: SubscriptionStatus = row
            .status
            .parse()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid status: {e}")))?;
        let tier = row
            .tier
            .as_deref()
            .map(str::parse::<SubscriptionTier>)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid tier: {e}")))?;

        Ok(Self {
            identity_id: row.identity_id,
            email,
            category,
            status,
            tier,
            current_period_end: row.current_period_end,
            processor_customer_id: row.processor_customer_id,
            processor_subscription_id: row.processor_subscription_id,
            updated_at: row.updated_at,
        })
    }
}

/// Fields written by the resolver's cache upsert.
#[derive(Debug, Clone)]
pub struct SubscriptionUpsert {
    pub identity_id: IdentityId,
    pub email: Email,
    pub category: ProductCategory,
    pub status: SubscriptionStatus,
    pub tier: Option<SubscriptionTier>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub processor_customer_id: Option<String>,
    pub processor_subscription_id: Option<String>,
}

/// Repository for the subscription cache.
pub struct SubscriptionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new subscription repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all cached rows for an identity, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails and
    /// `RepositoryError::DataCorruption` if a stored value is invalid.
    pub async fn list_for_identity(
        &self,
        identity_id: IdentityId,
    ) -> Result<Vec<Subscription>, RepositoryError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            r"
            SELECT identity_id, email, product_type, status, tier,
                   current_period_end, processor_customer_id,
                   processor_subscription_id, updated_at
            FROM fizko.subscription
            WHERE identity_id = $1
            ORDER BY updated_at DESC
            ",
        )
        .bind(identity_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Subscription::try_from).collect()
    }

    /// Find the active cached row for an identity + category, if any.
    ///
    /// Rows with any status other than `active` do not count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active(
        &self,
        identity_id: IdentityId,
        category: ProductCategory,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r"
            SELECT identity_id, email, product_type, status, tier,
                   current_period_end, processor_customer_id,
                   processor_subscription_id, updated_at
            FROM fizko.subscription
            WHERE identity_id = $1 AND product_type = $2 AND status = 'active'
            ",
        )
        .bind(identity_id)
        .bind(category.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Subscription::try_from).transpose()
    }

    /// Insert or update the cached row for an identity + category.
    ///
    /// Idempotent: conflicting writes converge on the latest processor
    /// state, so the resolver can run redundantly.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn upsert(&self, entry: &SubscriptionUpsert) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO fizko.subscription
                (identity_id, email, product_type, status, tier,
                 current_period_end, processor_customer_id,
                 processor_subscription_id, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (identity_id, product_type) DO UPDATE SET
                email = EXCLUDED.email,
                status = EXCLUDED.status,
                tier = EXCLUDED.tier,
                current_period_end = EXCLUDED.current_period_end,
                processor_customer_id = EXCLUDED.processor_customer_id,
                processor_subscription_id = EXCLUDED.processor_subscription_id,
                updated_at = NOW()
            ",
        )
        .bind(entry.identity_id)
        .bind(entry.email.as_str())
        .bind(entry.category.as_str())
        .bind(entry.status.as_str())
        .bind(entry.tier.map(|t| t.as_str()))
        .bind(entry.current_period_end)
        .bind(entry.processor_customer_id.as_deref())
        .bind(entry.processor_subscription_id.as_deref())
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
