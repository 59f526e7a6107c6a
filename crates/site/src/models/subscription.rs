//! Subscription cache domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use fizko_core::{Email, IdentityId, ProductCategory, SubscriptionStatus, SubscriptionTier};

/// A cached subscription/purchase record for one identity + category.
///
/// This is a cache of the payment processor's state, not the source of
/// truth; it exists so access can be resolved when the processor is
/// unreachable.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    /// Owning identity.
    pub identity_id: IdentityId,
    /// Billing email at the time of the last refresh.
    pub email: Email,
    /// Category this row grants (or denies) access to.
    pub category: ProductCategory,
    /// Last known processor status.
    pub status: SubscriptionStatus,
    /// Tier derived from the processor unit amount, if recurring.
    pub tier: Option<SubscriptionTier>,
    /// End of the current billing period, if recurring.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Processor customer id, when known.
    pub processor_customer_id: Option<String>,
    /// Processor subscription id, when recurring.
    pub processor_subscription_id: Option<String>,
    /// When the resolver last refreshed this row.
    pub updated_at: DateTime<Utc>,
}
