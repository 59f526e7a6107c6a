//! Subscription status and tier enums.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Subscription status, mirroring the payment processor's lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    #[default]
    Inactive,
}

impl SubscriptionStatus {
    /// The stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::PastDue => "past_due",
            Self::Inactive => "inactive",
        }
    }

    /// Only `active` rows count toward an access grant.
    #[must_use]
    pub const fn grants_access(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            "past_due" => Ok(Self::PastDue),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("invalid subscription status: {other}")),
        }
    }
}

/// Subscription tier, derived from the processor unit amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionTier {
    Basic,
    Premium,
    Enterprise,
}

impl SubscriptionTier {
    /// Tier thresholds in centavos: above R$ 20,00 is Premium, above
    /// R$ 50,00 is Enterprise.
    #[must_use]
    pub const fn from_unit_amount(centavos: i64) -> Self {
        if centavos > 5000 {
            Self::Enterprise
        } else if centavos > 2000 {
            Self::Premium
        } else {
            Self::Basic
        }
    }

    /// The stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Premium => "Premium",
            Self::Enterprise => "Enterprise",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Basic" => Ok(Self::Basic),
            "Premium" => Ok(Self::Premium),
            "Enterprise" => Ok(Self::Enterprise),
            other => Err(format!("invalid subscription tier: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_grants_access() {
        assert!(SubscriptionStatus::Active.grants_access());
        assert!(!SubscriptionStatus::Canceled.grants_access());
        assert!(!SubscriptionStatus::PastDue.grants_access());
        assert!(!SubscriptionStatus::Inactive.grants_access());
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(
            SubscriptionTier::from_unit_amount(1990),
            SubscriptionTier::Basic
        );
        assert_eq!(
            SubscriptionTier::from_unit_amount(2999),
            SubscriptionTier::Premium
        );
        assert_eq!(
            SubscriptionTier::from_unit_amount(9990),
            SubscriptionTier::Enterprise
        );
        // Boundary values stay in the lower tier.
        assert_eq!(
            SubscriptionTier::from_unit_amount(2000),
            SubscriptionTier::Basic
        );
        assert_eq!(
            SubscriptionTier::from_unit_amount(5000),
            SubscriptionTier::Premium
        );
    }
}
