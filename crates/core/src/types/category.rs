//! Paid product categories.
//!
//! Categories are the unit of access resolution: a grant is always scoped to
//! one category, and the processor's product ids map onto these via a fixed
//! lookup table owned by the billing client.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A paid product or table category.
///
/// The string forms match the `product_type` values stored in the
/// subscription cache, so the enum round-trips through the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    /// Recurring site subscription.
    Subscription,
    /// Unlimited chatbot access.
    ChatbotPremium,
    /// Hortifruti tax table.
    #[serde(rename = "tabelas_hortifruti")]
    TablesHortifruti,
    /// Pharmacy tax table.
    #[serde(rename = "tabelas_farmacia")]
    TablesFarmacia,
}

impl ProductCategory {
    /// All known categories, in dashboard display order.
    pub const ALL: [Self; 4] = [
        Self::Subscription,
        Self::ChatbotPremium,
        Self::TablesHortifruti,
        Self::TablesFarmacia,
    ];

    /// The stored `product_type` string for this category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::ChatbotPremium => "chatbot_premium",
            Self::TablesHortifruti => "tabelas_hortifruti",
            Self::TablesFarmacia => "tabelas_farmacia",
        }
    }

    /// Whether this category gates a tax-data table.
    #[must_use]
    pub const fn is_table(&self) -> bool {
        matches!(self, Self::TablesHortifruti | Self::TablesFarmacia)
    }

    /// Portuguese display label, as shown on the dashboard.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Subscription => "Assinatura",
            Self::ChatbotPremium => "Chatbot Premium",
            Self::TablesHortifruti => "Tabelas - Hortifruti",
            Self::TablesFarmacia => "Tabelas - Farmácia",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`ProductCategory`] from its string form.
#[derive(thiserror::Error, Debug, Clone)]
#[error("unknown product category: {0}")]
pub struct CategoryParseError(pub String);

impl std::str::FromStr for ProductCategory {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscription" => Ok(Self::Subscription),
            "chatbot_premium" => Ok(Self::ChatbotPremium),
            "tabelas_hortifruti" => Ok(Self::TablesHortifruti),
            "tabelas_farmacia" => Ok(Self::TablesFarmacia),
            other => Err(CategoryParseError(other.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_string_roundtrip() {
        for category in ProductCategory::ALL {
            let parsed: ProductCategory = category.as_str().parse().unwrap();
            assert_eq!(parsed, category);
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        assert!("tabelas_padaria".parse::<ProductCategory>().is_err());
    }

    #[test]
    fn test_table_categories() {
        assert!(ProductCategory::TablesFarmacia.is_table());
        assert!(ProductCategory::TablesHortifruti.is_table());
        assert!(!ProductCategory::ChatbotPremium.is_table());
        assert!(!ProductCategory::Subscription.is_table());
    }

    #[test]
    fn test_serde_matches_as_str() {
        for category in ProductCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }
}
