//! Static product catalog.
//!
//! Catalog entries are defined at build time. Purchase completion is
//! out-of-band, so the catalog carries no stock or fulfillment state.

use serde::Serialize;

use fizko_core::{Price, ProductCategory};

/// Billing period for a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    /// Single checkout, lifetime access.
    OneTime,
    /// Recurring monthly subscription.
    Monthly,
}

/// A static catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    /// Display title.
    pub title: &'static str,
    /// Price in centavos.
    pub price: Price,
    /// One-time purchase or recurring.
    pub period: BillingPeriod,
    /// Marketing feature list.
    pub features: &'static [&'static str],
    /// Category granted by purchasing this product.
    pub category: ProductCategory,
}

/// The build-time product catalog.
#[must_use]
pub fn catalog() -> &'static [Product] {
    const CATALOG: &[Product] = &[
        Product {
            title: "Kit Mercearia",
            price: Price::from_centavos(4990),
            period: BillingPeriod::OneTime,
            features: &[
                "Controle de estoque",
                "Gestão de preços",
                "Cálculos tributários",
                "Relatórios de vendas",
            ],
            category: ProductCategory::TablesHortifruti,
        },
        Product {
            title: "Gestão Farmácia",
            price: Price::from_centavos(7990),
            period: BillingPeriod::OneTime,
            features: &[
                "Cadastro de medicamentos",
                "Conformidade regulatória",
                "Controle de validade",
                "Tabela tributária do setor",
            ],
            category: ProductCategory::TablesFarmacia,
        },
        Product {
            title: "Assinatura FIZKO",
            price: Price::from_centavos(9990),
            period: BillingPeriod::Monthly,
            features: &[
                "Todas as tabelas tributárias",
                "Relatórios fiscais",
                "Atualizações contínuas",
            ],
            category: ProductCategory::Subscription,
        },
        Product {
            title: "Chatbot Premium",
            price: Price::from_centavos(2999),
            period: BillingPeriod::Monthly,
            features: &["Consultas ilimitadas ao assistente fiscal"],
            category: ProductCategory::ChatbotPremium,
        },
    ];
    CATALOG
}

/// Look up a catalog entry by its category tag.
#[must_use]
pub fn find_by_category(category: ProductCategory) -> Option<&'static Product> {
    catalog().iter().find(|p| p.category == category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_categories_are_unique() {
        let products = catalog();
        for (i, a) in products.iter().enumerate() {
            for b in products.iter().skip(i + 1) {
                assert_ne!(a.category, b.category);
            }
        }
    }

    #[test]
    fn test_find_by_category() {
        let product = find_by_category(ProductCategory::ChatbotPremium)
            .expect("chatbot premium should be in the catalog");
        assert_eq!(product.price.centavos(), 2999);
        assert_eq!(product.period, BillingPeriod::Monthly);
    }
}
