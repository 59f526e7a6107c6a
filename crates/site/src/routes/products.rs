//! Product catalog route.

use axum::Json;
use serde::Serialize;

use crate::models::product::{catalog, BillingPeriod};

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub title: &'static str,
    pub price_centavos: i64,
    /// Formatted for display, e.g. `R$ 29,99`.
    pub price_display: String,
    pub period: BillingPeriod,
    pub features: &'static [&'static str],
    pub category: &'static str,
}

/// GET /api/products
pub async fn index() -> Json<Vec<ProductResponse>> {
    let products = catalog()
        .iter()
        .map(|p| ProductResponse {
            title: p.title,
            price_centavos: p.price.centavos(),
            price_display: p.price.to_string(),
            period: p.period,
            features: p.features,
            category: p.category.as_str(),
        })
        .collect();

    Json(products)
}
