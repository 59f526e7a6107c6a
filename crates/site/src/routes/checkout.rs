//! Purchase initiation route.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use fizko_core::ProductCategory;

use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::product::find_by_category;
use crate::services::checkout::PurchaseInitiator;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    /// Category tag of the catalog product to buy.
    pub category: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Hosted payment page to redirect the visitor to.
    pub url: String,
}

/// POST /api/checkout
///
/// Anonymous requests fail with 401 before any processor call; the
/// initiator enforces that, not this handler.
pub async fn create(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
    Json(payload): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>> {
    let category: ProductCategory = payload
        .category
        .parse()
        .map_err(|e| AppError::BadRequest(format!("{e}")))?;
    let product = find_by_category(category)
        .ok_or_else(|| AppError::BadRequest(format!("no product for category {category}")))?;

    let initiator = PurchaseInitiator::new(state.billing(), &state.config().base_url);
    let redirect = initiator
        .initiate(identity.as_ref().map(|i| &i.email), product)
        .await?;

    info!(category = %category, "checkout session created");

    Ok(Json(CheckoutResponse { url: redirect.url }))
}
