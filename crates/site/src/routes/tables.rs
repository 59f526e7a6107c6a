//! Tax-table search route.
//!
//! Access is resolved before the external base is queried: a missing
//! grant is a 403 and never reaches the provider.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use fizko_core::ProductCategory;

use crate::db::SubscriptionRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::access::AccessResolver;
use crate::services::taxdata::TaxRecord;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub category: &'static str,
    pub records: Vec<TaxRecord>,
}

/// GET /api/tables/{category}/search?q=
pub async fn search(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(category): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let category: ProductCategory = category
        .parse()
        .map_err(|e| AppError::BadRequest(format!("{e}")))?;
    if !category.is_table() {
        return Err(AppError::BadRequest(format!(
            "category {category} is not a searchable table"
        )));
    }

    let query = params.q.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest("query must not be empty".to_owned()));
    }

    let repo = SubscriptionRepository::new(state.pool());
    let resolver = AccessResolver::new(&state.config().admin_emails, state.billing(), &repo);
    let decision = resolver
        .resolve(identity.id, &identity.email, category)
        .await?;
    if !decision.granted {
        return Err(AppError::AccessDenied(category.as_str().to_owned()));
    }

    let records = state.taxdata().search(category, query).await?;

    Ok(Json(SearchResponse {
        category: category.as_str(),
        records,
    }))
}
