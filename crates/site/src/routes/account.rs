//! Account routes: profile, cached subscriptions, access dashboard.

use axum::{extract::State, Json};
use serde::Serialize;

use fizko_core::{ProductCategory, SubscriptionTier};

use crate::db::{ProfileRepository, SubscriptionRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::profile::{Profile, ProfileUpdate};
use crate::models::subscription::Subscription;
use crate::services::access::{AccessError, AccessResolver, AccessSource};
use crate::services::postal::normalize_cep;
use crate::state::AppState;

/// GET /api/account/profile
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Profile>> {
    let profile = ProfileRepository::new(state.pool())
        .get(identity.id)
        .await?
        .ok_or_else(|| AppError::NotFound("profile".to_owned()))?;

    Ok(Json(profile))
}

/// PUT /api/account/profile
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<Profile>> {
    let update = validate_update(payload)?;

    let repo = ProfileRepository::new(state.pool());
    repo.update(identity.id, &update).await?;
    let profile = repo
        .get(identity.id)
        .await?
        .ok_or_else(|| AppError::NotFound("profile".to_owned()))?;

    Ok(Json(profile))
}

/// GET /api/account/subscriptions
pub async fn subscriptions(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Vec<Subscription>>> {
    let rows = SubscriptionRepository::new(state.pool())
        .list_for_identity(identity.id)
        .await?;

    Ok(Json(rows))
}

/// One dashboard row: the access state of a single category.
#[derive(Debug, Serialize)]
pub struct CategoryAccess {
    pub category: &'static str,
    pub label: &'static str,
    pub granted: bool,
    /// Where the grant came from, when granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<SubscriptionTier>,
    /// False when the processor is down and no cached answer exists.
    pub available: bool,
}

/// GET /api/account/access
///
/// Processor-first resolution of every category, so a purchase that just
/// completed shows up without waiting for the cache. A category whose
/// status cannot be determined is reported as unavailable rather than
/// denied, and never fails the whole dashboard.
pub async fn access_overview(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<Vec<CategoryAccess>>> {
    let repo = SubscriptionRepository::new(state.pool());
    let resolver = AccessResolver::new(&state.config().admin_emails, state.billing(), &repo);

    let mut overview = Vec::with_capacity(ProductCategory::ALL.len());
    for category in ProductCategory::ALL {
        let entry = match resolver.refresh(identity.id, &identity.email, category).await {
            Ok(decision) => CategoryAccess {
                category: category.as_str(),
                label: category.label(),
                granted: decision.granted,
                source: decision.source.map(source_str),
                tier: decision.tier,
                available: true,
            },
            Err(AccessError::Unavailable(e)) => {
                tracing::warn!(error = %e, category = category.as_str(), "access unavailable");
                CategoryAccess {
                    category: category.as_str(),
                    label: category.label(),
                    granted: false,
                    source: None,
                    tier: None,
                    available: false,
                }
            }
            Err(e @ AccessError::Store(_)) => return Err(e.into()),
        };
        overview.push(entry);
    }

    Ok(Json(overview))
}

const fn source_str(source: AccessSource) -> &'static str {
    match source {
        AccessSource::Administrator => "administrator",
        AccessSource::Cache => "cache",
        AccessSource::Processor => "processor",
    }
}

/// Normalize and validate the mutable profile fields.
fn validate_update(mut update: ProfileUpdate) -> Result<ProfileUpdate> {
    if let Some(cep) = &update.cep {
        let digits = normalize_cep(cep)
            .map_err(|_| AppError::BadRequest("invalid CEP: expected 8 digits".to_owned()))?;
        update.cep = Some(format!("{}-{}", &digits[..5], &digits[5..]));
    }

    if let Some(uf) = &update.uf {
        let uf = uf.trim();
        if uf.len() != 2 || !uf.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::BadRequest(
                "invalid UF: expected two letters".to_owned(),
            ));
        }
        update.uf = Some(uf.to_ascii_uppercase());
    }

    if let Some(tax_id) = &update.tax_id {
        // CPF has 11 digits, CNPJ has 14.
        let digits: String = tax_id.chars().filter(char::is_ascii_digit).collect();
        if digits.len() != 11 && digits.len() != 14 {
            return Err(AppError::BadRequest(
                "invalid tax id: expected a CPF or CNPJ".to_owned(),
            ));
        }
        update.tax_id = Some(digits);
    }

    if let Some(name) = &update.full_name {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("name must not be empty".to_owned()));
        }
        update.full_name = Some(name.to_owned());
    }

    Ok(update)
}
