//! CEP lookup route, used by the profile form to autofill addresses.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::Result;
use crate::services::postal::PostalAddress;
use crate::state::AppState;

/// GET /api/postal/{cep}
///
/// Open to anonymous visitors; the upstream data is public.
pub async fn lookup(
    State(state): State<AppState>,
    Path(cep): Path<String>,
) -> Result<Json<PostalAddress>> {
    let address = state.postal().lookup(&cep).await?;
    Ok(Json(address))
}
