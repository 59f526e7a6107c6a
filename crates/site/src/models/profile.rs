//! Profile domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fizko_core::{Email, IdentityId};

/// A visitor profile (domain type).
///
/// Created on first login, mutable only by the owning identity. Address
/// fields follow the Brazilian postal layout (CEP, street, neighborhood,
/// city, UF).
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    /// Owning identity.
    pub identity_id: IdentityId,
    /// Email copied from the identity at creation time.
    pub email: Email,
    /// Display name.
    pub full_name: Option<String>,
    /// Postal code (CEP), stored as `#####-###`.
    pub cep: Option<String>,
    /// Street (logradouro).
    pub street: Option<String>,
    /// Neighborhood (bairro).
    pub neighborhood: Option<String>,
    /// City (localidade).
    pub city: Option<String>,
    /// Federative unit, two letters.
    pub uf: Option<String>,
    /// Tax id (CPF/CNPJ).
    pub tax_id: Option<String>,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Mutable profile fields accepted from the update endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub cep: Option<String>,
    pub street: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub uf: Option<String>,
    pub tax_id: Option<String>,
}
