//! Profile repository.
//!
//! A profile row is created on first login and only ever updated by its
//! owning identity.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use fizko_core::{Email, IdentityId};

use super::RepositoryError;
use crate::models::profile::{Profile, ProfileUpdate};

#[derive(sqlx::FromRow)]
struct ProfileRow {
    identity_id: IdentityId,
    email: String,
    full_name: Option<String>,
    cep: Option<String>,
    street: Option<String>,
    neighborhood: Option<String>,
    city: Option<String>,
    uf: Option<String>,
    tax_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            identity_id: row.identity_id,
            email,
            full_name: row.full_name,
            cep: row.cep,
            street: row.street,
            neighborhood: row.neighborhood,
            city: row.city,
            uf: row.uf,
            tax_id: row.tax_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for profile rows.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a profile by identity id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails and
    /// `RepositoryError::DataCorruption` if a stored value is invalid.
    pub async fn get(&self, identity_id: IdentityId) -> Result<Option<Profile>, RepositoryError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r"
            SELECT identity_id, email, full_name, cep, street, neighborhood,
                   city, uf, tax_id, created_at, updated_at
            FROM fizko.profile
            WHERE identity_id = $1
            ",
        )
        .bind(identity_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Profile::try_from).transpose()
    }

    /// Ensure a profile row exists for an identity.
    ///
    /// Called on every login; the insert is a no-op when the row already
    /// exists, which makes first-login creation idempotent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the write fails.
    pub async fn ensure(
        &self,
        identity_id: IdentityId,
        email: &Email,
        full_name: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO fizko.profile (identity_id, email, full_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (identity_id) DO NOTHING
            ",
        )
        .bind(identity_id)
        .bind(email.as_str())
        .bind(full_name)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Update the mutable profile fields for an identity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no profile row exists and
    /// `RepositoryError::Database` for other failures.
    pub async fn update(
        &self,
        identity_id: IdentityId,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE fizko.profile
            SET full_name = $2, cep = $3, street = $4, neighborhood = $5,
                city = $6, uf = $7, tax_id = $8, updated_at = NOW()
            WHERE identity_id = $1
            ",
        )
        .bind(identity_id)
        .bind(update.full_name.as_deref())
        .bind(update.cep.as_deref())
        .bind(update.street.as_deref())
        .bind(update.neighborhood.as_deref())
        .bind(update.city.as_deref())
        .bind(update.uf.as_deref())
        .bind(update.tax_id.as_deref())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
