//! Tax-table lookup.
//!
//! Fiscal classification tables (one per product sector) live in a hosted
//! record base. Search matches the visitor's query against the record
//! code column and returns at most a small page of results.

use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use fizko_core::ProductCategory;

use crate::config::TaxDataConfig;

/// Request timeout for tax-data calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Result page size per search.
const MAX_RECORDS: u32 = 10;

/// Errors from the tax-data lookup.
#[derive(Debug, Error)]
pub enum TaxDataError {
    /// The category has no backing tax table.
    #[error("no tax table for category '{0}'")]
    NoTableForCategory(String),

    /// HTTP transport failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the provider response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// One fiscal classification record.
#[derive(Debug, Clone, Serialize)]
pub struct TaxRecord {
    /// Fiscal classification code (NCM or similar).
    pub code: String,
    pub description: String,
    /// Tax rate as a percentage, when the record carries one.
    pub rate: Option<Decimal>,
    pub notes: Option<String>,
}

// Wire shapes.

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<RecordObject>,
}

#[derive(Debug, Deserialize)]
struct RecordObject {
    fields: RecordFields,
}

#[derive(Debug, Deserialize)]
struct RecordFields {
    #[serde(rename = "Codigo")]
    codigo: Option<String>,
    #[serde(rename = "Descricao")]
    descricao: Option<String>,
    #[serde(rename = "Aliquota")]
    aliquota: Option<Decimal>,
    #[serde(rename = "Observacoes")]
    observacoes: Option<String>,
}

/// Table name backing a purchasable table category.
fn table_for_category(category: ProductCategory) -> Option<&'static str> {
    match category {
        ProductCategory::TablesHortifruti => Some("Hortifruti"),
        ProductCategory::TablesFarmacia => Some("Farmacia"),
        ProductCategory::Subscription | ProductCategory::ChatbotPremium => None,
    }
}

/// Escape a user query for embedding in a search formula string literal.
fn escape_formula_string(query: &str) -> String {
    query.replace('\\', "\\\\").replace('"', "\\\"")
}

/// REST client for the hosted tax-table base.
#[derive(Clone)]
pub struct TaxDataClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    base_id: String,
}

impl TaxDataClient {
    /// Create a new tax-data client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &TaxDataConfig) -> Result<Self, TaxDataError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.expose_secret().to_owned(),
            base_id: config.base_id.clone(),
        })
    }

    /// Search a category's tax table by classification code.
    ///
    /// # Errors
    ///
    /// Returns `NoTableForCategory` for non-table categories, otherwise
    /// transport and provider errors.
    #[instrument(skip(self, query), fields(category = %category.as_str()))]
    pub async fn search(
        &self,
        category: ProductCategory,
        query: &str,
    ) -> Result<Vec<TaxRecord>, TaxDataError> {
        let table = table_for_category(category)
            .ok_or_else(|| TaxDataError::NoTableForCategory(category.as_str().to_owned()))?;

        let formula = format!(r#"SEARCH("{}",{{Codigo}})"#, escape_formula_string(query));
        let url = format!(
            "{}/{}/{}?filterByFormula={}&maxRecords={}",
            self.api_url,
            self.base_id,
            table,
            urlencoding::encode(&formula),
            MAX_RECORDS,
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TaxDataError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: RecordsResponse = response
            .json()
            .await
            .map_err(|e| TaxDataError::Parse(e.to_string()))?;

        let records = parsed
            .records
            .into_iter()
            .filter_map(|record| {
                // Records missing a code are unusable; skip them rather
                // than failing the whole page.
                let code = record.fields.codigo?;
                Some(TaxRecord {
                    code,
                    description: record.fields.descricao.unwrap_or_default(),
                    rate: record.fields.aliquota,
                    notes: record.fields.observacoes,
                })
            })
            .collect();

        Ok(records)
    }
}
