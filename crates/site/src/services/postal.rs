//! Postal code (CEP) lookup.
//!
//! Resolves a Brazilian CEP to an address via the public ViaCEP API and
//! caches hits in memory. CEP data changes rarely, so a generous TTL
//! keeps repeat profile edits off the network.

use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

/// Request timeout for postal lookups.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Cached entries expire after a day.
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Maximum number of cached addresses.
const CACHE_CAPACITY: u64 = 10_000;

/// Errors from the postal lookup.
#[derive(Debug, Error)]
pub enum PostalError {
    /// Input was not a valid CEP (8 digits, optional dash).
    #[error("invalid CEP: expected 8 digits")]
    InvalidCep,

    /// The CEP is well-formed but assigned to no address.
    #[error("CEP not found")]
    NotFound,

    /// HTTP transport failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse the lookup response.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A resolved postal address.
#[derive(Debug, Clone, Serialize)]
pub struct PostalAddress {
    /// CEP formatted as `#####-###`.
    pub cep: String,
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    /// Federative unit, two letters.
    pub uf: String,
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    cep: Option<String>,
    logradouro: Option<String>,
    bairro: Option<String>,
    localidade: Option<String>,
    uf: Option<String>,
    /// Set when the CEP exists syntactically but matches no address.
    #[serde(default)]
    erro: bool,
}

/// Normalize a CEP to its 8-digit form.
///
/// Accepts `01310-100` and `01310100`; anything else is rejected.
///
/// # Errors
///
/// Returns `PostalError::InvalidCep` if the input does not contain
/// exactly 8 digits.
pub fn normalize_cep(input: &str) -> Result<String, PostalError> {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 8 {
        return Err(PostalError::InvalidCep);
    }
    let non_digits = input
        .chars()
        .filter(|c| !c.is_ascii_digit() && !c.is_whitespace() && *c != '-')
        .count();
    if non_digits > 0 {
        return Err(PostalError::InvalidCep);
    }
    Ok(digits)
}

/// Format an 8-digit CEP as `#####-###`.
fn format_cep(digits: &str) -> String {
    format!("{}-{}", &digits[..5], &digits[5..])
}

/// Cached client for the public CEP lookup API.
#[derive(Clone)]
pub struct PostalClient {
    client: reqwest::Client,
    api_url: String,
    cache: Cache<String, PostalAddress>,
}

impl PostalClient {
    /// Create a new postal lookup client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(api_url: &str) -> Result<Self, PostalError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_owned(),
            cache,
        })
    }

    /// Resolve a CEP to an address.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCep` for malformed input, `NotFound` for an
    /// unassigned CEP, and transport errors otherwise. Only successful
    /// resolutions are cached.
    #[instrument(skip(self))]
    pub async fn lookup(&self, cep: &str) -> Result<PostalAddress, PostalError> {
        let digits = normalize_cep(cep)?;

        if let Some(cached) = self.cache.get(&digits).await {
            return Ok(cached);
        }

        let url = format!("{}/ws/{}/json/", self.api_url, digits);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        // The API answers 400 for syntactically bad CEPs; normalization
        // should have caught those already.
        if status == reqwest::StatusCode::BAD_REQUEST {
            return Err(PostalError::InvalidCep);
        }
        if !status.is_success() {
            return Err(PostalError::Parse(format!(
                "unexpected status {status} from postal API"
            )));
        }

        let parsed: ViaCepResponse = response
            .json()
            .await
            .map_err(|e| PostalError::Parse(e.to_string()))?;

        if parsed.erro {
            return Err(PostalError::NotFound);
        }

        let address = PostalAddress {
            cep: parsed.cep.unwrap_or_else(|| format_cep(&digits)),
            street: parsed.logradouro.unwrap_or_default(),
            neighborhood: parsed.bairro.unwrap_or_default(),
            city: parsed.localidade.unwrap_or_default(),
            uf: parsed.uf.unwrap_or_default(),
        };

        self.cache.insert(digits, address.clone()).await;
        Ok(address)
    }
}
