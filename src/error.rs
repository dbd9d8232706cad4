use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errors from a single HTTP exchange with the PokéAPI.
///
/// Connection-level and server-side failures are retried by the extractor;
/// anything else fails the fetch immediately.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("http error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Whether another attempt at the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http { .. } => true,
            FetchError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::Client(_) | FetchError::Decode { .. } => false,
        }
    }
}

/// A cross-reference inside a raw document did not point anywhere usable.
/// Not retryable: the upstream data itself is malformed.
#[derive(Debug, Error)]
#[error("malformed {field} reference: {url:?}")]
pub struct DataShapeError {
    pub field: &'static str,
    pub url: String,
}

/// What the extraction stage can fail with.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Shape(#[from] DataShapeError),
}

/// A required field was absent or had the wrong type during transformation.
///
/// `field` names the document section being validated (`pokemon`, `species`,
/// `evolution_chain`, `move`) so failures can be traced back to the raw data.
#[derive(Debug, Error)]
#[error("validation failed for {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Store-level or validation failure during load, tagged with the model it
/// occurred on and optionally the offending record.
#[derive(Debug, Error)]
#[error("load failed for {model}: {reason}")]
pub struct LoadError {
    pub model: &'static str,
    pub reason: String,
    pub data: Option<Value>,
}

impl LoadError {
    pub fn new(model: &'static str, reason: impl Into<String>) -> Self {
        Self {
            model,
            reason: reason.into(),
            data: None,
        }
    }

    pub fn with_data(model: &'static str, reason: impl Into<String>, data: Value) -> Self {
        Self {
            model,
            reason: reason.into(),
            data: Some(data),
        }
    }

    pub fn database(model: &'static str, err: sqlx::Error) -> Self {
        Self::new(model, format!("database error: {err}"))
    }
}

/// Everything that can sink a single Pokémon at the coordinator's per-entity
/// boundary. These are recorded in the run statistics, never propagated.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl EntityError {
    /// Transform and load failures get the coordinator's inline retry; fetch
    /// failures already went through the extractor's own retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EntityError::Validation(_) | EntityError::Load(_))
    }
}

/// Fatal pipeline failure. Raised only when the listing stage itself fails;
/// per-entity failures are captured in the run statistics instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to list pokemon: {0}")]
    Listing(#[from] ExtractError),
}
