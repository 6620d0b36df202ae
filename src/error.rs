// Error taxonomy for one fetch-and-persist cycle.
// All variants are recoverable at the step boundary: the window is retried next cycle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("analytics API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("analytics API rejected credentials (HTTP {status})")]
    Auth { status: u16 },
    #[error("analytics API reported errors: {0}")]
    GraphQl(String),
    #[error("malformed analytics response: {0}")]
    Malformed(String),
    #[error("environment variable {0} with the API token is not set")]
    MissingCredentials(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema error: {0}")]
    Schema(String),
}

#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("response is missing {0}")]
    MissingStructure(&'static str),
    #[error("invalid bucket datetime {0:?}")]
    InvalidTimestamp(String),
}

/// Any failure inside one FetchAndPersistStep.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizationError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}
