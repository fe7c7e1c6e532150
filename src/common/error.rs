use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevizeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Evidence number {number} is already taken")]
    SequenceConflict { number: String },

    #[error("No free evidence number after {attempts} attempts")]
    SequenceExhausted { attempts: u32 },

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

pub type Result<T> = std::result::Result<T, RevizeError>;

/// Transport failures while fetching the registry listing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("registry request timed out")]
    Timeout,

    #[error("registry connection failed: {0}")]
    Connect(String),

    #[error("registry answered with HTTP {0}")]
    Status(u16),

    #[error("registry response could not be read: {0}")]
    Body(String),
}
