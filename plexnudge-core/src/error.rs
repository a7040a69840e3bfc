use thiserror::Error;

/// Failures surfaced by the refresh pipeline.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("link target already exists: {0}")]
    AlreadyExists(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RefreshError>;
