//! Key-value storage errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("KV API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
