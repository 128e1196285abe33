//! Error type shared by the redactor crates
//!
//! Storage, config and input validation failures all surface as [`Error`].
//! Service-level failures (provider, document store) have their own enums in
//! redactor-gen and convert from this one where they touch storage.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file or stored setting could not be parsed or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request rejected before any work started; reported to clients as 400
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
