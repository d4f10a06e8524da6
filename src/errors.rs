// src/errors.rs

//! Crate-wide error types.
//!
//! Ordinary execution failures (non-zero exit, missing interpreter, timeout)
//! are *not* errors: they travel as [`crate::exec::ExecutionResult`] values.
//! The types here cover configuration, request decoding and other failures
//! that abort an operation as a whole.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockbotError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BlockbotError>;
