//! Error Handling Module
//!
//! This module defines custom error types for ipgeocache using the `thiserror` crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("Cache unwritable: {0}")]
    CacheUnwritable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, GeoError>;
