//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`GeosceneError`] covers all failure modes including:
//! - Asset fetching and decoding errors
//! - glTF document validation errors
//! - Scene description parsing errors
//! - I/O and network errors
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, GeosceneError>`.

use thiserror::Error;

/// The main error type for the geoscene loader.
///
/// Each variant provides specific context about what went wrong. Fetch and
/// decode failures occurring during asynchronous resource resolution are
/// aggregated: the load still drains every outstanding request and then
/// surfaces the first-seen error exactly once.
#[derive(Error, Debug)]
pub enum GeosceneError {
    // ========================================================================
    // Asset Validation Errors
    // ========================================================================
    /// The glTF `asset.version` is missing, malformed, or the major version
    /// is below 2.
    #[error("Unsupported glTF version: {0}")]
    VersionUnsupported(String),

    /// A requested scene index lies outside `[0, scenes.len)`.
    #[error("Scene index out of range: {index} (scene count: {count})")]
    SceneIndexOutOfRange {
        /// The invalid index
        index: usize,
        /// Number of scenes in the document
        count: usize,
    },

    /// A required JSON field is missing, an accessor component/type code is
    /// unknown, an accessor exceeds its buffer bounds, a buffer view stride
    /// is invalid, or a binary mesh header is invalid or truncated.
    #[error("Malformed asset: {0}")]
    MalformedAsset(String),

    // ========================================================================
    // Resource Resolution Errors
    // ========================================================================
    /// At least one buffer or image fetch failed. Aggregated; there is no
    /// per-resource surfacing.
    #[error("Asset fetch failed: {0}")]
    FetchFailed(String),

    /// Fetched image bytes could not be decoded.
    #[error("Image decode failed: {0}")]
    DecodeFailed(String),

    /// Data URI parsing error.
    #[error("Data URI error: {0}")]
    DataUriError(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ========================================================================
    // HTTP & Network Errors
    // ========================================================================
    /// HTTP request error.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// URL parsing error.
    #[cfg(feature = "http")]
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// HTTP response error with status code.
    #[error("HTTP response error: status {status}")]
    HttpResponseError {
        /// HTTP status code
        status: u16,
    },

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    // ========================================================================
    // Async & Threading Errors
    // ========================================================================
    /// Task join error (when a blocking decode task fails to complete).
    #[error("Task join error: {0}")]
    TaskJoinError(String),
}

impl From<image::ImageError> for GeosceneError {
    fn from(err: image::ImageError) -> Self {
        GeosceneError::DecodeFailed(err.to_string())
    }
}

impl From<tokio::task::JoinError> for GeosceneError {
    fn from(err: tokio::task::JoinError) -> Self {
        GeosceneError::TaskJoinError(err.to_string())
    }
}

/// Alias for `Result<T, GeosceneError>`.
pub type Result<T> = std::result::Result<T, GeosceneError>;
