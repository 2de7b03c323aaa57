// packages/recorder/src/utils/errors.rs
//! Error types for the recorder crate
//!
//! Every failure the SDK can hit resolves to "drop this telemetry" at the
//! public surface. These errors exist for the internal plumbing and for hosts
//! that want to know why `start` refused to record.

use thiserror::Error;

/// Errors raised inside the SDK
#[derive(Debug, Error)]
pub enum SdkError {
    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The DOM recording primitive could not be started
    #[error("recording failed: {0}")]
    RecordingFailed(String),

    /// A request or response could not be intercepted
    #[error("interception failed: {0}")]
    InterceptionFailed(String),

    /// An HTTP payload could not be materialized
    #[error("payload capture failed: {0}")]
    PayloadFailed(String),

    /// Delivery to the ingestion endpoint failed
    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A URI pattern did not compile
    #[error("invalid uri pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SdkError>;
