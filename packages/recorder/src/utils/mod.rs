// packages/recorder/src/utils/mod.rs
//! Common utilities shared by the recorder, correlator and dispatcher
//!
//! - **config**: SDK configuration, defaults and loading
//! - **errors**: Crate-wide error type
//! - **ids**: Session and request identifier generation

pub mod config;
pub mod errors;
pub mod ids;

pub use config::SdkConfig;
pub use errors::{Result, SdkError};
pub use ids::RequestId;
