// packages/recorder/src/lib.rs
//! TestChimp Session Recorder
//!
//! Client-side session capture: DOM replay events are buffered and shipped
//! to the TestChimp ingestion service, and selected backend calls are
//! captured and correlated with the session.
//!
//! # Architecture
//!
//! The recorder is structured into several key modules:
//!
//! - **session**: Cookie-backed identity and per-session sampling
//! - **recording**: Event buffering, host recorder adapter, flush lifecycle
//! - **interception**: URL classification, trace context, payload capture
//! - **dispatch**: Wire formats and fire-and-forget delivery
//! - **sdk**: Host-facing entry points
//! - **observability**: Tracing subscriber setup
//! - **utils**: Configuration, errors, identifiers
//!
//! Browser capabilities (cookies, the DOM recorder, outbound HTTP) are
//! supplied by the host through [`HostBindings`].

// Public module exports
pub mod dispatch;
pub mod interception;
pub mod observability;
pub mod recording;
pub mod sdk;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use dispatch::{HttpTransport, Transport};
pub use interception::{ExchangeOutcome, Interception, NetworkCorrelator};
pub use recording::{HostBindings, RecordOptions, RecordedEvent, ReplayRecorder, SessionRecorder};
pub use sdk::TestChimpSdk;
pub use session::{CookieJar, CookieStore};
pub use utils::config::SdkConfig;
pub use utils::errors::{Result, SdkError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
