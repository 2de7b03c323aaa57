// packages/recorder/src/interception/mod.rs
//! Network interception layer
//!
//! The host's fetch/XHR hook calls into this module for every request and
//! response:
//!
//! - **Matcher**: Classifies URLs as traced, untraced or excluded
//! - **Traceparent**: W3C trace context for untraced backends
//! - **HTTP Payload**: Structured capture of headers, query and body
//! - **Correlator**: Joins requests with responses and dispatches the pair
//!
//! # Flow
//!
//! ```text
//! Host request
//!     │
//!     ├─ excluded / ingestion → untouched
//!     ├─ traced   → tracking headers added
//!     └─ untraced → traceparent ensured, stashed, body captured
//!                        │
//! Host response ─────────┴─→ joined → insert_client_recorded_payloads
//! ```

pub mod correlator;
pub mod http_payload;
pub mod matcher;
pub mod traceparent;

// Re-export commonly used types
pub use correlator::{
    CaptureResult, ExchangeOutcome, Interception, NetworkCorrelator, PendingExchange,
    RequestCapture, StashedResponse, MAX_PAYLOAD_BYTES,
};
pub use http_payload::{HttpBody, HttpPayload, PayloadSource, MAX_BODY_BYTES};
pub use matcher::{UriClass, UriMatcher};
pub use traceparent::Traceparent;
