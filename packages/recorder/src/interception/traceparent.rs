// packages/recorder/src/interception/traceparent.rs
//! W3C `traceparent` header handling
//!
//! Untraced requests get a fresh `00-<trace-id>-<span-id>-01` header so the
//! captured exchange can be joined with backend spans later.

use opentelemetry::trace::{SpanId, TraceId};
use rand::Rng;
use std::fmt;

/// Header name
pub const TRACEPARENT_HEADER: &str = "traceparent";

const VERSION: &str = "00";
const SAMPLED: &str = "01";

/// A sampled trace context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Traceparent {
    pub trace_id: TraceId,
    pub span_id: SpanId,
}

impl Traceparent {
    /// Fresh random trace and span ids
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            trace_id: TraceId::from_bytes(rng.gen::<[u8; 16]>()),
            span_id: SpanId::from_bytes(rng.gen::<[u8; 8]>()),
        }
    }

    /// Lower-case hex span id
    pub fn span_id_hex(&self) -> String {
        self.span_id.to_string()
    }
}

impl fmt::Display for Traceparent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", VERSION, self.trace_id, self.span_id, SAMPLED)
    }
}

/// Span id carried by an existing header: the third dash-separated field
///
/// Hosts sometimes emit slightly malformed headers, so no validation beyond
/// "the field exists and is non-empty" is applied.
pub fn span_id_of(traceparent: &str) -> Option<&str> {
    traceparent
        .split('-')
        .nth(2)
        .map(str::trim)
        .filter(|span| !span.is_empty())
}
