// packages/recorder/src/recording/event.rs
//! Recorded DOM/interaction events
//!
//! Events are opaque JSON produced by the DOM recorder. The SDK only peeks
//! at the event kind and, for attribute mutations, at the changed attributes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event kinds emitted by the DOM recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    DomContentLoaded,
    Load,
    FullSnapshot,
    IncrementalSnapshot,
    Meta,
    Custom,
    Plugin,
}

impl EventKind {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(EventKind::DomContentLoaded),
            1 => Some(EventKind::Load),
            2 => Some(EventKind::FullSnapshot),
            3 => Some(EventKind::IncrementalSnapshot),
            4 => Some(EventKind::Meta),
            5 => Some(EventKind::Custom),
            6 => Some(EventKind::Plugin),
            _ => None,
        }
    }

    pub fn code(&self) -> u64 {
        match self {
            EventKind::DomContentLoaded => 0,
            EventKind::Load => 1,
            EventKind::FullSnapshot => 2,
            EventKind::IncrementalSnapshot => 3,
            EventKind::Meta => 4,
            EventKind::Custom => 5,
            EventKind::Plugin => 6,
        }
    }
}

/// Incremental snapshot source for DOM mutations
const MUTATION_SOURCE: u64 = 0;

/// One event as emitted by the recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordedEvent(Value);

impl RecordedEvent {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn kind(&self) -> Option<EventKind> {
        self.0.get("type").and_then(Value::as_u64).and_then(EventKind::from_code)
    }

    /// Recorder timestamp (milliseconds since epoch)
    pub fn timestamp(&self) -> Option<i64> {
        self.0.get("timestamp").and_then(Value::as_i64)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn is_attribute_mutation(&self) -> bool {
        self.kind() == Some(EventKind::IncrementalSnapshot)
            && self.0.pointer("/data/source").and_then(Value::as_u64) == Some(MUTATION_SOURCE)
            && self
                .0
                .pointer("/data/attributes")
                .and_then(Value::as_array)
                .map_or(false, |attrs| !attrs.is_empty())
    }
}

/// Remove transform-only attribute changes from a mutation event
///
/// Returns `None` when every attribute change in the event was a transform,
/// so the event carries nothing worth sending. Full snapshots and all other
/// events pass through untouched.
pub fn strip_transform_mutations(event: RecordedEvent) -> Option<RecordedEvent> {
    if !event.is_attribute_mutation() {
        return Some(event);
    }

    let mut value = event.into_value();
    if let Some(attributes) = value
        .pointer_mut("/data/attributes")
        .and_then(Value::as_array_mut)
    {
        attributes.retain(|change| !is_transform_change(change));
        if attributes.is_empty() {
            return None;
        }
    }

    Some(RecordedEvent(value))
}

fn is_transform_change(change: &Value) -> bool {
    let Some(attrs) = change.get("attributes") else {
        return false;
    };
    let style_transform = attrs
        .get("style")
        .and_then(|style| style.get("transform"))
        .map_or(false, is_truthy);
    let transform = attrs.get("transform").map_or(false, is_truthy);

    style_transform || transform
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
