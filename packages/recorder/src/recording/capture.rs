// packages/recorder/src/recording/capture.rs
//! Adapter over the host's DOM recording primitive
//!
//! The host implements [`ReplayRecorder`]; the SDK hands it fixed
//! [`RecordOptions`] and an [`EventSink`] to call for every emitted event.

use crate::recording::buffer::SessionBuffer;
use crate::recording::event::{strip_transform_mutations, RecordedEvent};
use crate::utils::errors::Result;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// How typed input is captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputCapture {
    /// Only the final value of a burst of keystrokes
    Last,
    /// Every change
    All,
}

/// Event sampling handed to the recorder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingPolicy {
    pub mousemove: bool,
    pub mouse_interaction: bool,

    /// Minimum gap between scroll events (ms)
    pub scroll: u64,

    /// Minimum gap between media interaction events (ms)
    pub media: u64,

    pub input: InputCapture,
}

impl SamplingPolicy {
    /// The SDK's fixed policy
    pub fn fixed() -> Self {
        Self {
            mousemove: false,
            mouse_interaction: true,
            scroll: 150,
            media: 800,
            input: InputCapture::Last,
        }
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self::fixed()
    }
}

/// Options passed to [`ReplayRecorder::record`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOptions {
    pub sampling: SamplingPolicy,

    /// Signal a checkout every N events (error-only recording)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_every_nth: Option<usize>,

    pub record_canvas: bool,

    /// Elements never recorded
    pub ignored_tags: Vec<String>,

    /// Elements carrying this attribute are never recorded
    pub ignore_attribute: String,
}

impl RecordOptions {
    /// Options for continuous recording
    pub fn continuous() -> Self {
        Self {
            sampling: SamplingPolicy::fixed(),
            checkout_every_nth: None,
            record_canvas: false,
            ignored_tags: vec!["VIDEO".to_string(), "CANVAS".to_string()],
            ignore_attribute: "data-rrweb-ignore".to_string(),
        }
    }

    /// Options for error-only recording
    pub fn checkpointed(every_nth: usize) -> Self {
        Self {
            checkout_every_nth: Some(every_nth.max(1)),
            ..Self::continuous()
        }
    }
}

/// Receives events from the recorder and appends them to the session buffer
///
/// Cloneable and cheap; the append never suspends.
#[derive(Clone)]
pub struct EventSink {
    buffer: Arc<Mutex<SessionBuffer>>,
    strip_transforms: bool,
}

impl EventSink {
    pub fn new(buffer: Arc<Mutex<SessionBuffer>>, strip_transforms: bool) -> Self {
        Self {
            buffer,
            strip_transforms,
        }
    }

    /// Called by the recorder for every event; `is_checkout` marks the first
    /// event after a full-state checkpoint
    pub fn emit(&self, event: RecordedEvent, is_checkout: bool) {
        let event = if self.strip_transforms {
            match strip_transform_mutations(event) {
                Some(event) => event,
                None => return,
            }
        } else {
            event
        };
        self.buffer.lock().push(event, is_checkout);
    }
}

/// Handle to a running DOM recorder
pub trait RecordingHandle: Send {
    /// Stop emitting events
    fn stop(&mut self);

    /// Produce a full snapshot of the current page, if supported
    fn take_full_snapshot(&self) -> Option<RecordedEvent>;
}

/// The host's DOM recording primitive
pub trait ReplayRecorder: Send + Sync {
    /// Start recording; every event goes to `sink`
    fn record(&self, options: RecordOptions, sink: EventSink) -> Result<Box<dyn RecordingHandle>>;
}
