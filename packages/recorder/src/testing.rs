// packages/recorder/src/testing.rs
//! Host fakes shared by the unit tests

use crate::dispatch::Transport;
use crate::recording::capture::{EventSink, RecordOptions, RecordingHandle, ReplayRecorder};
use crate::recording::event::RecordedEvent;
use crate::utils::errors::{Result, SdkError};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// One POST seen by [`CapturingTransport`]
#[derive(Debug, Clone)]
pub struct CapturedPost {
    pub url: String,
    pub body: Value,
}

/// Records every POST synchronously; optionally fails delivery
#[derive(Default)]
pub struct CapturingTransport {
    posts: Mutex<Vec<CapturedPost>>,
    fail: bool,
}

impl CapturingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<CapturedPost> {
        self.posts.lock().clone()
    }

    pub fn posts_to(&self, path: &str) -> Vec<CapturedPost> {
        self.posts()
            .into_iter()
            .filter(|post| post.url.ends_with(path))
            .collect()
    }
}

impl Transport for CapturingTransport {
    fn post(&self, url: String, body: Bytes) -> BoxFuture<'static, Result<()>> {
        let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
        self.posts.lock().push(CapturedPost { url, body });

        let fail = self.fail;
        async move {
            if fail {
                Err(SdkError::DispatchFailed("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
        .boxed()
    }
}

/// DOM recorder driven by the test through [`ScriptedRecorder::emit`]
#[derive(Default)]
pub struct ScriptedRecorder {
    sink: Mutex<Option<EventSink>>,
    options: Mutex<Option<RecordOptions>>,
    stopped: Arc<AtomicBool>,
    snapshots: Arc<AtomicUsize>,
    fail: bool,
}

impl ScriptedRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `record` always returns an error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn emit(&self, event: RecordedEvent, is_checkout: bool) {
        let sink = self.sink.lock().clone().expect("recorder not started");
        sink.emit(event, is_checkout);
    }

    pub fn options(&self) -> Option<RecordOptions> {
        self.options.lock().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }
}

impl ReplayRecorder for ScriptedRecorder {
    fn record(&self, options: RecordOptions, sink: EventSink) -> Result<Box<dyn RecordingHandle>> {
        if self.fail {
            return Err(SdkError::RecordingFailed("recorder unavailable".to_string()));
        }

        *self.options.lock() = Some(options);
        *self.sink.lock() = Some(sink);
        Ok(Box::new(ScriptedHandle {
            stopped: Arc::clone(&self.stopped),
            snapshots: Arc::clone(&self.snapshots),
        }))
    }
}

struct ScriptedHandle {
    stopped: Arc<AtomicBool>,
    snapshots: Arc<AtomicUsize>,
}

impl RecordingHandle for ScriptedHandle {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn take_full_snapshot(&self) -> Option<RecordedEvent> {
        let n = self.snapshots.fetch_add(1, Ordering::SeqCst);
        Some(RecordedEvent::new(json!({"type": 2, "data": {"node": {}}, "snapshot": n})))
    }
}
