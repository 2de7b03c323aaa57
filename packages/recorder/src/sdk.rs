// packages/recorder/src/sdk.rs
//! Host-facing entry points
//!
//! `TestChimpSdk` is what a page embeds. Nothing here returns an error to
//! the host: invalid configuration is logged and leaves the SDK inert.

use crate::interception::NetworkCorrelator;
use crate::recording::event::RecordedEvent;
use crate::recording::recorder::{HostBindings, SessionRecorder};
use crate::session::SessionIdentity;
use crate::utils::config::{SdkConfig, DEFAULT_COOKIE_PREFIX};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TestChimpSdk {
    host: HostBindings,
    session: RwLock<Option<Arc<SessionRecorder>>>,

    /// Cookie prefix of the most recent configuration
    cookie_prefix: RwLock<String>,
}

impl TestChimpSdk {
    pub fn new(host: HostBindings) -> Self {
        Self {
            host,
            session: RwLock::new(None),
            cookie_prefix: RwLock::new(DEFAULT_COOKIE_PREFIX.to_string()),
        }
    }

    /// Start a session, replacing any running one; returns whether one started
    pub fn start_recording(&self, config: SdkConfig) -> bool {
        let previous = self.session.write().take();
        if let Some(previous) = previous {
            info!("Replacing running recording session");
            previous.stop();
        }

        *self.cookie_prefix.write() = config.cookie_prefix.clone();
        match SessionRecorder::start(config, &self.host) {
            Ok(recorder) => {
                *self.session.write() = Some(Arc::new(recorder));
                true
            }
            Err(e) => {
                warn!("Session capture disabled: {}", e);
                false
            }
        }
    }

    /// Start from the JavaScript-style configuration object
    pub fn start_recording_json(&self, config: &str) -> bool {
        match SdkConfig::from_json(config) {
            Ok(config) => self.start_recording(config),
            Err(e) => {
                warn!("Session capture disabled: {}", e);
                false
            }
        }
    }

    /// Stop recording and flush; tracking cookies survive
    pub fn stop_recording(&self) {
        let session = self.session.write().take();
        if let Some(session) = session {
            session.stop();
        }
    }

    /// Stop recording and expire the tracking cookies
    pub fn end_tracked_session(&self) {
        let session = self.session.write().take();
        if let Some(session) = session {
            session.end_tracked_session();
        }
    }

    /// Store the host's user id; works with or without a running session
    pub fn set_current_user_id(&self, user_id: &str) {
        let prefix = self.cookie_prefix.read().clone();
        SessionIdentity::new(Arc::clone(&self.host.cookies), &prefix).set_current_user_id(user_id);
    }

    pub fn capture_current_snapshot(&self) -> Option<RecordedEvent> {
        self.active()?.capture_current_snapshot()
    }

    pub fn on_uncaught_error(&self) {
        if let Some(session) = self.active() {
            session.on_uncaught_error();
        }
    }

    /// The correlator the host's fetch/XHR hook should call, when sampled
    pub fn correlator(&self) -> Option<Arc<NetworkCorrelator>> {
        self.active()?.correlator()
    }

    pub fn is_active(&self) -> bool {
        self.session.read().is_some()
    }

    fn active(&self) -> Option<Arc<SessionRecorder>> {
        self.session.read().clone()
    }
}
