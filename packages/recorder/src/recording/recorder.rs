// packages/recorder/src/recording/recorder.rs
//! Per-page-load session recorder
//!
//! Owns the session buffer, the DOM recording handle and the background
//! tasks (flush loop, stale-exchange sweeper). Every instance is
//! independent; nothing is process-global.

use crate::dispatch::payloads::EventList;
use crate::dispatch::{PayloadDispatcher, SessionRecordBatch, Transport, SESSION_RECORDS_PATH};
use crate::interception::NetworkCorrelator;
use crate::recording::buffer::{BufferStats, SessionBuffer, DEFAULT_RETAINED_SLICES};
use crate::recording::capture::{EventSink, RecordOptions, RecordingHandle, ReplayRecorder};
use crate::recording::event::RecordedEvent;
use crate::session::{CookieStore, RecordingMode, SamplingDecision, SessionIdentity};
use crate::utils::config::SdkConfig;
use crate::utils::errors::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Browser capabilities supplied by the host
#[derive(Clone)]
pub struct HostBindings {
    pub cookies: Arc<dyn CookieStore>,
    pub recorder: Arc<dyn ReplayRecorder>,
    pub transport: Arc<dyn Transport>,
}

/// State shared between the recorder and its flush loop
struct SessionState {
    buffer: Arc<Mutex<SessionBuffer>>,
    handle: Mutex<Option<Box<dyn RecordingHandle>>>,
    identity: Arc<SessionIdentity>,
    dispatcher: PayloadDispatcher,
    project_id: String,
    api_key: String,
    environment: String,
}

impl SessionState {
    /// Send the rolling buffer's contents
    fn flush(&self) {
        let events = self.buffer.lock().drain();
        self.send_events(events);
    }

    fn send_events(&self, events: Vec<RecordedEvent>) {
        if events.is_empty() {
            return;
        }

        let tracking_id = self.identity.tracking_id();
        if self.identity.take_snapshot_request() {
            // New tracking id: the next batch must open with a full snapshot
            if let Some(snapshot) = self.full_snapshot() {
                self.buffer.lock().push(snapshot, true);
            }
        }

        let event_list = match EventList::encode(&events) {
            Ok(list) => list,
            Err(e) => {
                warn!("Dropping {} events: {}", events.len(), e);
                return;
            }
        };

        debug!("Sending {} events for {}", event_list.len(), tracking_id);
        let batch = SessionRecordBatch {
            tracking_id,
            parent_tracking_id: self.identity.parent_tracking_id(),
            aware_project_id: self.project_id.clone(),
            aware_session_tracking_api_key: self.api_key.clone(),
            session_record_source: self.identity.session_record_source(),
            current_user_id: self.identity.current_user_id(),
            environment: self.environment.clone(),
            event_list,
        };
        self.dispatcher.send(SESSION_RECORDS_PATH, &batch);
    }

    fn full_snapshot(&self) -> Option<RecordedEvent> {
        match self.handle.lock().as_ref() {
            Some(handle) => handle.take_full_snapshot(),
            None => {
                error!("Full snapshot function is not available.");
                None
            }
        }
    }

    fn stop_recorder(&self) {
        if let Some(mut handle) = self.handle.lock().take() {
            handle.stop();
        }
    }
}

/// A running recording session
pub struct SessionRecorder {
    state: Arc<SessionState>,
    decision: SamplingDecision,
    correlator: Option<Arc<NetworkCorrelator>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionRecorder {
    /// Validate configuration, establish identity, draw sampling and start
    /// the DOM recorder in the chosen mode
    pub fn start(config: SdkConfig, host: &HostBindings) -> Result<Self> {
        config.validate()?;
        info!(
            "Initializing recording for TestChimp Project: {}",
            config.project_id()
        );

        let identity = Arc::new(SessionIdentity::new(
            Arc::clone(&host.cookies),
            &config.cookie_prefix,
        ));
        let tracking_id = identity.establish(config.session_id_cookie_key.as_deref());

        let decision = SamplingDecision::decide(
            config.sampling_probability,
            config.sampling_probability_on_error,
        );
        info!(
            "Should record session: {} should record on error: {}",
            decision.record_continuous, decision.record_on_error
        );

        let dispatcher = PayloadDispatcher::new(&config.endpoint, Arc::clone(&host.transport));

        let correlator = if decision.is_recording() {
            debug!("Installing request interception for {}", tracking_id);
            Some(Arc::new(NetworkCorrelator::new(
                &config,
                Arc::clone(&identity),
                dispatcher.clone(),
            )?))
        } else {
            None
        };

        let buffer = match decision.mode() {
            RecordingMode::OnError => SessionBuffer::checkpointed(DEFAULT_RETAINED_SLICES),
            RecordingMode::Continuous | RecordingMode::Disabled => SessionBuffer::rolling(),
        };

        let state = Arc::new(SessionState {
            buffer: Arc::new(Mutex::new(buffer)),
            handle: Mutex::new(None),
            identity,
            dispatcher,
            project_id: config.project_id().to_string(),
            api_key: config.api_key().to_string(),
            environment: config.environment.clone(),
        });

        let recorder = Self {
            state,
            decision,
            correlator,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        };

        match decision.mode() {
            RecordingMode::Continuous => {
                recorder.attach(host, RecordOptions::continuous(), true);
                recorder.spawn_flush_loop(config.snapshot_interval(), config.max_session_duration());
            }
            RecordingMode::OnError => {
                recorder.attach(host, RecordOptions::checkpointed(config.checkout_every_nth()), false);
            }
            RecordingMode::Disabled => info!("Session not sampled for recording"),
        }

        recorder.spawn_sweeper(config.pending_exchange_ttl());
        Ok(recorder)
    }

    fn attach(&self, host: &HostBindings, options: RecordOptions, strip_transforms: bool) {
        let sink = EventSink::new(Arc::clone(&self.state.buffer), strip_transforms);
        match host.recorder.record(options, sink) {
            Ok(handle) => *self.state.handle.lock() = Some(handle),
            Err(e) => error!("Failed to start DOM recording: {}", e),
        }
    }

    fn spawn_flush_loop(&self, period: Duration, max_duration: Option<Duration>) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, events will only be sent on stop");
            return;
        };

        let state = Arc::clone(&self.state);
        let cancel = self.cancel.child_token();
        let started_at = Instant::now();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(started_at + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let within_limit = max_duration
                            .map_or(true, |max| started_at.elapsed() < max);

                        if within_limit {
                            state.flush();
                        } else {
                            info!("Max session duration reached, stopping recording");
                            state.stop_recorder();
                            break;
                        }
                    }
                }
            }
        });

        self.tasks.lock().push(handle);
    }

    fn spawn_sweeper(&self, ttl: Duration) {
        let Some(correlator) = self.correlator.clone() else {
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            return;
        };

        let handle = runtime.spawn(correlator.run_sweeper(ttl, self.cancel.child_token()));
        self.tasks.lock().push(handle);
    }

    /// Hook for the host's uncaught-error handler
    ///
    /// Sends the last one or two checkpoint slices when the session is
    /// recorded on error only; otherwise does nothing.
    pub fn on_uncaught_error(&self) {
        if !(self.decision.record_on_error && !self.decision.record_continuous) {
            return;
        }
        let events = self.state.buffer.lock().error_window();
        debug!("Uncaught error, sending {} buffered events", events.len());
        self.state.send_events(events);
    }

    /// Stop the DOM recorder and background tasks, then flush what is left
    pub fn stop(&self) {
        self.cancel.cancel();
        self.state.stop_recorder();

        let remaining = self.state.buffer.lock().drain();
        if !remaining.is_empty() {
            info!("Sending remaining events of size: {}", remaining.len());
        }
        self.state.send_events(remaining);
    }

    /// Stop and expire the tracking cookies
    pub fn end_tracked_session(&self) {
        self.stop();
        self.state.identity.clear();
    }

    pub fn set_current_user_id(&self, user_id: &str) {
        self.state.identity.set_current_user_id(user_id);
    }

    /// Full snapshot of the current page, if the recorder can produce one
    pub fn capture_current_snapshot(&self) -> Option<RecordedEvent> {
        self.state.full_snapshot()
    }

    pub fn decision(&self) -> SamplingDecision {
        self.decision
    }

    pub fn correlator(&self) -> Option<Arc<NetworkCorrelator>> {
        self.correlator.clone()
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.state.identity
    }

    pub fn buffer_stats(&self) -> BufferStats {
        self.state.buffer.lock().stats()
    }

    pub fn is_recording(&self) -> bool {
        self.state.handle.lock().is_some()
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
