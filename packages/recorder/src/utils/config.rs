// packages/recorder/src/utils/config.rs
//! SDK configuration
//!
//! Field names follow the JavaScript SDK (`projectId`, `samplingProbability`,
//! ...) so a host can hand over the same object it would give the browser
//! bundle. Snake-case aliases are accepted for file and environment sources.

use crate::utils::errors::{Result, SdkError};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default ingestion base URL
pub const DEFAULT_ENDPOINT: &str = "https://ingress.testchimp.io";

/// Default cookie and header name prefix
pub const DEFAULT_COOKIE_PREFIX: &str = "testchimp";

/// Pattern that matches no URL
pub const MATCH_NOTHING: &str = "^$";

/// Flush intervals below this are raised to it
pub const MIN_SNAPSHOT_INTERVAL_MS: u64 = 1000;

/// Recorder configuration as supplied by the host page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SdkConfig {
    /// Project the recordings belong to (required)
    #[serde(alias = "project_id")]
    pub project_id: Option<String>,

    /// Ingestion API key (required)
    #[serde(alias = "session_recording_api_key", alias = "apiKey")]
    pub session_recording_api_key: Option<String>,

    /// Ingestion base URL
    pub endpoint: String,

    /// Probability of recording the whole session
    #[serde(alias = "sampling_probability")]
    pub sampling_probability: f64,

    /// Probability of recording only the window before an uncaught error
    #[serde(alias = "sampling_probability_on_error")]
    pub sampling_probability_on_error: f64,

    /// Continuous recording stops after this many seconds (0 = unlimited)
    #[serde(alias = "max_session_duration_secs")]
    pub max_session_duration_secs: u64,

    /// Checkout interval, in events, for error-only recording
    #[serde(alias = "event_window_to_save_on_error")]
    pub event_window_to_save_on_error: usize,

    /// Continuous flush interval (milliseconds)
    #[serde(alias = "snapshot_interval_ms", alias = "snapshotInterval")]
    pub snapshot_interval_ms: u64,

    /// URIs already carrying distributed tracing
    #[serde(
        alias = "traced_uri_regex_list_to_track",
        alias = "urlRegexToAddTracking",
        deserialize_with = "pattern_list"
    )]
    pub traced_uri_regex_list_to_track: Vec<String>,

    /// URIs without tracing that should still be captured
    #[serde(alias = "untraced_uri_regex_list_to_track", deserialize_with = "pattern_list")]
    pub untraced_uri_regex_list_to_track: Vec<String>,

    /// URIs never touched by the interceptor
    #[serde(alias = "excluded_uri_regex_list", deserialize_with = "pattern_list")]
    pub excluded_uri_regex_list: Vec<String>,

    /// Environment tag attached to every payload
    pub environment: String,

    /// Emit SDK diagnostics at debug level
    #[serde(alias = "enable_logging")]
    pub enable_logging: bool,

    /// Format diagnostics as JSON lines
    #[serde(alias = "log_json")]
    pub log_json: bool,

    /// Capture OPTIONS (preflight) requests
    #[serde(alias = "enable_options_call_tracking")]
    pub enable_options_call_tracking: bool,

    /// Cookie holding the host's own session id, if any
    #[serde(alias = "session_id_cookie_key")]
    pub session_id_cookie_key: Option<String>,

    /// Prefix for tracking cookies and headers (`testchimp`, legacy `aware`)
    #[serde(alias = "cookie_prefix")]
    pub cookie_prefix: String,

    /// Pending request/response pairs older than this are evicted
    #[serde(alias = "pending_exchange_ttl_secs")]
    pub pending_exchange_ttl_secs: u64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            session_recording_api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            sampling_probability: 1.0,
            sampling_probability_on_error: 0.0,
            max_session_duration_secs: 600,
            event_window_to_save_on_error: 200,
            snapshot_interval_ms: 5000,
            traced_uri_regex_list_to_track: vec![MATCH_NOTHING.to_string()],
            untraced_uri_regex_list_to_track: vec![MATCH_NOTHING.to_string()],
            excluded_uri_regex_list: Vec::new(),
            environment: "QA".to_string(),
            enable_logging: true,
            log_json: false,
            enable_options_call_tracking: false,
            session_id_cookie_key: None,
            cookie_prefix: DEFAULT_COOKIE_PREFIX.to_string(),
            pending_exchange_ttl_secs: 300,
        }
    }
}

impl SdkConfig {
    /// Minimal configuration with the two required keys set
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            session_recording_api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Parse the JavaScript-style configuration object
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from an optional file, then `TESTCHIMP_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!("Loading SDK configuration from {:?}", path);
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TESTCHIMP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|c| c.try_deserialize::<SdkConfig>())
            .map_err(|e| SdkError::ConfigError(format!("Failed to load configuration: {}", e)))
    }

    /// Check the keys without which nothing may be recorded
    pub fn validate(&self) -> Result<()> {
        if self.project_id.as_deref().map_or(true, str::is_empty) {
            return Err(SdkError::ConfigError(
                "No project id specified for session capture".to_string(),
            ));
        }
        if self
            .session_recording_api_key
            .as_deref()
            .map_or(true, str::is_empty)
        {
            return Err(SdkError::ConfigError(
                "No session recording api key specified for session capture".to_string(),
            ));
        }
        Ok(())
    }

    pub fn project_id(&self) -> &str {
        self.project_id.as_deref().unwrap_or_default()
    }

    pub fn api_key(&self) -> &str {
        self.session_recording_api_key.as_deref().unwrap_or_default()
    }

    /// Continuous flush interval, never below one second
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms.max(MIN_SNAPSHOT_INTERVAL_MS))
    }

    /// Upper bound on continuous recording, `None` when unlimited
    pub fn max_session_duration(&self) -> Option<Duration> {
        match self.max_session_duration_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Checkout interval for error-only recording (at least one event)
    pub fn checkout_every_nth(&self) -> usize {
        self.event_window_to_save_on_error.max(1)
    }

    pub fn pending_exchange_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_exchange_ttl_secs)
    }
}

/// Accepts either a list of patterns or one comma-separated string
fn pattern_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PatternList {
        Joined(String),
        List(Vec<String>),
    }

    let patterns: Vec<String> = match PatternList::deserialize(deserializer)? {
        PatternList::Joined(joined) => joined.split(',').map(|p| p.trim().to_string()).collect(),
        PatternList::List(list) => list.into_iter().map(|p| p.trim().to_string()).collect(),
    };

    Ok(patterns.into_iter().filter(|p| !p.is_empty()).collect())
}
