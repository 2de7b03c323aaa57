// packages/recorder/src/interception/correlator.rs
//! Request/response correlation for untraced backends
//!
//! `on_request` decides synchronously what to do with an outgoing request:
//! leave it alone, tag it with tracking headers, or start a capture. A
//! capture stashes the URL and span id immediately and hands back a
//! [`RequestCapture`] that reads the body in the background. Each side
//! writes into the same pending entry, and whichever of `on_response` or
//! [`RequestCapture::run`] completes the pair dispatches it once.

use crate::dispatch::{ClientRecordedPayloads, PayloadDispatcher, CLIENT_PAYLOADS_PATH};
use crate::dispatch::payloads::CapturedSide;
use crate::interception::http_payload::{HttpPayload, PayloadSource};
use crate::interception::matcher::{is_ingestion_call, UriMatcher};
use crate::interception::traceparent::{span_id_of, Traceparent, TRACEPARENT_HEADER};
use crate::session::SessionIdentity;
use crate::utils::config::SdkConfig;
use crate::utils::errors::{Result, SdkError};
use crate::utils::ids::RequestId;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Method, Request, Response};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Captured payloads whose JSON form exceeds this are not sent
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// A request waiting for its response, or the reverse
#[derive(Debug, Clone)]
pub struct PendingExchange {
    /// Origin and path, no query string
    pub url: String,
    pub span_id: String,
    pub request_payload: Option<HttpPayload>,
    pub response: Option<StashedResponse>,

    /// Milliseconds since epoch
    pub request_timestamp: i64,
    pub created_at: Instant,
}

impl PendingExchange {
    fn is_complete(&self) -> bool {
        self.request_payload.is_some() && self.response.is_some()
    }
}

/// Response side held until the request body has been read
#[derive(Debug, Clone)]
pub struct StashedResponse {
    pub payload: HttpPayload,

    /// Milliseconds since epoch
    pub timestamp: i64,
}

/// What `on_request` did with a request
pub enum Interception {
    /// Request left untouched
    Skipped,

    /// Tracking headers added, nothing captured
    Tagged,

    /// Stashed; the capture must be run to record the body
    Capturing(RequestCapture),
}

/// Outcome of reading and stashing a request body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureResult {
    /// Body stashed; the response will complete the pair
    Stashed,

    /// Response was already stashed and the pair has been sent
    Dispatched,

    /// Payload too large; the exchange is discarded
    Oversized,

    /// Pair could not be encoded
    Dropped,

    /// Exchange was evicted or completed before the body was read
    Orphaned,
}

/// Outcome of `on_response`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Pair sent to the ingestion service
    Dispatched,

    /// Response stashed; the request capture sends the pair
    Deferred,

    /// No pending request to join; nothing sent
    Incomplete,

    /// Response too large or pair not encodable; exchange discarded
    Dropped,

    /// Not a tracked exchange
    Ignored,
}

/// Pending exchanges plus everything needed to send a completed one
struct ExchangeJoin {
    pending: DashMap<RequestId, PendingExchange>,
    identity: Arc<SessionIdentity>,
    dispatcher: PayloadDispatcher,
    project_id: String,
    api_key: String,
    environment: String,
}

impl ExchangeJoin {
    /// Remove and send `id` if both sides are present
    fn complete(&self, id: &RequestId) -> ExchangeOutcome {
        let Some((_, exchange)) = self.pending.remove_if(id, |_, exchange| exchange.is_complete())
        else {
            return ExchangeOutcome::Incomplete;
        };

        match self.build_payloads(exchange) {
            Ok(payloads) => {
                self.dispatcher.send(CLIENT_PAYLOADS_PATH, &payloads);
                ExchangeOutcome::Dispatched
            }
            Err(e) => {
                warn!("Error populating response payload: {}", e);
                ExchangeOutcome::Dropped
            }
        }
    }

    fn build_payloads(&self, exchange: PendingExchange) -> Result<ClientRecordedPayloads> {
        let missing = |side: &str| SdkError::PayloadFailed(format!("{} payload missing", side));
        let request_payload = exchange.request_payload.as_ref().ok_or_else(|| missing("request"))?;
        let response = exchange.response.as_ref().ok_or_else(|| missing("response"))?;

        let request_side = CapturedSide {
            span_id: &exchange.span_id,
            http_payload: request_payload,
        };
        let response_side = CapturedSide {
            span_id: &exchange.span_id,
            http_payload: &response.payload,
        };

        Ok(ClientRecordedPayloads {
            aware_project_id: self.project_id.clone(),
            aware_session_tracking_api_key: self.api_key.clone(),
            request_payload: request_side.encode()?,
            response_payload: response_side.encode()?,
            current_user_id: self.identity.current_user_id(),
            url: exchange.url,
            tracking_id: self.identity.tracking_id(),
            parent_tracking_id: self.identity.parent_tracking_id(),
            environment: self.environment.clone(),
            request_timestamp: exchange.request_timestamp,
            response_timestamp: response.timestamp,
        })
    }
}

/// Deferred read of a request body
pub struct RequestCapture {
    id: RequestId,
    source: PayloadSource<Full<Bytes>>,
    join: Arc<ExchangeJoin>,
}

impl RequestCapture {
    pub fn request_id(&self) -> &RequestId {
        &self.id
    }

    pub async fn run(self) -> CaptureResult {
        let payload = self.source.materialize().await;

        if payload.encoded_len() > MAX_PAYLOAD_BYTES {
            debug!("Skipping request capture due to large payload size");
            self.join.pending.remove(&self.id);
            return CaptureResult::Oversized;
        }

        match self.join.pending.get_mut(&self.id) {
            Some(mut exchange) => exchange.request_payload = Some(payload),
            None => return CaptureResult::Orphaned,
        };

        match self.join.complete(&self.id) {
            ExchangeOutcome::Dispatched => CaptureResult::Dispatched,
            ExchangeOutcome::Dropped => CaptureResult::Dropped,
            _ => CaptureResult::Stashed,
        }
    }
}

/// Header names for traced backends
#[derive(Debug, Clone)]
struct TrackingHeaders {
    tracking_id: HeaderName,
    parent_tracking_id: HeaderName,
    current_user_id: HeaderName,
}

impl TrackingHeaders {
    fn with_prefix(prefix: &str) -> Result<Self> {
        let name = |suffix: &str| {
            let name = format!("{}-{}", prefix, suffix);
            HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
                .map_err(|e| SdkError::InterceptionFailed(format!("Invalid header {}: {}", name, e)))
        };

        Ok(Self {
            tracking_id: name("session-record-tracking-id")?,
            parent_tracking_id: name("parent-session-record-tracking-id")?,
            current_user_id: name("current-user-id")?,
        })
    }
}

/// Joins intercepted requests with their responses
pub struct NetworkCorrelator {
    matcher: UriMatcher,
    headers: TrackingHeaders,
    track_options: bool,
    join: Arc<ExchangeJoin>,
}

impl NetworkCorrelator {
    pub fn new(
        config: &SdkConfig,
        identity: Arc<SessionIdentity>,
        dispatcher: PayloadDispatcher,
    ) -> Result<Self> {
        let matcher = UriMatcher::new(
            &config.traced_uri_regex_list_to_track,
            &config.untraced_uri_regex_list_to_track,
            &config.excluded_uri_regex_list,
        )?;

        if matcher.is_too_broad() {
            warn!("Regex for capturing requests is too broad. Define a narrow regex");
        }

        Ok(Self {
            matcher,
            headers: TrackingHeaders::with_prefix(&config.cookie_prefix)?,
            track_options: config.enable_options_call_tracking,
            join: Arc::new(ExchangeJoin {
                pending: DashMap::new(),
                identity,
                dispatcher,
                project_id: config.project_id().to_string(),
                api_key: config.api_key().to_string(),
                environment: config.environment.clone(),
            }),
        })
    }

    /// Inspect an outgoing request, adding headers where required
    pub fn on_request(&self, id: &RequestId, request: &mut Request<Full<Bytes>>) -> Interception {
        if *request.method() == Method::OPTIONS && !self.track_options {
            return Interception::Skipped;
        }
        if self.matcher.is_too_broad() {
            return Interception::Skipped;
        }

        let url = request.uri().to_string();
        if is_ingestion_call(&url) {
            return Interception::Skipped;
        }

        let class = self.matcher.classify(&url);
        if class.excluded {
            return Interception::Skipped;
        }

        if class.traced {
            debug!("Request matches regex for interception {}", url);
            self.tag(request.headers_mut());
            return Interception::Tagged;
        }

        if !class.untraced {
            return Interception::Skipped;
        }

        debug!("Request matches regex for untraced uris to track {}", url);
        let span_id = self.ensure_traceparent(request.headers_mut());

        self.join.pending.insert(
            id.clone(),
            PendingExchange {
                url: strip_query(&url),
                span_id,
                request_payload: None,
                response: None,
                request_timestamp: Utc::now().timestamp_millis(),
                created_at: Instant::now(),
            },
        );

        Interception::Capturing(RequestCapture {
            id: id.clone(),
            source: PayloadSource::from_request(request),
            join: Arc::clone(&self.join),
        })
    }

    /// Join a response with its pending request and dispatch the pair
    pub async fn on_response(
        &self,
        id: &RequestId,
        url: &str,
        response: &Response<Full<Bytes>>,
    ) -> ExchangeOutcome {
        if is_ingestion_call(url) || self.matcher.is_too_broad() || self.matcher.is_excluded(url) {
            return ExchangeOutcome::Ignored;
        }
        if !self.matcher.is_untraced(url) && !self.join.pending.contains_key(id) {
            return ExchangeOutcome::Ignored;
        }

        let payload = PayloadSource::from_response(url, response).materialize().await;
        if payload.encoded_len() > MAX_PAYLOAD_BYTES {
            debug!("Skipping response capture due to large payload size");
            self.join.pending.remove(id);
            return ExchangeOutcome::Dropped;
        }

        let stashed = StashedResponse {
            payload,
            timestamp: Utc::now().timestamp_millis(),
        };
        match self.join.pending.get_mut(id) {
            Some(mut exchange) => exchange.response = Some(stashed),
            None => {
                debug!("No pending request for {}", id);
                return ExchangeOutcome::Incomplete;
            }
        };

        match self.join.complete(id) {
            ExchangeOutcome::Incomplete => {
                debug!("Holding response for {} until the request body is read", id);
                ExchangeOutcome::Deferred
            }
            outcome => outcome,
        }
    }

    /// Drop exchanges older than `ttl`, returning how many were removed
    pub fn evict_stale(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let pending = &self.join.pending;
        let before = pending.len();
        pending.retain(|_, exchange| now.duration_since(exchange.created_at) < ttl);

        let evicted = before.saturating_sub(pending.len());
        if evicted > 0 {
            debug!("Evicted {} stale pending exchanges", evicted);
            counter!("recorder_exchanges_evicted_total").increment(evicted as u64);
        }
        evicted
    }

    /// Evict stale exchanges every `ttl` until cancelled
    pub async fn run_sweeper(self: Arc<Self>, ttl: Duration, cancel: CancellationToken) {
        let period = ttl.max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.evict_stale(ttl);
                }
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.join.pending.len()
    }

    pub fn pending(&self, id: &RequestId) -> Option<PendingExchange> {
        self.join.pending.get(id).map(|entry| entry.value().clone())
    }

    fn tag(&self, headers: &mut HeaderMap) {
        let identity = &self.join.identity;
        set_header(headers, &self.headers.tracking_id, &identity.tracking_id());
        set_header(
            headers,
            &self.headers.parent_tracking_id,
            &identity.parent_tracking_id(),
        );
        if let Some(user_id) = identity.current_user_id() {
            set_header(headers, &self.headers.current_user_id, &user_id);
        }
    }

    fn ensure_traceparent(&self, headers: &mut HeaderMap) -> String {
        let existing = headers
            .get(TRACEPARENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(span_id_of)
            .map(str::to_string);

        if let Some(span_id) = existing {
            return span_id;
        }

        let traceparent = Traceparent::generate();
        debug!("Generating new traceparent {}", traceparent);
        set_header(
            headers,
            &HeaderName::from_static(TRACEPARENT_HEADER),
            &traceparent.to_string(),
        );
        traceparent.span_id_hex()
    }
}

fn set_header(headers: &mut HeaderMap, name: &HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name.clone(), value);
        }
        Err(e) => debug!("Skipping header {}: {}", name, e),
    }
}

/// Origin and path of `url`, falling back to cutting at `?`
fn strip_query(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => format!("{}{}", parsed.origin().ascii_serialization(), parsed.path()),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CookieJar;
    use crate::testing::CapturingTransport;
    use hyper::header::CONTENT_TYPE;

    struct Fixture {
        correlator: NetworkCorrelator,
        transport: Arc<CapturingTransport>,
        identity: Arc<SessionIdentity>,
    }

    fn fixture() -> Fixture {
        let mut config = SdkConfig::new("proj", "key");
        config.traced_uri_regex_list_to_track = vec!["traced\\.example\\.com".to_string()];
        config.untraced_uri_regex_list_to_track = vec!["api\\.example\\.com".to_string()];
        config.excluded_uri_regex_list = vec!["/health".to_string()];

        let jar = Arc::new(CookieJar::from_header(
            "testchimp.session-record-tracking-id=track-1; testchimp.parent-session-record-tracking-id=parent-1",
        ));
        let identity = Arc::new(SessionIdentity::new(jar, "testchimp"));
        let transport = Arc::new(CapturingTransport::new());
        let dispatcher = PayloadDispatcher::new("https://ingress.example.io", transport.clone());

        Fixture {
            correlator: NetworkCorrelator::new(&config, identity.clone(), dispatcher).unwrap(),
            transport,
            identity,
        }
    }

    fn post(uri: &str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    fn ok(body: &'static str) -> Response<Full<Bytes>> {
        Response::builder()
            .status(200)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    async fn capture(f: &Fixture, id: &RequestId, request: &mut Request<Full<Bytes>>) -> CaptureResult {
        match f.correlator.on_request(id, request) {
            Interception::Capturing(capture) => capture.run().await,
            _ => panic!("expected capture"),
        }
    }

    #[tokio::test]
    async fn test_exchange_dispatched_once() {
        let f = fixture();
        let id = RequestId::new();
        let url = "https://api.example.com/orders?page=1";
        let mut request = post(url, r#"{"a":1}"#);

        assert_eq!(capture(&f, &id, &mut request).await, CaptureResult::Stashed);
        assert!(request.headers().contains_key(TRACEPARENT_HEADER));

        let response = ok(r#"{"ok":true}"#);
        assert_eq!(f.correlator.on_response(&id, url, &response).await, ExchangeOutcome::Dispatched);
        assert_eq!(f.correlator.on_response(&id, url, &response).await, ExchangeOutcome::Incomplete);

        let posts = f.transport.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://ingress.example.io/insert_client_recorded_payloads");

        let body = &posts[0].body;
        assert_eq!(body["url"], "https://api.example.com/orders");
        assert_eq!(body["tracking_id"], "track-1");
        assert_eq!(body["parent_tracking_id"], "parent-1");
        assert_eq!(body["aware_project_id"], "proj");

        let request_side: serde_json::Value =
            serde_json::from_str(body["request_payload"].as_str().unwrap()).unwrap();
        let response_side: serde_json::Value =
            serde_json::from_str(body["response_payload"].as_str().unwrap()).unwrap();
        assert_eq!(request_side["spanId"], response_side["spanId"]);
        assert_eq!(request_side["httpPayload"]["jsonBody"], r#"{"a":1}"#);
        assert_eq!(response_side["httpPayload"]["responseCode"], 200);
        assert_eq!(f.correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_traceparent_span_reused() {
        let f = fixture();
        let id = RequestId::new();
        let mut request = post("https://api.example.com/orders", "{}");
        request.headers_mut().insert(
            TRACEPARENT_HEADER,
            HeaderValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        );

        capture(&f, &id, &mut request).await;
        assert_eq!(f.correlator.pending(&id).unwrap().span_id, "00f067aa0ba902b7");
    }

    #[tokio::test]
    async fn test_excluded_beats_tracked() {
        let f = fixture();
        let id = RequestId::new();
        let url = "https://api.example.com/health";
        let mut request = post(url, "{}");

        assert!(matches!(f.correlator.on_request(&id, &mut request), Interception::Skipped));
        assert!(!request.headers().contains_key(TRACEPARENT_HEADER));
        assert_eq!(f.correlator.on_response(&id, url, &ok("{}")).await, ExchangeOutcome::Ignored);
        assert!(f.transport.posts().is_empty());
    }

    #[tokio::test]
    async fn test_traced_request_only_tagged() {
        let f = fixture();
        f.identity.set_current_user_id("user-9");
        let id = RequestId::new();
        let mut request = post("https://traced.example.com/rpc", "{}");

        assert!(matches!(f.correlator.on_request(&id, &mut request), Interception::Tagged));
        let headers = request.headers();
        assert_eq!(headers["testchimp-session-record-tracking-id"], "track-1");
        assert_eq!(headers["testchimp-parent-session-record-tracking-id"], "parent-1");
        assert_eq!(headers["testchimp-current-user-id"], "user-9");
        assert!(!headers.contains_key(TRACEPARENT_HEADER));
        assert_eq!(f.correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_options_and_ingestion_skipped() {
        let f = fixture();
        let mut preflight = Request::builder()
            .method("OPTIONS")
            .uri("https://api.example.com/orders")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert!(matches!(
            f.correlator.on_request(&RequestId::new(), &mut preflight),
            Interception::Skipped
        ));

        let mut own = post("https://api.example.com/session_records", "{}");
        assert!(matches!(
            f.correlator.on_request(&RequestId::new(), &mut own),
            Interception::Skipped
        ));
    }

    #[tokio::test]
    async fn test_no_response_no_dispatch() {
        let f = fixture();
        let id = RequestId::new();
        let mut request = post("https://api.example.com/orders", "{}");
        capture(&f, &id, &mut request).await;

        assert_eq!(f.correlator.pending_count(), 1);
        assert!(f.transport.posts().is_empty());
    }

    #[tokio::test]
    async fn test_response_before_request_body_dispatched_by_capture() {
        let f = fixture();
        let id = RequestId::new();
        let url = "https://api.example.com/orders";
        let mut request = post(url, r#"{"late":true}"#);

        let Interception::Capturing(pending_capture) = f.correlator.on_request(&id, &mut request) else {
            panic!("expected capture");
        };
        assert_eq!(
            f.correlator.on_response(&id, url, &ok(r#"{"early":true}"#)).await,
            ExchangeOutcome::Deferred
        );
        assert!(f.transport.posts().is_empty());
        assert!(f.correlator.pending(&id).unwrap().response.is_some());

        assert_eq!(pending_capture.run().await, CaptureResult::Dispatched);
        assert_eq!(f.correlator.on_response(&id, url, &ok("{}")).await, ExchangeOutcome::Incomplete);

        let posts = f.transport.posts();
        assert_eq!(posts.len(), 1);
        let body = &posts[0].body;
        let request_side: serde_json::Value =
            serde_json::from_str(body["request_payload"].as_str().unwrap()).unwrap();
        let response_side: serde_json::Value =
            serde_json::from_str(body["response_payload"].as_str().unwrap()).unwrap();
        assert_eq!(request_side["httpPayload"]["jsonBody"], r#"{"late":true}"#);
        assert_eq!(response_side["httpPayload"]["jsonBody"], r#"{"early":true}"#);
        assert!(body["response_timestamp"].as_i64().unwrap() >= body["request_timestamp"].as_i64().unwrap());
        assert_eq!(f.correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_request_discards_exchange() {
        let f = fixture();
        let id = RequestId::new();
        let url = "https://api.example.com/upload";
        let mut request = Request::builder()
            .method("POST")
            .uri(url)
            .header(CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from("x".repeat(MAX_PAYLOAD_BYTES + 10))))
            .unwrap();

        assert_eq!(capture(&f, &id, &mut request).await, CaptureResult::Oversized);
        assert_eq!(f.correlator.pending_count(), 0);
        assert_eq!(f.correlator.on_response(&id, url, &ok("{}")).await, ExchangeOutcome::Incomplete);
        assert!(f.transport.posts().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_response_discards_exchange() {
        let f = fixture();
        let id = RequestId::new();
        let url = "https://api.example.com/orders";
        let mut request = post(url, "{}");
        capture(&f, &id, &mut request).await;

        let big = "x".repeat(MAX_PAYLOAD_BYTES + 10);
        let response = Response::builder()
            .status(200)
            .header(CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from(big)))
            .unwrap();

        assert_eq!(f.correlator.on_response(&id, url, &response).await, ExchangeOutcome::Dropped);
        assert_eq!(f.correlator.pending_count(), 0);
        assert!(f.transport.posts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_exchanges_evicted() {
        let f = fixture();
        let old = RequestId::new();
        capture(&f, &old, &mut post("https://api.example.com/a", "{}")).await;

        tokio::time::advance(Duration::from_secs(200)).await;
        let fresh = RequestId::new();
        capture(&f, &fresh, &mut post("https://api.example.com/b", "{}")).await;

        tokio::time::advance(Duration::from_secs(150)).await;
        assert_eq!(f.correlator.evict_stale(Duration::from_secs(300)), 1);
        assert!(f.correlator.pending(&old).is_none());
        assert!(f.correlator.pending(&fresh).is_some());
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(strip_query("https://a.io:8443/x/y?z=1#f"), "https://a.io:8443/x/y");
        assert_eq!(strip_query("/relative/path?q=1"), "/relative/path");
    }
}
