// packages/recorder/src/session/identity.rs
//! Session identity
//!
//! Derives a stable session id from the host's own session cookie (or a
//! well-known framework cookie) and mirrors it into dedicated tracking
//! cookies so every page on the origin reports under the same id.

use crate::session::cookies::{Cookie, CookieStore};
use crate::utils::ids::generate_session_id;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Framework session cookies used as a fallback identity
pub const FRAMEWORK_SESSION_COOKIES: [&str; 5] =
    ["JSESSIONID", "PHPSESSID", "ASP.NET_SessionId", "CFID", "CFTOKEN"];

/// Lifetime of the tracking cookie (seconds)
pub const TRACKING_COOKIE_MAX_AGE_SECS: i64 = 600;

/// Default value of the session record source cookie
pub const DEFAULT_RECORD_SOURCE: &str = "SDK";

/// Cookie names derived from a prefix (`testchimp`, legacy `aware`)
#[derive(Debug, Clone, PartialEq)]
pub struct CookieNames {
    pub tracking_id: String,
    pub parent_tracking_id: String,
    pub current_user_id: String,
    pub record_source: String,
}

impl CookieNames {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            tracking_id: format!("{}.session-record-tracking-id", prefix),
            parent_tracking_id: format!("{}.parent-session-record-tracking-id", prefix),
            current_user_id: format!("{}.current_user_id", prefix),
            record_source: format!("{}.session-record-source", prefix),
        }
    }
}

/// Reads and writes the SDK's identity cookies
pub struct SessionIdentity {
    cookies: Arc<dyn CookieStore>,
    names: CookieNames,

    /// Set when the tracking cookie had to be regenerated
    snapshot_requested: AtomicBool,
}

impl SessionIdentity {
    pub fn new(cookies: Arc<dyn CookieStore>, prefix: &str) -> Self {
        Self {
            cookies,
            names: CookieNames::with_prefix(prefix),
            snapshot_requested: AtomicBool::new(false),
        }
    }

    pub fn names(&self) -> &CookieNames {
        &self.names
    }

    /// Look up the host session id, generating one when none exists
    pub fn get_or_create_session_id(&self, cookie_key: Option<&str>) -> String {
        match self.find_host_session_id(cookie_key) {
            Some(id) => {
                debug!("Reusing host session id from cookie");
                id
            }
            None => generate_session_id(),
        }
    }

    fn find_host_session_id(&self, cookie_key: Option<&str>) -> Option<String> {
        let header = self.cookies.header();
        let cookies = header.split(';').map(str::trim);

        match cookie_key {
            Some(key) => cookies
                .filter_map(|cookie| {
                    let parts: Vec<&str> = cookie.split('=').collect();
                    match parts.as_slice() {
                        [name, value] if *name == key => Some(value.to_string()),
                        _ => None,
                    }
                })
                .next(),
            None => cookies
                .filter_map(|cookie| {
                    FRAMEWORK_SESSION_COOKIES.iter().find_map(|name| {
                        cookie
                            .strip_prefix(name)
                            .and_then(|rest| rest.strip_prefix('='))
                            .map(str::to_string)
                    })
                })
                .next(),
        }
    }

    /// Establish the session: derive an id, write the tracking cookies if
    /// they are absent, and return the tracking id now in effect
    pub fn establish(&self, cookie_key: Option<&str>) -> String {
        let session_id = self.get_or_create_session_id(cookie_key);

        if self.cookies.get(&self.names.tracking_id).is_none() {
            self.write_tracking_cookie(&session_id);
        }
        if self.cookies.get(&self.names.parent_tracking_id).is_none() {
            self.cookies
                .set(Cookie::new(&self.names.parent_tracking_id, &session_id));
        }

        self.tracking_id()
    }

    /// Current tracking id; an expired cookie is replaced by a fresh id and a
    /// full snapshot is requested from the recorder
    pub fn tracking_id(&self) -> String {
        if let Some(id) = self.cookies.get(&self.names.tracking_id) {
            return id;
        }

        let session_id = generate_session_id();
        debug!("Tracking cookie expired, rotating to {}", session_id);
        self.write_tracking_cookie(&session_id);
        self.snapshot_requested.store(true, Ordering::SeqCst);

        if self.cookies.get(&self.names.parent_tracking_id).is_none() {
            self.cookies
                .set(Cookie::new(&self.names.parent_tracking_id, &session_id));
        }
        session_id
    }

    /// Parent tracking id, spanning tracking-id rotations
    pub fn parent_tracking_id(&self) -> String {
        if let Some(id) = self.cookies.get(&self.names.parent_tracking_id) {
            return id;
        }
        let session_id = generate_session_id();
        self.cookies
            .set(Cookie::new(&self.names.parent_tracking_id, &session_id));
        session_id
    }

    /// Consume a pending full-snapshot request
    pub fn take_snapshot_request(&self) -> bool {
        self.snapshot_requested.swap(false, Ordering::SeqCst)
    }

    pub fn session_record_source(&self) -> String {
        self.cookies
            .get(&self.names.record_source)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_RECORD_SOURCE.to_string())
    }

    pub fn set_current_user_id(&self, user_id: &str) {
        self.cookies
            .set(Cookie::new(&self.names.current_user_id, user_id));
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.cookies
            .get(&self.names.current_user_id)
            .filter(|id| !id.is_empty())
    }

    /// Expire both tracking cookies immediately
    pub fn clear(&self) {
        self.cookies.remove(&self.names.tracking_id);
        self.cookies.remove(&self.names.parent_tracking_id);
    }

    fn write_tracking_cookie(&self, session_id: &str) {
        self.cookies.set(
            Cookie::new(&self.names.tracking_id, session_id)
                .with_max_age(TRACKING_COOKIE_MAX_AGE_SECS),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::cookies::CookieJar;

    fn identity_with(header: &str) -> (SessionIdentity, Arc<CookieJar>) {
        let jar = Arc::new(CookieJar::from_header(header));
        let identity = SessionIdentity::new(jar.clone(), "testchimp");
        (identity, jar)
    }

    #[test]
    fn test_framework_cookie_fallback() {
        let (identity, _) = identity_with("theme=dark; PHPSESSID=php-123");
        assert_eq!(identity.get_or_create_session_id(None), "php-123");
    }

    #[test]
    fn test_custom_cookie_key_exact_match() {
        let (identity, _) = identity_with("my_session_x=wrong; my_session=right");
        assert_eq!(identity.get_or_create_session_id(Some("my_session")), "right");
    }

    #[test]
    fn test_custom_key_ignores_framework_cookies() {
        let (identity, _) = identity_with("JSESSIONID=java-1");
        let id = identity.get_or_create_session_id(Some("app_sid"));
        assert!(id.starts_with("session_"));
    }

    #[test]
    fn test_generates_when_absent() {
        let (identity, _) = identity_with("");
        let id = identity.get_or_create_session_id(None);
        assert!(id.starts_with("session_"));
    }

    #[test]
    fn test_establish_writes_tracking_cookies() {
        let (identity, jar) = identity_with("JSESSIONID=java-1");
        let tracking_id = identity.establish(None);

        assert_eq!(tracking_id, "java-1");
        assert_eq!(
            jar.get("testchimp.session-record-tracking-id"),
            Some("java-1".to_string())
        );
        assert_eq!(
            jar.get("testchimp.parent-session-record-tracking-id"),
            Some("java-1".to_string())
        );
        assert!(!identity.take_snapshot_request());
    }

    #[test]
    fn test_establish_keeps_existing_tracking_cookie() {
        let (identity, _) = identity_with(
            "testchimp.session-record-tracking-id=existing; JSESSIONID=java-1",
        );
        assert_eq!(identity.establish(None), "existing");
    }

    #[test]
    fn test_rotation_requests_snapshot() {
        let (identity, jar) = identity_with("");
        identity.establish(None);
        let parent = identity.parent_tracking_id();

        jar.remove("testchimp.session-record-tracking-id");
        let rotated = identity.tracking_id();

        assert!(rotated.starts_with("session_"));
        assert!(identity.take_snapshot_request());
        assert!(!identity.take_snapshot_request());
        assert_eq!(identity.parent_tracking_id(), parent);
    }

    #[test]
    fn test_clear_expires_tracking_cookies() {
        let (identity, jar) = identity_with("");
        identity.establish(None);
        identity.clear();

        assert!(jar.get("testchimp.session-record-tracking-id").is_none());
        assert!(jar.get("testchimp.parent-session-record-tracking-id").is_none());
    }

    #[test]
    fn test_current_user_id() {
        let (identity, _) = identity_with("");
        assert_eq!(identity.current_user_id(), None);
        identity.set_current_user_id("user-42");
        assert_eq!(identity.current_user_id(), Some("user-42".to_string()));
    }

    #[test]
    fn test_record_source_default() {
        let (identity, _) = identity_with("");
        assert_eq!(identity.session_record_source(), "SDK");

        let (identity, _) = identity_with("testchimp.session-record-source=EXTENSION");
        assert_eq!(identity.session_record_source(), "EXTENSION");
    }

    #[test]
    fn test_legacy_prefix() {
        let names = CookieNames::with_prefix("aware");
        assert_eq!(names.tracking_id, "aware.session-record-tracking-id");
    }
}
