// packages/recorder/src/session/cookies.rs
//! Cookie access
//!
//! The host owns the real cookie jar (`document.cookie` in a browser). The
//! SDK only needs get/set/remove and the flattened header string, which is
//! what the [`CookieStore`] trait exposes. [`CookieJar`] is an in-memory
//! implementation honouring `Max-Age` and `Expires`.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A cookie to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,

    /// Lifetime in seconds; `Some(0)` or negative expires immediately
    pub max_age: Option<i64>,

    /// Absolute expiry; ignored when `max_age` is set
    pub expires: Option<DateTime<Utc>>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            max_age: None,
            expires: None,
        }
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// A cookie that deletes `name` when written
    pub fn expired(name: impl Into<String>) -> Self {
        Self::new(name, "")
            .with_max_age(0)
            .with_expires(DateTime::<Utc>::MIN_UTC)
    }
}

/// Host cookie storage
pub trait CookieStore: Send + Sync {
    /// Value of a live cookie
    fn get(&self, name: &str) -> Option<String>;

    /// Write (or overwrite) a cookie
    fn set(&self, cookie: Cookie);

    /// Delete a cookie
    fn remove(&self, name: &str) {
        self.set(Cookie::expired(name));
    }

    /// All live cookies as `name=value; name=value`
    fn header(&self) -> String;
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
struct StoredCookie {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory cookie jar
pub struct CookieJar {
    cookies: RwLock<BTreeMap<String, StoredCookie>>,
    clock: Clock,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    /// Jar with an injected wall clock
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            cookies: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Seed from a `document.cookie` style string
    pub fn from_header(header: &str) -> Self {
        let jar = Self::new();
        for (name, value) in parse_cookie_header(header) {
            jar.set(Cookie::new(name, value));
        }
        jar
    }

    fn is_live(&self, cookie: &StoredCookie, now: DateTime<Utc>) -> bool {
        cookie.expires_at.map_or(true, |at| at > now)
    }
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieStore for CookieJar {
    fn get(&self, name: &str) -> Option<String> {
        let now = (self.clock)();
        self.cookies
            .read()
            .get(name)
            .filter(|c| self.is_live(c, now))
            .map(|c| c.value.clone())
    }

    fn set(&self, cookie: Cookie) {
        let now = (self.clock)();
        let expires_at = match (cookie.max_age, cookie.expires) {
            (Some(secs), _) => Some(now + ChronoDuration::seconds(secs)),
            (None, expires) => expires,
        };

        let mut cookies = self.cookies.write();
        if expires_at.map_or(false, |at| at <= now) {
            cookies.remove(&cookie.name);
            return;
        }
        cookies.insert(
            cookie.name,
            StoredCookie {
                value: cookie.value,
                expires_at,
            },
        );
    }

    fn header(&self) -> String {
        let now = (self.clock)();
        self.cookies
            .read()
            .iter()
            .filter(|(_, c)| self.is_live(c, now))
            .map(|(name, c)| format!("{}={}", name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Split a cookie header into `(name, value)` pairs, keeping the raw value
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .filter_map(|c| {
            c.split_once('=')
                .map(|(name, value)| (name.to_string(), value.to_string()))
        })
        .collect()
}
