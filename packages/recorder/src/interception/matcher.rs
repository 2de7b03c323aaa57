// packages/recorder/src/interception/matcher.rs
//! URI classification for intercepted traffic
//!
//! Three independent pattern lists decide what happens to a request:
//!
//! - **excluded**: never touched, even if another list matches
//! - **traced**: already instrumented; only tracking headers are added
//! - **untraced**: not instrumented; captured and correlated by the SDK

use crate::dispatch::{CLIENT_PAYLOADS_PATH, SESSION_RECORDS_PATH};
use crate::utils::errors::Result;
use regex::Regex;
use tracing::debug;

/// Patterns that would capture every request
const MATCH_ALL_PATTERNS: [&str; 2] = [".*", "^.*$"];

/// Result of matching one URL against every list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UriClass {
    pub excluded: bool,
    pub traced: bool,
    pub untraced: bool,
}

/// Compiled pattern lists
#[derive(Debug, Clone)]
pub struct UriMatcher {
    traced: Vec<Regex>,
    untraced: Vec<Regex>,
    excluded: Vec<Regex>,
}

impl UriMatcher {
    pub fn new<S: AsRef<str>>(traced: &[S], untraced: &[S], excluded: &[S]) -> Result<Self> {
        Ok(Self {
            traced: compile(traced)?,
            untraced: compile(untraced)?,
            excluded: compile(excluded)?,
        })
    }

    pub fn classify(&self, url: &str) -> UriClass {
        UriClass {
            excluded: matches_any(&self.excluded, url),
            traced: matches_any(&self.traced, url),
            untraced: matches_any(&self.untraced, url),
        }
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        matches_any(&self.excluded, url)
    }

    pub fn is_untraced(&self, url: &str) -> bool {
        matches_any(&self.untraced, url)
    }

    /// A traced or untraced list that matches everything
    pub fn is_too_broad(&self) -> bool {
        is_match_all(&self.traced) || is_match_all(&self.untraced)
    }
}

/// Requests the SDK itself sends to the ingestion service
pub fn is_ingestion_call(url: &str) -> bool {
    url.contains(&format!("/{}", CLIENT_PAYLOADS_PATH))
        || url.contains(&format!("/{}", SESSION_RECORDS_PATH))
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            let normalized = normalize_pattern(p.as_ref());
            debug!("Compiling uri pattern {}", normalized);
            Ok(Regex::new(&normalized)?)
        })
        .collect()
}

fn matches_any(patterns: &[Regex], url: &str) -> bool {
    patterns.iter().any(|re| re.is_match(url))
}

fn is_match_all(patterns: &[Regex]) -> bool {
    patterns
        .iter()
        .any(|re| MATCH_ALL_PATTERNS.contains(&re.as_str()))
}

/// Accept JavaScript regex literals (`/api\/v1/i`) as well as bare patterns
fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern.trim();
    if let Some(rest) = trimmed.strip_prefix('/') {
        if let Some(end) = rest.rfind('/') {
            let (body, flags) = (&rest[..end], &rest[end + 1..]);
            if !body.is_empty() && flags.chars().all(|c| "dgimsuy".contains(c)) {
                let body = body.replace("\\/", "/");
                return if flags.contains('i') {
                    format!("(?i){}", body)
                } else {
                    body
                };
            }
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(traced: &[&str], untraced: &[&str], excluded: &[&str]) -> UriMatcher {
        UriMatcher::new(traced, untraced, excluded).unwrap()
    }

    #[test]
    fn test_classification() {
        let m = matcher(&["api\\.traced\\.io"], &["api\\.plain\\.io"], &["/health"]);

        let traced = m.classify("https://api.traced.io/orders");
        assert!(traced.traced && !traced.untraced && !traced.excluded);

        let untraced = m.classify("https://api.plain.io/orders?id=1");
        assert!(untraced.untraced && !untraced.traced);

        let excluded = m.classify("https://api.plain.io/health");
        assert!(excluded.excluded && excluded.untraced);
    }

    #[test]
    fn test_default_matches_nothing() {
        let m = matcher(&["^$"], &["^$"], &[]);
        assert_eq!(m.classify("https://anything.io/"), UriClass::default());
        assert!(!m.is_too_broad());
    }

    #[test]
    fn test_too_broad() {
        assert!(matcher(&[".*"], &["^$"], &[]).is_too_broad());
        assert!(matcher(&["^$"], &["^.*$"], &[]).is_too_broad());
        assert!(!matcher(&["^https://"], &["^$"], &[]).is_too_broad());
    }

    #[test]
    fn test_js_literal_patterns() {
        let m = matcher(&["/API\\/v1/i"], &["^$"], &[]);
        assert!(m.classify("https://host/api/v1/users").traced);
        assert_eq!(normalize_pattern("/^$/"), "^$");
        assert_eq!(normalize_pattern("/health"), "/health");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(UriMatcher::new(&["(unclosed"], &[], &[]).is_err());
    }

    #[test]
    fn test_ingestion_calls() {
        assert!(is_ingestion_call("https://ingress.testchimp.io/session_records"));
        assert!(is_ingestion_call(
            "https://ingress.testchimp.io/insert_client_recorded_payloads"
        ));
        assert!(!is_ingestion_call("https://api.example.com/records"));
    }
}
