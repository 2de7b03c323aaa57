// packages/recorder/src/utils/ids.rs
//! Identifier generation
//!
//! Session identifiers are UUID-v4 shaped strings drawn from a non-crypto
//! RNG. They are correlation keys, not security tokens.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Prefix carried by every generated session id
pub const SESSION_ID_PREFIX: &str = "session_";

/// Generate a fresh `session_xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx` id
pub fn generate_session_id() -> String {
    generate_session_id_with(&mut rand::thread_rng())
}

/// Generate a session id from the given RNG
pub fn generate_session_id_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);

    // version 4, RFC 4122 variant
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}{}-{}-{}-{}-{}",
        SESSION_ID_PREFIX,
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Identifier pairing an intercepted request with its response
///
/// Hosts that already have an id from their interception layer wrap it with
/// `From<String>`; others mint one with [`RequestId::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
