// packages/recorder/src/session/mod.rs
//! Session identity and sampling
//!
//! - **Cookies**: Host cookie access and an in-memory jar
//! - **Identity**: Session id derivation and tracking cookies
//! - **Sampling**: Per-session recording decision

pub mod cookies;
pub mod identity;
pub mod sampling;

pub use cookies::{Cookie, CookieJar, CookieStore};
pub use identity::{CookieNames, SessionIdentity};
pub use sampling::{RecordingMode, SamplingDecision};
