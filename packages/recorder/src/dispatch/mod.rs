// packages/recorder/src/dispatch/mod.rs
//! Payload delivery
//!
//! Fire-and-forget JSON POSTs to the ingestion service:
//!
//! - **Transport**: Host-replaceable HTTP POST
//! - **Dispatcher**: Serialization, spawning and failure logging
//! - **Payloads**: Wire formats for event batches and captured exchanges
//!
//! Delivery outcome is never reported back to the caller. A failed POST is
//! logged and the payload dropped; nothing is retried.

pub mod dispatcher;
pub mod payloads;
pub mod transport;

pub use dispatcher::{PayloadDispatcher, CLIENT_PAYLOADS_PATH, SESSION_RECORDS_PATH};
pub use payloads::{ClientRecordedPayloads, SessionRecordBatch};
pub use transport::{HttpTransport, Transport};
