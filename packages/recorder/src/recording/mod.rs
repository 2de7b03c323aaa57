// packages/recorder/src/recording/mod.rs
//! DOM session recording
//!
//! - **Event**: Opaque recorder events and the transform-mutation filter
//! - **Buffer**: Rolling buffer and checkpoint matrix
//! - **Capture**: Host recorder adapter, options and event sink
//! - **Recorder**: Session lifecycle, flush loop and error flush
//!
//! # Architecture
//!
//! ```text
//! Host DOM recorder → EventSink::emit() → SessionBuffer
//!                                             │
//!           continuous: every 5s ─────────────┤
//!           on error: last two slices ────────┤
//!                                             ↓
//!                                  POST /session_records
//! ```

pub mod buffer;
pub mod capture;
pub mod event;
pub mod recorder;

// Re-export commonly used types
pub use buffer::{BufferStats, CheckpointMatrix, RollingBuffer, SessionBuffer};
pub use capture::{EventSink, RecordOptions, RecordingHandle, ReplayRecorder, SamplingPolicy};
pub use event::{EventKind, RecordedEvent};
pub use recorder::{HostBindings, SessionRecorder};
