// packages/recorder/src/recording/buffer.rs
//! Event buffers
//!
//! Two strategies, chosen once per session by the sampling decision:
//!
//! - **RollingBuffer**: flat ordered list, drained by the flush timer
//! - **CheckpointMatrix**: ordered slices split at recorder checkouts; on an
//!   uncaught error the last two slices are sent together, i.e. the last
//!   N to 2N events before the crash
//!
//! `SessionBuffer` holds exactly one of them, so a session can never feed
//! both.

use crate::recording::event::RecordedEvent;
use std::collections::VecDeque;

/// Slices kept by default; two are needed for an error flush
pub const DEFAULT_RETAINED_SLICES: usize = 3;

/// Flat ordered buffer for continuous recording
#[derive(Debug, Default)]
pub struct RollingBuffer {
    events: Vec<RecordedEvent>,
}

impl RollingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: RecordedEvent) {
        self.events.push(event);
    }

    /// Take every buffered event, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Checkpointed slices for error-only recording
#[derive(Debug)]
pub struct CheckpointMatrix {
    slices: VecDeque<Vec<RecordedEvent>>,
    retained: usize,
    dropped_slices: u64,
}

impl CheckpointMatrix {
    /// Create a matrix keeping at most `retained` slices (minimum two)
    pub fn new(retained: usize) -> Self {
        Self {
            slices: VecDeque::new(),
            retained: retained.max(2),
            dropped_slices: 0,
        }
    }

    /// Append an event; a checkout starts a new slice first
    pub fn push(&mut self, event: RecordedEvent, is_checkout: bool) {
        if is_checkout || self.slices.is_empty() {
            self.slices.push_back(Vec::new());
            while self.slices.len() > self.retained {
                self.slices.pop_front();
                self.dropped_slices += 1;
            }
        }
        if let Some(current) = self.slices.back_mut() {
            current.push(event);
        }
    }

    /// The second-to-last slice followed by the last one
    pub fn error_window(&self) -> Vec<RecordedEvent> {
        let skip = self.slices.len().saturating_sub(2);
        self.slices.iter().skip(skip).flatten().cloned().collect()
    }

    pub fn slices(&self) -> impl Iterator<Item = &[RecordedEvent]> {
        self.slices.iter().map(Vec::as_slice)
    }

    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    pub fn len(&self) -> usize {
        self.slices.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CheckpointMatrix {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED_SLICES)
    }
}

/// The single active buffer of a session
#[derive(Debug)]
pub enum SessionBuffer {
    Rolling(RollingBuffer),
    Checkpointed(CheckpointMatrix),
}

impl SessionBuffer {
    pub fn rolling() -> Self {
        SessionBuffer::Rolling(RollingBuffer::new())
    }

    pub fn checkpointed(retained: usize) -> Self {
        SessionBuffer::Checkpointed(CheckpointMatrix::new(retained))
    }

    pub fn push(&mut self, event: RecordedEvent, is_checkout: bool) {
        match self {
            SessionBuffer::Rolling(buffer) => buffer.push(event),
            SessionBuffer::Checkpointed(matrix) => matrix.push(event, is_checkout),
        }
    }

    /// Drain the rolling buffer; checkpointed sessions never drain on a timer
    pub fn drain(&mut self) -> Vec<RecordedEvent> {
        match self {
            SessionBuffer::Rolling(buffer) => buffer.drain(),
            SessionBuffer::Checkpointed(_) => Vec::new(),
        }
    }

    /// Events to send on an uncaught error
    pub fn error_window(&self) -> Vec<RecordedEvent> {
        match self {
            SessionBuffer::Rolling(_) => Vec::new(),
            SessionBuffer::Checkpointed(matrix) => matrix.error_window(),
        }
    }

    pub fn stats(&self) -> BufferStats {
        match self {
            SessionBuffer::Rolling(buffer) => BufferStats {
                buffered_events: buffer.len(),
                slices: 1,
                dropped_slices: 0,
            },
            SessionBuffer::Checkpointed(matrix) => BufferStats {
                buffered_events: matrix.len(),
                slices: matrix.slice_count(),
                dropped_slices: matrix.dropped_slices,
            },
        }
    }
}

/// Buffer statistics
#[derive(Debug, Clone, PartialEq)]
pub struct BufferStats {
    /// Events currently held
    pub buffered_events: usize,

    /// Slices currently held (1 for a rolling buffer)
    pub slices: usize,

    /// Slices discarded to bound memory
    pub dropped_slices: u64,
}
