// packages/recorder/src/session/sampling.rs
//! Per-session sampling
//!
//! Two independent Bernoulli draws made once per recorder instance. A fresh
//! page load is a fresh instance and therefore a fresh draw.

use rand::Rng;
use serde::Serialize;

/// Which buffering strategy a session uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMode {
    /// Rolling buffer flushed on a timer
    Continuous,
    /// Checkpointed slices flushed on an uncaught error
    OnError,
    /// Nothing is recorded
    Disabled,
}

/// Outcome of the sampling draw, fixed for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SamplingDecision {
    pub record_continuous: bool,
    pub record_on_error: bool,
}

impl SamplingDecision {
    /// Draw with the thread-local RNG
    pub fn decide(continuous_probability: f64, error_probability: f64) -> Self {
        Self::decide_with(
            &mut rand::thread_rng(),
            continuous_probability,
            error_probability,
        )
    }

    /// Draw with a caller-supplied RNG
    pub fn decide_with<R: Rng + ?Sized>(
        rng: &mut R,
        continuous_probability: f64,
        error_probability: f64,
    ) -> Self {
        Self {
            record_continuous: bernoulli(rng, continuous_probability),
            record_on_error: bernoulli(rng, error_probability),
        }
    }

    /// Continuous recording wins when both flags are set
    pub fn mode(&self) -> RecordingMode {
        match (self.record_continuous, self.record_on_error) {
            (true, _) => RecordingMode::Continuous,
            (false, true) => RecordingMode::OnError,
            (false, false) => RecordingMode::Disabled,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.mode() != RecordingMode::Disabled
    }
}

// Values above 1 behave as "always"; zero, negative and NaN as "never".
fn bernoulli<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    if probability.is_nan() || probability <= 0.0 {
        return false;
    }
    rng.gen::<f64>() <= probability
}
