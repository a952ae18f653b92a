//! Alternate-frame scheduling for the recognition loop.
//!
//! Recognition runs on every other displayed frame; the frames in between
//! reuse the previous results, so displayed boxes are at most one frame old.

use crate::types::FaceMatch;

/// What the next frame does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Run recognition on this frame.
    #[default]
    Processing,
    /// Reuse the previous frame's results.
    Reusing,
}

impl Phase {
    /// The single transition rule: the phases alternate.
    pub fn next(self) -> Self {
        match self {
            Phase::Processing => Phase::Reusing,
            Phase::Reusing => Phase::Processing,
        }
    }
}

/// How the results for a frame were obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Recognition ran and produced new results.
    Fresh,
    /// Recognition was skipped; previous results are shown.
    Reused,
    /// Recognition ran and failed; previous results are kept.
    Failed(String),
}

/// Scheduling state owned by one display loop.
#[derive(Debug, Clone, Default)]
pub struct FrameState {
    phase: Phase,
    last: Vec<FaceMatch>,
}

impl FrameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Results to draw on the current frame.
    pub fn results(&self) -> &[FaceMatch] {
        &self.last
    }

    /// Advance by one frame, calling `recognize` only in the processing phase.
    ///
    /// A failed recognition leaves the cached results untouched. The phase
    /// flips on every call regardless of outcome.
    pub fn step<F, E>(&mut self, recognize: F) -> FrameOutcome
    where
        F: FnOnce() -> Result<Vec<FaceMatch>, E>,
        E: std::fmt::Display,
    {
        let outcome = match self.phase {
            Phase::Reusing => FrameOutcome::Reused,
            Phase::Processing => match recognize() {
                Ok(results) => {
                    self.last = results;
                    FrameOutcome::Fresh
                }
                Err(e) => {
                    tracing::debug!(error = %e, "recognition failed; keeping previous results");
                    FrameOutcome::Failed(e.to_string())
                }
            },
        };
        self.phase = self.phase.next();
        outcome
    }
}
