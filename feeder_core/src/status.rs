//! Status returned from each control loop iteration.

use serde::Serialize;

use crate::error::FeederError;
use crate::history::FeedEvent;

/// Public status of a single tick of the feed controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// No feed in progress.
    Idle,
    /// Motor energized, waiting for the end of the current rotation.
    Rotating {
        rotations_done: u32,
        rotation_count: u32,
    },
    /// Motor resting between two rotations of the same feed.
    Paused {
        rotations_done: u32,
        rotation_count: u32,
        resume_at_ms: u64,
    },
    /// The feed finished on this tick; motor already de-energized.
    Completed(FeedSummary),
}

impl TickStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, TickStatus::Idle)
    }
}

/// Outcome of a finished feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedSummary {
    /// Adjusted wall-clock time recorded for the feed, epoch seconds.
    pub as_of_adjusted_sec: u64,
    pub rotations: u32,
    /// Rotations that ended by the expected-duration fallback instead of a sensor edge.
    pub forced_rotations: u32,
    /// Monotonic time from admission to completion.
    pub duration_ms: u64,
}

/// An admitted trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Record written to the history.
    pub event: FeedEvent,
    /// Set when the motor refused to start; the feed still counts as admitted.
    pub motor_fault: Option<FeederError>,
}

impl Admission {
    pub fn new(event: FeedEvent) -> Self {
        Self {
            event,
            motor_fault: None,
        }
    }
}
