//! State machine for one multi-rotation feed.
//!
//! The cycle only tracks progress and timing; energizing and de-energizing
//! the motor is left to the controller that owns it.

use crate::status::FeedSummary;

/// What ended a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Falling edge of the debounced rotation sensor.
    Edge,
    /// The rotation ran past the expected duration.
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Running,
    Paused,
    Done,
}

/// Progress of a feed: `rotation_count` rotations, each started by `go`
/// and ended by `finished_a_rotation`.
#[derive(Debug, Clone)]
pub struct RotationCycle {
    rotation_count: u32,
    rotations_done: u32,
    forced_rotations: u32,
    started_at_ms: u64,
    as_of_adjusted_sec: u64,
    expected_rotation_ms: u64,
    current_rotation_start_ms: u64,
    phase: Phase,
}

impl RotationCycle {
    pub fn new(
        rotation_count: u32,
        started_at_ms: u64,
        as_of_adjusted_sec: u64,
        expected_rotation_ms: u64,
    ) -> Self {
        debug_assert!(rotation_count > 0, "rotation_count must be > 0");
        Self {
            rotation_count,
            rotations_done: 0,
            forced_rotations: 0,
            started_at_ms,
            as_of_adjusted_sec,
            expected_rotation_ms,
            current_rotation_start_ms: started_at_ms,
            phase: Phase::Created,
        }
    }

    /// Log the feed and start the first rotation.
    pub fn startup(&mut self, now_ms: u64) {
        tracing::info!(
            rotations = self.rotation_count,
            as_of = self.as_of_adjusted_sec,
            "beginning a feed"
        );
        self.go(now_ms);
    }

    /// Start (or resume) a rotation at `now_ms`. No effect once done.
    pub fn go(&mut self, now_ms: u64) {
        if self.phase == Phase::Done {
            tracing::debug!("go() ignored on a finished cycle");
            return;
        }
        self.current_rotation_start_ms = now_ms;
        self.phase = Phase::Running;
    }

    /// Count one finished rotation and pause, or finish the cycle when the
    /// requested count is reached. Returns `is_done()`.
    pub fn finished_a_rotation(&mut self, now_ms: u64, cause: Completion) -> bool {
        if self.phase == Phase::Done {
            return true;
        }
        self.rotations_done = (self.rotations_done + 1).min(self.rotation_count);
        if cause == Completion::Timeout {
            self.forced_rotations += 1;
        }
        tracing::info!(
            rotation = self.rotations_done,
            of = self.rotation_count,
            duration_ms = self.current_rotation_duration(now_ms),
            forced = cause == Completion::Timeout,
            "finished a rotation"
        );
        self.phase = if self.rotations_done >= self.rotation_count {
            Phase::Done
        } else {
            Phase::Paused
        };
        self.is_done()
    }

    /// True while running once the current rotation is past its expected end.
    pub fn should_have_finished_a_rotation(&self, now_ms: u64) -> bool {
        self.phase == Phase::Running && self.projected_rotation_end_at() < now_ms
    }

    pub fn projected_rotation_end_at(&self) -> u64 {
        self.current_rotation_start_ms
            .saturating_add(self.expected_rotation_ms)
    }

    pub fn current_rotation_duration(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.current_rotation_start_ms)
    }

    /// Mark the cycle finished and summarize it.
    pub fn shutdown(&mut self, now_ms: u64) -> FeedSummary {
        self.phase = Phase::Done;
        let summary = FeedSummary {
            as_of_adjusted_sec: self.as_of_adjusted_sec,
            rotations: self.rotations_done,
            forced_rotations: self.forced_rotations,
            duration_ms: now_ms.saturating_sub(self.started_at_ms),
        };
        tracing::info!(
            rotations = summary.rotations,
            forced = summary.forced_rotations,
            duration_ms = summary.duration_ms,
            "feed finished"
        );
        summary
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Motor should be energized.
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Paused
    }

    pub fn has_started(&self) -> bool {
        self.phase != Phase::Created
    }

    pub fn rotation_count(&self) -> u32 {
        self.rotation_count
    }

    pub fn rotations_done(&self) -> u32 {
        self.rotations_done
    }

    pub fn forced_rotations(&self) -> u32 {
        self.forced_rotations
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn as_of_adjusted_sec(&self) -> u64 {
        self.as_of_adjusted_sec
    }
}
