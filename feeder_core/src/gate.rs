//! Admission rules for trigger requests.

use crate::error::RejectReason;
use crate::request::FeedRequest;

/// Remembers the newest admitted `as_of` so replays and out-of-order
/// deliveries are dropped. Not persisted; starts at 0 on every boot.
#[derive(Debug, Clone)]
pub struct TriggerGate {
    last_admitted: u64,
    max_rotations: u32,
}

impl TriggerGate {
    pub fn new(max_rotations: u32) -> Self {
        Self {
            last_admitted: 0,
            max_rotations,
        }
    }

    /// Checks in order: rotation count, staleness, feed in progress.
    pub fn check(&self, request: &FeedRequest, busy: bool) -> Result<(), RejectReason> {
        if request.rotations == 0 || request.rotations > self.max_rotations {
            return Err(RejectReason::InvalidRotationCount(request.rotations));
        }
        if request.as_of <= self.last_admitted {
            return Err(RejectReason::Stale {
                as_of: request.as_of,
                last_admitted: self.last_admitted,
            });
        }
        if busy {
            return Err(RejectReason::FeedInProgress);
        }
        Ok(())
    }

    pub fn admit(&mut self, request: &FeedRequest) {
        self.last_admitted = request.as_of;
    }

    pub fn last_admitted(&self) -> u64 {
        self.last_admitted
    }

    pub fn max_rotations(&self) -> u32 {
        self.max_rotations
    }
}
