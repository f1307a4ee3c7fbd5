//! Non-blocking feed controller.
//!
//! `FeedController::tick` is called at a fixed cadence by the runner. One
//! tick samples the debounced sensor once, detects the falling edge that
//! ends a rotation, applies the expected-duration fallback, and drives the
//! motor. Nothing in here sleeps or waits; the pause between rotations is a
//! scheduled resume time checked on later ticks.

use std::sync::Arc;
use std::time::Instant;

use eyre::WrapErr;
use feeder_traits::{Clock, Motor, RotationSensor, WallClock};

use crate::config::RotationCfg;
use crate::debounce::Debounce;
use crate::error::{FeederError, Result};
use crate::gate::TriggerGate;
use crate::history::{FeedEvent, FeedingStore};
use crate::hw_error::map_hw_error;
use crate::inbox::TriggerInbox;
use crate::persistence::FeedingPersistence;
use crate::request::FeedRequest;
use crate::rotator::{Completion, RotationCycle};
use crate::status::{Admission, FeedSummary, TickStatus};

/// Owns the sensor, motor, history and the active rotation cycle.
pub struct FeedController<S: RotationSensor, M: Motor> {
    pub(crate) signal: Debounce<S>,
    pub(crate) motor: M,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) wall: Arc<dyn WallClock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) rotation: RotationCfg,
    pub(crate) diagnostics_slice_ms: u64,
    pub(crate) gate: TriggerGate,
    pub(crate) history: FeedingStore,
    pub(crate) persistence: Option<Box<dyn FeedingPersistence>>,
    pub(crate) inbox: Option<TriggerInbox>,

    // ── Per-feed state ───────────────────────────────────────────────────────
    pub(crate) cycle: Option<RotationCycle>,
    pub(crate) continue_at_ms: Option<u64>,
    pub(crate) was_in_rotation: bool,
    pub(crate) motor_energized: bool,

    // ── Diagnostics ──────────────────────────────────────────────────────────
    pub(crate) last_time_slice: u64,
    pub(crate) feeds_since_boot: u64,
    pub(crate) last_summary: Option<FeedSummary>,
}

impl<S: RotationSensor, M: Motor> core::fmt::Debug for FeedController<S, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FeedController")
            .field("cycle", &self.cycle)
            .field("continue_at_ms", &self.continue_at_ms)
            .field("motor_energized", &self.motor_energized)
            .field("last_admitted", &self.gate.last_admitted())
            .field("history_cursor", &self.history.cursor())
            .finish_non_exhaustive()
    }
}

impl<S: RotationSensor, M: Motor> FeedController<S, M> {
    /// Monotonic milliseconds since the controller was built.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    /// Adjusted wall-clock time, epoch seconds.
    pub fn adjusted_now_sec(&self) -> u64 {
        self.wall.now_epoch_secs()
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    pub fn is_in_feed(&self) -> bool {
        self.cycle.is_some()
    }

    /// Triggers queued in the attached inbox but not yet admitted.
    pub fn has_pending_triggers(&self) -> bool {
        self.inbox.as_ref().is_some_and(|inbox| !inbox.is_empty())
    }

    pub fn active_cycle(&self) -> Option<&RotationCycle> {
        self.cycle.as_ref()
    }

    pub fn history(&self) -> &FeedingStore {
        &self.history
    }

    pub fn last_admitted(&self) -> u64 {
        self.gate.last_admitted()
    }

    pub fn motor_energized(&self) -> bool {
        self.motor_energized
    }

    pub fn last_summary(&self) -> Option<FeedSummary> {
        self.last_summary
    }

    pub fn feeds_since_boot(&self) -> u64 {
        self.feeds_since_boot
    }

    pub fn rotation_cfg(&self) -> &RotationCfg {
        &self.rotation
    }

    /// Longest a feed of `rotations` can take: every rotation hits the
    /// fallback and every pause is taken, plus one tick of slack each.
    pub fn worst_case_feed_ms(&self, rotations: u32, tick_ms: u64) -> u64 {
        let per_rotation = self
            .rotation
            .expected_rotation_ms
            .saturating_add(self.rotation.pause_between_rotations_ms)
            .saturating_add(tick_ms.saturating_mul(2));
        per_rotation.saturating_mul(u64::from(rotations))
    }

    /// Route triggers from another thread through `inbox`.
    pub fn attach_inbox(&mut self, inbox: TriggerInbox) {
        self.inbox = Some(inbox);
    }

    /// Admit a trigger and start the feed immediately.
    ///
    /// Rejections come back as `FeederError::Rejected`; the state is left
    /// untouched in that case. A motor that fails to start does not undo
    /// the admission: the fault rides along in `Admission::motor_fault`
    /// and the rotation fallback ends the feed.
    pub fn trigger_feed(&mut self, request: FeedRequest) -> Result<Admission> {
        let now = self.now_ms();
        self.admit(request, now)
            .map_err(|e| eyre::Report::new(e).wrap_err("trigger rejected"))
    }

    /// Trigger `rotations` with `as_of` set to the current adjusted time.
    pub fn feed_now(&mut self, rotations: u32) -> Result<Admission> {
        let now_sec = self.adjusted_now_sec();
        self.trigger_feed(FeedRequest::new(now_sec, now_sec, rotations))
    }

    /// One iteration of the control loop.
    pub fn tick(&mut self) -> Result<TickStatus> {
        let now = self.now_ms();
        self.drain_inbox(now);

        let in_rotation = self.signal.read(now);
        let edge = self.was_in_rotation && !in_rotation;
        let result = self.advance(now, edge);
        self.was_in_rotation = in_rotation;

        let completed = matches!(result, Ok(TickStatus::Completed(_)));
        self.trace_sensor(now, in_rotation, edge, completed);
        result
    }

    /// De-energize the motor (best-effort on shutdown paths).
    pub fn motor_stop(&mut self) -> Result<()> {
        self.motor
            .stop()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("motor stop")?;
        self.motor_energized = false;
        Ok(())
    }

    fn status(&self) -> TickStatus {
        match &self.cycle {
            None => TickStatus::Idle,
            Some(c) => match self.continue_at_ms {
                Some(resume_at_ms) if !c.is_running() => TickStatus::Paused {
                    rotations_done: c.rotations_done(),
                    rotation_count: c.rotation_count(),
                    resume_at_ms,
                },
                _ => TickStatus::Rotating {
                    rotations_done: c.rotations_done(),
                    rotation_count: c.rotation_count(),
                },
            },
        }
    }

    fn admit(&mut self, request: FeedRequest, now: u64) -> std::result::Result<Admission, FeederError> {
        if let Err(reason) = self.gate.check(&request, self.is_in_feed()) {
            tracing::warn!(
                as_of = request.as_of,
                rotations = request.rotations,
                reason = %reason,
                "trigger rejected"
            );
            return Err(reason.into());
        }
        self.gate.admit(&request);

        let event = FeedEvent::new(request.adjusted_time_sec, request.rotations);
        let mut cycle = RotationCycle::new(
            request.rotations,
            now,
            request.adjusted_time_sec,
            self.rotation.expected_rotation_ms,
        );
        cycle.startup(now);
        self.cycle = Some(cycle);
        self.continue_at_ms = None;

        let index = self.history.add_feeding(event);
        self.persist(index, &event);

        let motor_fault = self.energize().err();
        if let Some(e) = &motor_fault {
            tracing::error!(error = %e, as_of = request.as_of, "motor did not start; feed admitted anyway");
        }
        Ok(Admission { event, motor_fault })
    }

    fn drain_inbox(&mut self, now: u64) {
        let pending = match &self.inbox {
            Some(inbox) => inbox.drain(),
            None => return,
        };
        for envelope in pending {
            let outcome = self.admit(envelope.request, now);
            envelope.reply(outcome);
        }
    }

    fn advance(&mut self, now: u64, edge: bool) -> Result<TickStatus> {
        let Some(cycle) = self.cycle.as_mut() else {
            return Ok(TickStatus::Idle);
        };

        // Pause elapsed: resume the next rotation and skip the edge check.
        if !cycle.is_running() && self.continue_at_ms.is_some_and(|at| at <= now) {
            self.continue_at_ms = None;
            cycle.go(now);
            self.energize()
                .map_err(eyre::Report::new)
                .wrap_err("motor start")?;
            return Ok(self.status());
        }

        if !cycle.is_running() {
            if edge {
                tracing::debug!("sensor edge ignored while paused");
            }
            return Ok(self.status());
        }

        let cause = if edge {
            Completion::Edge
        } else if cycle.should_have_finished_a_rotation(now) {
            tracing::warn!(
                rotation = cycle.rotations_done() + 1,
                overdue_ms = now.saturating_sub(cycle.projected_rotation_end_at()),
                "rotation timed out; forcing completion"
            );
            Completion::Timeout
        } else {
            return Ok(self.status());
        };

        let done = cycle.finished_a_rotation(now, cause);
        self.deenergize("end of rotation");
        if done {
            return Ok(TickStatus::Completed(self.finish_feed(now)));
        }
        self.continue_at_ms = Some(now.saturating_add(self.rotation.pause_between_rotations_ms));
        Ok(self.status())
    }

    fn finish_feed(&mut self, now: u64) -> FeedSummary {
        self.continue_at_ms = None;
        if self.motor_energized {
            self.deenergize("feed finished");
        }
        let summary = match self.cycle.take() {
            Some(mut cycle) => cycle.shutdown(now),
            None => FeedSummary {
                as_of_adjusted_sec: 0,
                rotations: 0,
                forced_rotations: 0,
                duration_ms: 0,
            },
        };
        self.feeds_since_boot += 1;
        tracing::info!(feeds_since_boot = self.feeds_since_boot, "controller idle");
        self.last_summary = Some(summary);
        summary
    }

    fn energize(&mut self) -> std::result::Result<(), FeederError> {
        // Marked first so a failed start is still followed by a stop.
        self.motor_energized = true;
        self.motor.start().map_err(|e| map_hw_error(&*e))
    }

    fn deenergize(&mut self, context: &'static str) {
        match self.motor.stop() {
            Ok(()) => self.motor_energized = false,
            Err(e) => tracing::warn!(error = %e, context, "motor_stop failed"),
        }
    }

    fn persist(&mut self, index: usize, event: &FeedEvent) {
        let cursor = self.history.cursor();
        if let Some(p) = self.persistence.as_mut()
            && let Err(e) = p
                .store(index, event, cursor)
                .map_err(|e| FeederError::Persistence(e.to_string()))
        {
            tracing::warn!(error = %e, index, "history persistence failed; keeping in-memory copy");
        }
    }

    fn trace_sensor(&mut self, now: u64, in_rotation: bool, edge: bool, completed: bool) {
        let slice = now / self.diagnostics_slice_ms.max(1);
        if slice != self.last_time_slice || edge || completed {
            self.last_time_slice = slice;
            tracing::trace!(
                now,
                in_rotation,
                edge,
                raw_level = self.signal.raw_level(),
                last_changed_at = self.signal.last_changed_at(),
                "rotation sensor"
            );
        }
    }
}
