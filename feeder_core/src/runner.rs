//! Fixed-cadence drivers for `FeedController::tick`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use feeder_traits::{Motor, RotationSensor};

use crate::controller::FeedController;
use crate::error::{FeederError, Result};
use crate::status::{FeedSummary, TickStatus};

/// Counters reported when `run` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub feeds_completed: u64,
    pub tick_errors: u64,
}

/// Tick until `shutdown` is set, then de-energize the motor.
///
/// Tick errors (a failed motor start) are logged and the loop keeps going;
/// the timeout fallback still ends the affected rotation.
pub fn run<S, M>(
    controller: &mut FeedController<S, M>,
    tick_hz: u32,
    shutdown: &AtomicBool,
) -> Result<RunStats>
where
    S: RotationSensor,
    M: Motor,
{
    serve(controller, tick_hz, shutdown, &AtomicBool::new(false))
}

/// Like `run`, but also returns once `transport_closed` is set and the
/// controller has nothing left to do: no feed in progress and no queued
/// trigger. `shutdown` still stops the loop immediately.
pub fn serve<S, M>(
    controller: &mut FeedController<S, M>,
    tick_hz: u32,
    shutdown: &AtomicBool,
    transport_closed: &AtomicBool,
) -> Result<RunStats>
where
    S: RotationSensor,
    M: Motor,
{
    let period = Duration::from_micros(crate::util::period_us(tick_hz));
    let mut stats = RunStats::default();
    tracing::info!(tick_hz, "feed loop running");

    while !shutdown.load(Ordering::Relaxed) {
        if transport_closed.load(Ordering::Relaxed)
            && !controller.is_in_feed()
            && !controller.has_pending_triggers()
        {
            tracing::debug!("trigger transport closed and controller idle");
            break;
        }
        stats.ticks += 1;
        match controller.tick() {
            Ok(TickStatus::Completed(summary)) => {
                stats.feeds_completed += 1;
                tracing::debug!(?summary, "feed completed");
            }
            Ok(_) => {}
            Err(e) => {
                stats.tick_errors += 1;
                tracing::warn!(error = %e, "tick failed");
            }
        }
        controller.clock().sleep(period);
    }

    tracing::info!(
        ticks = stats.ticks,
        feeds = stats.feeds_completed,
        "feed loop stopping"
    );
    controller
        .motor_stop()
        .wrap_err("motor stop on shutdown")?;
    Ok(stats)
}

/// Tick until the active feed completes.
///
/// Returns `None` if no feed was in progress or `shutdown` was set first.
/// A feed that outlives its worst-case duration is a fault; the motor is
/// stopped before any error is returned.
pub fn run_until_idle<S, M>(
    controller: &mut FeedController<S, M>,
    tick_hz: u32,
    shutdown: &AtomicBool,
) -> Result<Option<FeedSummary>>
where
    S: RotationSensor,
    M: Motor,
{
    let Some(cycle) = controller.active_cycle() else {
        return Ok(None);
    };
    let remaining = cycle.rotation_count() - cycle.rotations_done();
    let tick_ms = crate::util::period_ms(tick_hz);
    let budget_ms = controller
        .worst_case_feed_ms(remaining, tick_ms)
        .saturating_add(tick_ms);
    let deadline = controller.now_ms().saturating_add(budget_ms);
    let period = Duration::from_micros(crate::util::period_us(tick_hz));

    loop {
        if shutdown.load(Ordering::Relaxed) {
            stop_best_effort(controller, "interrupted");
            return Ok(None);
        }
        match controller.tick() {
            Ok(TickStatus::Completed(summary)) => return Ok(Some(summary)),
            Ok(_) => {}
            Err(e) => {
                stop_best_effort(controller, "tick failed");
                return Err(e);
            }
        }
        if controller.now_ms() > deadline {
            stop_best_effort(controller, "feed overran");
            return Err(eyre::Report::new(FeederError::HardwareFault(format!(
                "feed did not finish within {budget_ms} ms"
            ))));
        }
        controller.clock().sleep(period);
    }
}

fn stop_best_effort<S: RotationSensor, M: Motor>(
    controller: &mut FeedController<S, M>,
    context: &'static str,
) {
    if let Err(e) = controller.motor_stop() {
        tracing::warn!(error = %e, context, "motor_stop failed");
    }
}
