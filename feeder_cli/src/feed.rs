//! Feed execution: config mapping, hardware assembly, and the command bodies.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use feeder_config::{Config, RotationCalibration};
use feeder_core::error::Result as CoreResult;
use feeder_core::{
    Admission, DiagnosticsCfg, FeedEvent, FeedRequest, FeedSummary, Feeder, FeedingStore, FilePersistence,
    HistoryCfg, MemoryPersistence, PersistedFeedings, RotationCfg, SensorCfg, TriggerSender,
};
use feeder_traits::{Clock, ManualClock, Motor, MonotonicClock, RotationSensor, SystemWallClock, WallClock};

/// How long a stdin transport waits for the loop to answer a trigger.
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

type Hardware = (Box<dyn RotationSensor>, Box<dyn Motor>);

/// Build the sensor and motor for this build: GPIO with the `hardware`
/// feature on Linux, the simulated mechanism otherwise.
pub fn make_hardware(cfg: &Config, clock: Arc<dyn Clock + Send + Sync>) -> eyre::Result<Hardware> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let _ = clock;
        let sensor = feeder_hardware::GpioSensor::new(cfg.pins.rotation_sensor)
            .wrap_err("open rotation sensor pin")?;
        let motor =
            feeder_hardware::GpioMotor::new(cfg.pins.motor_power).wrap_err("open motor pin")?;
        Ok((Box::new(sensor), Box::new(motor)))
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        let stuck = std::env::var("FEEDER_TEST_SIM_STUCK").is_ok_and(|v| v == "1");
        if stuck {
            tracing::warn!("simulated rotation sensor is stuck");
        }
        let (sensor, motor) = feeder_hardware::simulated_feeder(
            feeder_hardware::SimCfg {
                active_low: cfg.sensor.active_low,
                stuck,
                ..feeder_hardware::SimCfg::default()
            },
            clock,
        );
        Ok((Box::new(sensor), Box::new(motor)))
    }
}

/// True when the build drives simulated hardware.
pub const fn is_simulated() -> bool {
    !cfg!(all(feature = "hardware", target_os = "linux"))
}

/// Assemble a controller from config, rehydrating history from disk when
/// `history.path` is set.
pub fn build_feeder(
    cfg: &Config,
    calibration: Option<&RotationCalibration>,
    clock: Arc<dyn Clock + Send + Sync>,
) -> eyre::Result<Feeder> {
    let (sensor, motor) = make_hardware(cfg, clock.clone())?;

    let sensor_cfg: SensorCfg = (&cfg.sensor).into();
    let mut rotation: RotationCfg = cfg.into();
    if let Some(c) = calibration {
        tracing::info!(
            expected_rotation_ms = c.expected_rotation_ms,
            used = c.used,
            total = c.total,
            "using rotation calibration"
        );
        rotation.expected_rotation_ms = c.expected_rotation_ms;
    }
    let history: HistoryCfg = (&cfg.history).into();
    let diagnostics: DiagnosticsCfg = (&cfg.runner).into();

    let builder = Feeder::builder()
        .with_sensor(sensor)
        .with_motor(motor)
        .with_sensor_cfg(sensor_cfg)
        .with_rotation(rotation)
        .with_history(history)
        .with_diagnostics(diagnostics)
        .with_clock(Box::new(SharedClock(clock)))
        .with_wall_clock(Box::new(SystemWallClock));

    let builder = match &cfg.history.path {
        Some(path) => builder.with_persistence(FilePersistence::new(path)),
        None => builder.with_persistence(MemoryPersistence::new()),
    };
    builder.try_build()
}

/// Adapter so one clock can be shared by the hardware and the controller.
struct SharedClock(Arc<dyn Clock + Send + Sync>);

impl Clock for SharedClock {
    fn now(&self) -> std::time::Instant {
        self.0.now()
    }
    fn sleep(&self, d: Duration) {
        self.0.sleep(d);
    }
}

fn pick_clock(virtual_time: bool) -> Arc<dyn Clock + Send + Sync> {
    if virtual_time {
        Arc::new(ManualClock::new())
    } else {
        Arc::new(MonotonicClock::new())
    }
}

/// Run a single feed to completion.
pub fn run_feed(
    cfg: &Config,
    calibration: Option<&RotationCalibration>,
    rotations: u32,
    as_of: Option<u64>,
    realtime: bool,
    shutdown: &AtomicBool,
) -> CoreResult<Option<FeedSummary>> {
    let clock = pick_clock(is_simulated() && !realtime);
    let mut feeder = build_feeder(cfg, calibration, clock)?;

    let now_sec = feeder.adjusted_now_sec();
    let request = FeedRequest::new(as_of.unwrap_or(now_sec), now_sec, rotations);
    let admission = feeder.trigger_feed(request)?;
    if let Some(fault) = &admission.motor_fault {
        tracing::warn!(error = %fault, "motor did not start; relying on the rotation timeout");
    }
    tracing::info!(rotations, as_of = request.as_of, "feed start");

    feeder_core::runner::run_until_idle(&mut feeder, cfg.runner.tick_hz, shutdown)
}

/// Run the control loop until Ctrl-C, or until stdin ends and the last
/// admitted feed has finished.
///
/// Each stdin line is a JSON trigger; one JSON outcome line is printed
/// per input line.
pub fn run_serve(
    cfg: &Config,
    calibration: Option<&RotationCalibration>,
    shutdown: &AtomicBool,
) -> CoreResult<feeder_core::runner::RunStats> {
    let mut feeder = build_feeder(cfg, calibration, pick_clock(false))?;
    let (tx, inbox) = feeder_core::trigger_channel(8);
    feeder.attach_inbox(inbox);

    let stdin_closed = Arc::new(AtomicBool::new(false));
    let reader_closed = stdin_closed.clone();
    let reader = std::thread::Builder::new()
        .name("stdin-triggers".into())
        .spawn(move || {
            read_triggers(std::io::stdin().lock(), &tx, &SystemWallClock);
            tracing::debug!("stdin closed; no more triggers");
            reader_closed.store(true, Ordering::Relaxed);
        })
        .wrap_err("spawn stdin reader")?;

    let stats =
        feeder_core::runner::serve(&mut feeder, cfg.runner.tick_hz, shutdown, &stdin_closed);
    if reader.is_finished() && reader.join().is_err() {
        tracing::warn!("stdin reader panicked");
    }
    stats
}

/// Forward JSON trigger lines to the loop and print each outcome.
pub fn read_triggers(input: impl BufRead, tx: &TriggerSender, wall: &dyn WallClock) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let outcome = match FeedRequest::from_json(&line, wall.now_epoch_secs()) {
            Err(e) => serde_json::json!({ "accepted": false, "reason": "Payload", "message": e.to_string() }),
            Ok(request) => match tx.request(request) {
                Err(e) => serde_json::json!({ "accepted": false, "reason": "Unavailable", "message": e.to_string() }),
                Ok(rx) => match rx.recv_timeout(REPLY_TIMEOUT) {
                    Ok(Ok(admission)) => accepted_json(&admission),
                    Ok(Err(e)) => serde_json::json!({
                        "accepted": false,
                        "reason": crate::error_fmt::reason_name(&e),
                        "message": e.to_string(),
                    }),
                    Err(_) => serde_json::json!({ "accepted": false, "reason": "Timeout", "message": "no reply from feed loop" }),
                },
            },
        };
        println!("{outcome}");
    }
}

fn accepted_json(admission: &Admission) -> serde_json::Value {
    let mut reply = serde_json::json!({
        "accepted": true,
        "as_of_adjusted_sec": admission.event.as_of_adjusted_sec,
        "rotations": admission.event.rotations,
    });
    if let Some(fault) = &admission.motor_fault {
        reply["warning"] = serde_json::Value::String(fault.to_string());
    }
    reply
}

/// Persisted history, newest first. Empty when no history file exists yet.
pub fn load_history(cfg: &Config) -> eyre::Result<Vec<FeedEvent>> {
    let Some(path) = &cfg.history.path else {
        eyre::bail!("history.path is not configured; history is kept in memory only");
    };
    let path = std::path::Path::new(path);
    let image = if path.exists() {
        feeder_core::persistence::read_history_file(path)
            .map_err(|e| eyre::eyre!("{e}"))
            .wrap_err("read feeding history")?
    } else {
        PersistedFeedings::default()
    };
    let mut store = FeedingStore::new(cfg.history.capacity);
    store.restore(&image);
    Ok(store.sorted_by_as_of())
}

/// `2024-05-01 07:30:00 UTC`, or the raw seconds if out of range.
pub fn format_as_of(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map_or_else(
            || secs.to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
}

pub fn history_json(event: &FeedEvent) -> serde_json::Value {
    serde_json::json!({
        "as_of_adjusted_sec": event.as_of_adjusted_sec,
        "at": format_as_of(event.as_of_adjusted_sec),
        "rotations": event.rotations,
    })
}

/// Sample the sensor once and make sure the motor is off.
pub fn self_check(cfg: &Config) -> eyre::Result<bool> {
    let (mut sensor, mut motor) = make_hardware(cfg, pick_clock(false))?;
    motor
        .stop()
        .map_err(|e| eyre::Report::new(feeder_core::hw_error::map_hw_error(&*e)))
        .wrap_err("motor stop")?;
    let level = sensor.is_high();
    let in_rotation = level != cfg.sensor.active_low;
    tracing::info!(level, in_rotation, simulated = is_simulated(), "self-check");
    Ok(in_rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use feeder_core::FeederError;

    #[test]
    fn motor_fault_is_accepted_with_a_warning() {
        let mut admission = Admission::new(FeedEvent::new(1000, 2));
        let clean = accepted_json(&admission);
        assert_eq!(clean["accepted"], true);
        assert!(clean.get("warning").is_none());

        admission.motor_fault = Some(FeederError::Hardware("relay stuck".into()));
        let reply = accepted_json(&admission);
        assert_eq!(reply["accepted"], true);
        assert_eq!(reply["rotations"], 2);
        assert_eq!(reply["warning"], "hardware error: relay stuck");
    }
}
