use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use feeder_core::mocks::{RecordingMotor, ScriptedSensor};
use feeder_core::runner::{run, run_until_idle, serve};
use feeder_core::{FeedRequest, Feeder, trigger_channel};
use feeder_traits::{ManualClock, RotationSensor};
use rstest::rstest;

/// Idle line that raises `shutdown` after a fixed number of samples.
struct StopAfter {
    left: AtomicU32,
    shutdown: Arc<AtomicBool>,
}

impl RotationSensor for StopAfter {
    fn is_high(&mut self) -> bool {
        if self.left.fetch_sub(1, Ordering::Relaxed) <= 1 {
            self.shutdown.store(true, Ordering::Relaxed);
        }
        true
    }
}

#[rstest]
fn run_until_idle_finishes_with_dead_sensor() {
    let clock = ManualClock::new();
    let motor = RecordingMotor::new();
    let mut feeder = Feeder::builder()
        .with_sensor(ScriptedSensor::new(true))
        .with_motor(motor.clone())
        .with_clock(Box::new(clock.clone()))
        .build()
        .unwrap();
    feeder
        .trigger_feed(FeedRequest::new(10, 10, 3))
        .unwrap();

    let shutdown = AtomicBool::new(false);
    let summary = run_until_idle(&mut feeder, 100, &shutdown)
        .unwrap()
        .expect("feed completes");
    assert_eq!(summary.rotations, 3);
    assert_eq!(summary.forced_rotations, 3);
    assert!(!motor.is_energized());
    // Three forced rotations plus two pauses, within a few ticks.
    assert!(summary.duration_ms >= 3 * 9_900 + 2 * 100);
    assert!(summary.duration_ms <= 3 * 9_900 + 2 * 100 + 60);
}

#[rstest]
fn run_until_idle_without_feed_returns_none() {
    let mut feeder = Feeder::builder()
        .with_sensor(ScriptedSensor::new(true))
        .with_motor(RecordingMotor::new())
        .with_clock(Box::new(ManualClock::new()))
        .build()
        .unwrap();
    let shutdown = AtomicBool::new(false);
    assert_eq!(run_until_idle(&mut feeder, 100, &shutdown).unwrap(), None);
}

#[rstest]
fn interrupted_feed_stops_motor() {
    let motor = RecordingMotor::new();
    let mut feeder = Feeder::builder()
        .with_sensor(ScriptedSensor::new(true))
        .with_motor(motor.clone())
        .with_clock(Box::new(ManualClock::new()))
        .build()
        .unwrap();
    feeder.trigger_feed(FeedRequest::new(10, 10, 1)).unwrap();
    assert!(motor.is_energized());

    let shutdown = AtomicBool::new(true);
    assert_eq!(run_until_idle(&mut feeder, 100, &shutdown).unwrap(), None);
    assert!(!motor.is_energized());
}

#[rstest]
fn run_serves_inbox_until_shutdown() {
    let shutdown = Arc::new(AtomicBool::new(false));
    let motor = RecordingMotor::new();
    let (tx, inbox) = trigger_channel(4);
    let mut feeder = Feeder::builder()
        .with_sensor(StopAfter {
            left: AtomicU32::new(2_500),
            shutdown: shutdown.clone(),
        })
        .with_motor(motor.clone())
        .with_clock(Box::new(ManualClock::new()))
        .with_inbox(inbox)
        .build()
        .unwrap();

    let reply = tx.request(FeedRequest::new(10, 10, 1)).unwrap();
    let stats = run(&mut feeder, 100, &shutdown).unwrap();

    assert!(reply.try_recv().unwrap().is_ok());
    assert_eq!(stats.ticks, 2_500);
    assert_eq!(stats.feeds_completed, 1);
    assert_eq!(stats.tick_errors, 0);
    assert!(!motor.is_energized());
    assert_eq!(feeder.history().written(), 1);
}

#[rstest]
fn closed_transport_waits_for_the_admitted_feed() {
    let motor = RecordingMotor::new();
    let (tx, inbox) = trigger_channel(4);
    let mut feeder = Feeder::builder()
        .with_sensor(ScriptedSensor::new(true))
        .with_motor(motor.clone())
        .with_clock(Box::new(ManualClock::new()))
        .with_inbox(inbox)
        .build()
        .unwrap();

    let reply = tx.request(FeedRequest::new(10, 10, 2)).unwrap();
    drop(tx);
    let shutdown = AtomicBool::new(false);
    let closed = AtomicBool::new(true);
    let stats = serve(&mut feeder, 100, &shutdown, &closed).unwrap();

    assert!(reply.try_recv().unwrap().is_ok());
    assert_eq!(stats.feeds_completed, 1);
    assert!(!feeder.is_in_feed());
    assert!(!motor.is_energized());
    assert_eq!(motor.starts(), 2);
    // Two forced rotations and one pause, then one idle tick to notice.
    assert!(stats.ticks >= 2 * 990 + 10);
}

#[rstest]
fn closed_transport_with_nothing_to_do_returns_at_once() {
    let mut feeder = Feeder::builder()
        .with_sensor(ScriptedSensor::new(true))
        .with_motor(RecordingMotor::new())
        .with_clock(Box::new(ManualClock::new()))
        .build()
        .unwrap();
    let stats = serve(
        &mut feeder,
        100,
        &AtomicBool::new(false),
        &AtomicBool::new(true),
    )
    .unwrap();
    assert_eq!(stats, Default::default());
}

#[rstest]
fn shutdown_still_interrupts_a_serving_loop() {
    let motor = RecordingMotor::new();
    let mut feeder = Feeder::builder()
        .with_sensor(ScriptedSensor::new(true))
        .with_motor(motor.clone())
        .with_clock(Box::new(ManualClock::new()))
        .build()
        .unwrap();
    feeder.trigger_feed(FeedRequest::new(10, 10, 1)).unwrap();
    let stats = serve(
        &mut feeder,
        100,
        &AtomicBool::new(true),
        &AtomicBool::new(true),
    )
    .unwrap();
    assert_eq!(stats.ticks, 0);
    assert!(!motor.is_energized());
}
