use feeder_core::Debounce;
use feeder_core::mocks::ScriptedSensor;
use proptest::prelude::*;
use rstest::rstest;

fn debouncer(interval_ms: u64) -> (Debounce<ScriptedSensor>, ScriptedSensor) {
    // Active-high wiring keeps "high" == "in rotation" in these tests.
    let line = ScriptedSensor::new(false);
    (Debounce::new(line.clone(), interval_ms, false), line)
}

#[rstest]
fn bounce_shorter_than_interval_is_filtered() {
    let (mut d, line) = debouncer(125);
    assert!(!d.read(0));
    line.set_high(true);
    assert!(!d.read(10));
    line.set_high(false);
    assert!(!d.read(60));
    line.set_high(true);
    // Timer restarted at 100 by the flip back.
    assert!(!d.read(100));
    assert!(!d.read(224));
    assert!(d.read(225));
}

#[rstest]
fn zero_interval_follows_immediately() {
    let (mut d, line) = debouncer(0);
    line.set_high(true);
    assert!(d.read(1));
    line.set_high(false);
    assert!(!d.read(2));
}

#[rstest]
fn stable_does_not_sample() {
    let (mut d, line) = debouncer(0);
    line.set_high(true);
    assert!(!d.stable());
    assert!(d.read(0));
    line.set_high(false);
    assert!(d.stable());
}

proptest! {
    /// The debounced value only ever equals a raw value that has held for
    /// at least the interval.
    #[test]
    fn reported_changes_have_held_for_interval(
        steps in proptest::collection::vec((1u64..60, any::<bool>()), 1..200),
        interval in 0u64..150,
    ) {
        let (mut d, line) = debouncer(interval);
        let mut now = 0u64;
        let mut prev = false;
        let mut history: Vec<(u64, bool)> = vec![(0, false)];
        for (dt, level) in steps {
            now += dt;
            line.set_high(level);
            if history.last().map(|h| h.1) != Some(level) {
                history.push((now, level));
            }
            let out = d.read(now);
            if out != prev {
                let (since, raw) = *history.last().unwrap();
                prop_assert_eq!(raw, out);
                prop_assert!(now - since >= interval);
            }
            prev = out;
        }
    }
}
