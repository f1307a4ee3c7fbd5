//! Time-based debouncing of the rotation sensor line.

use feeder_traits::RotationSensor;

/// Debounced view of a `RotationSensor`.
///
/// The raw electrical level is first mapped to the logical "in rotation"
/// state (`active_low` wiring reads low while rotating). The reported value
/// only follows a logical change once it has held for `interval_ms`; any
/// flip back restarts the wait. An interval of 0 reports changes on the
/// first observation.
#[derive(Debug)]
pub struct Debounce<S> {
    input: S,
    interval_ms: u64,
    active_low: bool,
    stable: bool,
    last_raw: bool,
    changed_at_ms: u64,
    raw_level: bool,
}

impl<S: RotationSensor> Debounce<S> {
    /// Stable and last-raw values start out as "not in rotation".
    pub fn new(input: S, interval_ms: u64, active_low: bool) -> Self {
        Self {
            input,
            interval_ms,
            active_low,
            stable: false,
            last_raw: false,
            changed_at_ms: 0,
            raw_level: active_low,
        }
    }

    /// Sample the line once and return the debounced "in rotation" value.
    pub fn read(&mut self, now_ms: u64) -> bool {
        let level = self.input.is_high();
        self.raw_level = level;
        let logical = level != self.active_low;

        if logical != self.last_raw {
            self.last_raw = logical;
            self.changed_at_ms = now_ms;
        }
        if self.last_raw != self.stable
            && now_ms.saturating_sub(self.changed_at_ms) >= self.interval_ms
        {
            self.stable = self.last_raw;
        }
        self.stable
    }

    /// Last debounced value, without sampling.
    pub fn stable(&self) -> bool {
        self.stable
    }

    /// Electrical level seen by the last `read`.
    pub fn raw_level(&self) -> bool {
        self.raw_level
    }

    /// When the logical raw value last flipped.
    pub fn last_changed_at(&self) -> u64 {
        self.changed_at_ms
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn active_low(&self) -> bool {
        self.active_low
    }

    pub fn input_mut(&mut self) -> &mut S {
        &mut self.input
    }
}
