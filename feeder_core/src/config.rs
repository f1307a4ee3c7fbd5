//! Runtime configuration types for the feed controller.
//!
//! These are separate from the TOML-deserialized config in `feeder_config`;
//! see `conversions` for the mapping.

/// Rotation sensor line settings.
#[derive(Debug, Clone)]
pub struct SensorCfg {
    /// Pull-up wiring: the line reads low while a rotation is in progress.
    /// The debounced value is always the logical "in rotation" state.
    pub active_low: bool,
    /// Raw level must hold this long before the debounced value follows it.
    pub debounce_ms: u64,
}

impl Default for SensorCfg {
    fn default() -> Self {
        Self {
            active_low: true,
            debounce_ms: 125,
        }
    }
}

/// Rotation timing.
#[derive(Debug, Clone)]
pub struct RotationCfg {
    /// Calibrated upper bound for one rotation. Exceeding it forces the
    /// rotation to finish so a dead sensor cannot run the motor forever.
    pub expected_rotation_ms: u64,
    /// Motor rest between rotations of the same feed.
    pub pause_between_rotations_ms: u64,
    /// Largest rotation count a single trigger may request.
    pub max_rotations_per_feed: u32,
}

impl Default for RotationCfg {
    fn default() -> Self {
        Self {
            expected_rotation_ms: 9_900,
            pause_between_rotations_ms: 100,
            max_rotations_per_feed: 20,
        }
    }
}

/// Feeding history ring buffer.
#[derive(Debug, Clone)]
pub struct HistoryCfg {
    pub capacity: usize,
}

impl Default for HistoryCfg {
    fn default() -> Self {
        Self { capacity: 200 }
    }
}

/// Sensor diagnostics cadence.
#[derive(Debug, Clone)]
pub struct DiagnosticsCfg {
    /// Sensor state is traced at most once per slice, and on every completion.
    pub slice_ms: u64,
}

impl Default for DiagnosticsCfg {
    fn default() -> Self {
        Self { slice_ms: 300 }
    }
}
