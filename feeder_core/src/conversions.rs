//! `From` implementations bridging `feeder_config` types to `feeder_core` types.

use crate::config::{DiagnosticsCfg, HistoryCfg, RotationCfg, SensorCfg};

// ── SensorCfg ────────────────────────────────────────────────────────────────

impl From<&feeder_config::SensorCfg> for SensorCfg {
    fn from(c: &feeder_config::SensorCfg) -> Self {
        Self {
            active_low: c.active_low,
            debounce_ms: c.debounce_ms,
        }
    }
}

// ── RotationCfg ──────────────────────────────────────────────────────────────

impl From<&feeder_config::RotationCfg> for RotationCfg {
    fn from(c: &feeder_config::RotationCfg) -> Self {
        Self {
            expected_rotation_ms: c.expected_rotation_ms,
            pause_between_rotations_ms: c.pause_between_rotations_ms,
            max_rotations_per_feed: c.max_rotations_per_feed,
        }
    }
}

/// Rotation timing with any persisted calibration applied.
impl From<&feeder_config::Config> for RotationCfg {
    fn from(c: &feeder_config::Config) -> Self {
        Self {
            expected_rotation_ms: c.effective_expected_rotation_ms(),
            ..Self::from(&c.rotation)
        }
    }
}

// ── HistoryCfg ───────────────────────────────────────────────────────────────

impl From<&feeder_config::HistoryCfg> for HistoryCfg {
    fn from(c: &feeder_config::HistoryCfg) -> Self {
        Self {
            capacity: c.capacity,
        }
    }
}

// ── DiagnosticsCfg ───────────────────────────────────────────────────────────

impl From<&feeder_config::RunnerCfg> for DiagnosticsCfg {
    fn from(c: &feeder_config::RunnerCfg) -> Self {
        Self {
            slice_ms: c.diagnostic_slice_ms,
        }
    }
}
