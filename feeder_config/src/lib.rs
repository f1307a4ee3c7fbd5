#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and rotation calibration parsing for the feeder.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The rotation calibration CSV loader enforces its header and discards
//!   samples that look like missed-edge double rotations before deriving
//!   the expected rotation duration.
use serde::Deserialize;

/// Safety margin (percent) applied on top of the slowest observed clean rotation.
pub const CALIBRATION_MARGIN_PCT: u64 = 101;

/// A sample longer than this percentage of the median is treated as a missed
/// edge (two rotations recorded as one) and excluded from calibration.
pub const OUTLIER_PCT: u64 = 150;

/// Rotation calibration CSV schema.
///
/// Expected headers:
/// duration_ms
///
/// Example:
/// duration_ms
/// 9512
/// 9788
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RotationSampleRow {
    pub duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Pins {
    /// Rotation sensor input (wired with pull-up when `sensor.active_low`)
    pub rotation_sensor: u8,
    /// Motor power output
    pub motor_power: u8,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SensorCfg {
    /// Line is pulled up and reads low while a rotation is in progress
    pub active_low: bool,
    /// Raw level must hold this long before the debounced value follows it
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RotationCfg {
    /// Upper bound for one rotation; exceeding it forces the rotation to finish
    pub expected_rotation_ms: u64,
    /// Motor rest between two rotations of the same feed
    pub pause_between_rotations_ms: u64,
    /// Largest rotation count a single trigger may request
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryCfg {
    /// Number of feed records kept (ring buffer slots)
    pub capacity: usize,
    /// Where the history image is persisted; in-memory only when absent
    pub path: Option<String>,
}

impl Default for HistoryCfg {
    fn default() -> Self {
        Self {
            capacity: 200,
            path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Control loop cadence
    pub tick_hz: u32,
    /// Sensor diagnostics are traced at most once per slice
    pub diagnostic_slice_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            tick_hz: 100,
            diagnostic_slice_ms: 300,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PersistedCalibration {
    /// Calibrated upper bound for one rotation; preferred over `rotation.expected_rotation_ms`
    pub expected_rotation_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub sensor: SensorCfg,
    #[serde(default)]
    pub rotation: RotationCfg,
    #[serde(default)]
    pub history: HistoryCfg,
    #[serde(default)]
    pub runner: RunnerCfg,
    #[serde(default)]
    pub logging: Logging,
    /// Optional persisted calibration; preferred at runtime when present.
    #[serde(default)]
    pub calibration: Option<PersistedCalibration>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Expected rotation duration after applying any persisted calibration.
    pub fn effective_expected_rotation_ms(&self) -> u64 {
        self.calibration
            .map(|c| c.expected_rotation_ms)
            .unwrap_or(self.rotation.expected_rotation_ms)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        if self.pins.rotation_sensor == self.pins.motor_power {
            eyre::bail!("pins.rotation_sensor and pins.motor_power must differ");
        }

        // Sensor
        if self.sensor.debounce_ms > 10_000 {
            eyre::bail!("sensor.debounce_ms is unreasonably large (>10s)");
        }

        // Rotation
        let expected = self.effective_expected_rotation_ms();
        if self.rotation.expected_rotation_ms == 0 {
            eyre::bail!("rotation.expected_rotation_ms must be >= 1");
        }
        if expected > 10 * 60 * 1000 {
            eyre::bail!("rotation.expected_rotation_ms is unreasonably large (>10min)");
        }
        if expected <= self.sensor.debounce_ms {
            eyre::bail!(
                "rotation.expected_rotation_ms must exceed sensor.debounce_ms, otherwise no edge can be observed before the fallback"
            );
        }
        if self.rotation.pause_between_rotations_ms > 60_000 {
            eyre::bail!("rotation.pause_between_rotations_ms is unreasonably large (>60s)");
        }
        if self.rotation.max_rotations_per_feed == 0 {
            eyre::bail!("rotation.max_rotations_per_feed must be >= 1");
        }
        if self.rotation.max_rotations_per_feed > 1000 {
            eyre::bail!("rotation.max_rotations_per_feed is unreasonably large (>1000)");
        }

        // History
        if self.history.capacity == 0 {
            eyre::bail!("history.capacity must be >= 1");
        }
        if self.history.capacity > 10_000 {
            eyre::bail!("history.capacity is unreasonably large (>10000)");
        }
        if let Some(path) = &self.history.path
            && path.trim().is_empty()
        {
            eyre::bail!("history.path must not be empty when set");
        }

        // Runner
        if self.runner.tick_hz == 0 {
            eyre::bail!("runner.tick_hz must be > 0");
        }
        if self.runner.tick_hz > 10_000 {
            eyre::bail!("runner.tick_hz is unreasonably large (>10kHz)");
        }
        if self.runner.diagnostic_slice_ms == 0 {
            eyre::bail!("runner.diagnostic_slice_ms must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Calibration
        if let Some(c) = self.calibration
            && c.expected_rotation_ms == 0
        {
            eyre::bail!("calibration.expected_rotation_ms must be >= 1");
        }

        Ok(())
    }
}

/// Expected rotation duration derived from observed clean rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationCalibration {
    pub expected_rotation_ms: u64,
    /// Slowest sample kept after outlier rejection
    pub slowest_ms: u64,
    /// Samples kept / total samples
    pub used: usize,
    pub total: usize,
}

impl RotationCalibration {
    /// Build a calibration from observed rotation durations.
    ///
    /// With three or more samples, anything longer than `OUTLIER_PCT`
    /// percent of the median is dropped (a missed edge doubles a sample).
    /// The expected duration is the slowest kept sample scaled by
    /// `CALIBRATION_MARGIN_PCT`, rounded up.
    pub fn from_rows(rows: Vec<RotationSampleRow>) -> eyre::Result<Self> {
        if rows.is_empty() {
            eyre::bail!("calibration requires at least one row");
        }
        if let Some(idx) = rows.iter().position(|r| r.duration_ms == 0) {
            eyre::bail!("calibration row {} has zero duration", idx + 2);
        }

        let mut durations: Vec<u64> = rows.iter().map(|r| r.duration_ms).collect();
        durations.sort_unstable();
        let total = durations.len();

        let kept: Vec<u64> = if total >= 3 {
            let limit = durations[total / 2].saturating_mul(OUTLIER_PCT) / 100;
            let inliers: Vec<u64> = durations.iter().copied().filter(|d| *d <= limit).collect();
            if inliers.len() >= 2 { inliers } else { durations }
        } else {
            durations
        };

        let slowest_ms = kept.iter().copied().max().unwrap_or(0);
        let expected = slowest_ms
            .checked_mul(CALIBRATION_MARGIN_PCT)
            .map(|v| v.div_ceil(100))
            .ok_or_else(|| eyre::eyre!("calibration duration overflow"))?;

        Ok(Self {
            expected_rotation_ms: expected,
            slowest_ms,
            used: kept.len(),
            total,
        })
    }
}

impl TryFrom<Vec<RotationSampleRow>> for RotationCalibration {
    type Error = eyre::Report;
    fn try_from(rows: Vec<RotationSampleRow>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_rotation_csv(path: &std::path::Path) -> eyre::Result<RotationCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["duration_ms"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have header 'duration_ms', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<RotationSampleRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    RotationCalibration::try_from(rows)
}
