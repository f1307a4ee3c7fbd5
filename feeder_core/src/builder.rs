//! Type-state builder for `Feeder` and generic `build_controller` constructor.
//!
//! The builder enforces at compile time that a rotation sensor and a motor
//! are provided before `build()` is available. `try_build()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use feeder_traits::{Clock, Motor, MonotonicClock, RotationSensor, SystemWallClock, WallClock};

use crate::config::{DiagnosticsCfg, HistoryCfg, RotationCfg, SensorCfg};
use crate::controller::FeedController;
use crate::debounce::Debounce;
use crate::error::{BuildError, FeederError, Result};
use crate::gate::TriggerGate;
use crate::history::FeedingStore;
use crate::inbox::TriggerInbox;
use crate::persistence::FeedingPersistence;

/// Dynamic (boxed) controller used by the CLI and most tests.
pub type Feeder = FeedController<Box<dyn RotationSensor>, Box<dyn Motor>>;

impl Feeder {
    /// Start building a Feeder.
    pub fn builder() -> FeederBuilder<Missing, Missing> {
        FeederBuilder::default()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Feeder`. All fields are validated on `build()`.
pub struct FeederBuilder<S, M> {
    sensor: Option<Box<dyn RotationSensor>>,
    motor: Option<Box<dyn Motor>>,
    sensor_cfg: Option<SensorCfg>,
    rotation: Option<RotationCfg>,
    history: Option<HistoryCfg>,
    diagnostics: Option<DiagnosticsCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    wall: Option<Box<dyn WallClock + Send + Sync>>,
    persistence: Option<Box<dyn FeedingPersistence>>,
    inbox: Option<TriggerInbox>,
    _s: PhantomData<S>,
    _m: PhantomData<M>,
}

impl Default for FeederBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            sensor: None,
            motor: None,
            sensor_cfg: None,
            rotation: None,
            history: None,
            diagnostics: None,
            clock: None,
            wall: None,
            persistence: None,
            inbox: None,
            _s: PhantomData,
            _m: PhantomData,
        }
    }
}

/// Validate configuration, construct the controller and rehydrate history.
///
/// Single source of truth for validation and construction, used by both
/// `FeederBuilder::try_build()` and `build_controller()`.
#[allow(clippy::too_many_arguments)]
fn validate_and_build<S: RotationSensor, M: Motor>(
    sensor: S,
    motor: M,
    sensor_cfg: SensorCfg,
    rotation: RotationCfg,
    history: HistoryCfg,
    diagnostics: DiagnosticsCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    wall: Option<Box<dyn WallClock + Send + Sync>>,
    persistence: Option<Box<dyn FeedingPersistence>>,
) -> Result<FeedController<S, M>> {
    // ── Validation ───────────────────────────────────────────────────────────
    if rotation.expected_rotation_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "expected_rotation_ms must be >= 1",
        )));
    }
    if rotation.expected_rotation_ms <= sensor_cfg.debounce_ms {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "expected_rotation_ms must exceed debounce_ms",
        )));
    }
    if rotation.max_rotations_per_feed == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_rotations_per_feed must be >= 1",
        )));
    }
    if history.capacity == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "history capacity must be >= 1",
        )));
    }
    if diagnostics.slice_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "diagnostic slice_ms must be >= 1",
        )));
    }

    // ── Construction ─────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    let wall: Arc<dyn WallClock + Send + Sync> = match wall {
        Some(b) => Arc::from(b),
        None => Arc::new(SystemWallClock),
    };
    let epoch = clock.now();

    let mut store = FeedingStore::new(history.capacity);
    let mut persistence = persistence;
    if let Some(p) = persistence.as_mut() {
        match p
            .load(history.capacity)
            .map_err(|e| FeederError::Persistence(e.to_string()))
        {
            Ok(image) => {
                store.restore(&image);
                tracing::info!(
                    written = store.written(),
                    cursor = store.cursor(),
                    "feeding history rehydrated"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not load feeding history; starting empty");
            }
        }
    }

    Ok(FeedController {
        signal: Debounce::new(sensor, sensor_cfg.debounce_ms, sensor_cfg.active_low),
        motor,
        clock,
        wall,
        epoch,
        gate: TriggerGate::new(rotation.max_rotations_per_feed),
        rotation,
        diagnostics_slice_ms: diagnostics.slice_ms,
        history: store,
        persistence,
        inbox: None,
        cycle: None,
        continue_at_ms: None,
        was_in_rotation: false,
        motor_energized: false,
        last_time_slice: 0,
        feeds_since_boot: 0,
        last_summary: None,
    })
}

impl<S, M> FeederBuilder<S, M> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Feeder> {
        let sensor = self
            .sensor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        let motor = self
            .motor
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMotor))?;

        let mut feeder = validate_and_build(
            sensor,
            motor,
            self.sensor_cfg.unwrap_or_default(),
            self.rotation.unwrap_or_default(),
            self.history.unwrap_or_default(),
            self.diagnostics.unwrap_or_default(),
            self.clock,
            self.wall,
            self.persistence,
        )?;
        if let Some(inbox) = self.inbox {
            feeder.attach_inbox(inbox);
        }
        Ok(feeder)
    }
}

/// Chainable setters that do not affect type-state.
impl<S, M> FeederBuilder<S, M> {
    pub fn with_sensor_cfg(mut self, sensor_cfg: SensorCfg) -> Self {
        self.sensor_cfg = Some(sensor_cfg);
        self
    }
    pub fn with_rotation(mut self, rotation: RotationCfg) -> Self {
        self.rotation = Some(rotation);
        self
    }
    pub fn with_history(mut self, history: HistoryCfg) -> Self {
        self.history = Some(history);
        self
    }
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsCfg) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Source of adjusted wall-clock time; defaults to the host clock.
    pub fn with_wall_clock(mut self, wall: Box<dyn WallClock + Send + Sync>) -> Self {
        self.wall = Some(wall);
        self
    }
    /// History backend; rehydrated from at build time.
    pub fn with_persistence(mut self, persistence: impl FeedingPersistence + 'static) -> Self {
        self.persistence = Some(Box::new(persistence));
        self
    }
    pub fn with_inbox(mut self, inbox: TriggerInbox) -> Self {
        self.inbox = Some(inbox);
        self
    }
}

// Setters that advance type-state
impl<M> FeederBuilder<Missing, M> {
    pub fn with_sensor(self, sensor: impl RotationSensor + 'static) -> FeederBuilder<Set, M> {
        FeederBuilder {
            sensor: Some(Box::new(sensor)),
            motor: self.motor,
            sensor_cfg: self.sensor_cfg,
            rotation: self.rotation,
            history: self.history,
            diagnostics: self.diagnostics,
            clock: self.clock,
            wall: self.wall,
            persistence: self.persistence,
            inbox: self.inbox,
            _s: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<S> FeederBuilder<S, Missing> {
    pub fn with_motor(self, motor: impl Motor + 'static) -> FeederBuilder<S, Set> {
        FeederBuilder {
            sensor: self.sensor,
            motor: Some(Box::new(motor)),
            sensor_cfg: self.sensor_cfg,
            rotation: self.rotation,
            history: self.history,
            diagnostics: self.diagnostics,
            clock: self.clock,
            wall: self.wall,
            persistence: self.persistence,
            inbox: self.inbox,
            _s: PhantomData,
            _m: PhantomData,
        }
    }
}

impl FeederBuilder<Set, Set> {
    /// Build the feeder. Only available once sensor and motor are set.
    pub fn build(self) -> Result<Feeder> {
        self.try_build()
    }
}

/// Build a statically dispatched controller without boxing the hardware.
#[allow(clippy::too_many_arguments)]
pub fn build_controller<S: RotationSensor, M: Motor>(
    sensor: S,
    motor: M,
    sensor_cfg: SensorCfg,
    rotation: RotationCfg,
    history: HistoryCfg,
    diagnostics: DiagnosticsCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    persistence: Option<Box<dyn FeedingPersistence>>,
) -> Result<FeedController<S, M>> {
    validate_and_build(
        sensor,
        motor,
        sensor_cfg,
        rotation,
        history,
        diagnostics,
        clock,
        None,
        persistence,
    )
}
