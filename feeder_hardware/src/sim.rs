//! Simulated feeder mechanism.
//!
//! One rotation takes `rotation_ms` of energized motor time. The sensor
//! sits on the home notch (not in rotation) for the first `home_window_ms`
//! of each rotation and reads "in rotation" for the rest, so returning
//! home produces the falling edge the controller counts. Progress only
//! advances while the motor is energized, measured on the shared clock.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use feeder_traits::{Clock, Motor, RotationSensor};

use crate::error::HwError;

#[derive(Debug, Clone)]
pub struct SimCfg {
    pub rotation_ms: u64,
    pub home_window_ms: u64,
    /// Wiring polarity of the simulated line (pull-up reads low in rotation).
    pub active_low: bool,
    /// Sensor never leaves the idle level, as with a broken wire.
    pub stuck: bool,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            rotation_ms: 9_500,
            home_window_ms: 500,
            active_low: true,
            stuck: false,
        }
    }
}

#[derive(Debug)]
struct Mechanism {
    cfg: SimCfg,
    energized: bool,
    progress_ms: u64,
    last_update: Instant,
    rotations: u64,
}

impl Mechanism {
    fn advance(&mut self, now: Instant) {
        let elapsed =
            u64::try_from(now.saturating_duration_since(self.last_update).as_millis()).unwrap_or(u64::MAX);
        self.last_update = now;
        if !self.energized || self.cfg.rotation_ms == 0 {
            return;
        }
        self.progress_ms = self.progress_ms.saturating_add(elapsed);
        while self.progress_ms >= self.cfg.rotation_ms {
            self.progress_ms -= self.cfg.rotation_ms;
            self.rotations += 1;
        }
    }

    fn in_rotation(&self) -> bool {
        !self.cfg.stuck && self.progress_ms >= self.cfg.home_window_ms
    }

    fn level(&self) -> bool {
        self.in_rotation() != self.cfg.active_low
    }
}

type Shared = Arc<Mutex<Mechanism>>;

/// Build a sensor/motor pair over one simulated mechanism.
pub fn simulated_feeder(
    cfg: SimCfg,
    clock: Arc<dyn Clock + Send + Sync>,
) -> (SimulatedSensor, SimulatedMotor) {
    let idle_level = cfg.active_low;
    let shared = Arc::new(Mutex::new(Mechanism {
        cfg,
        energized: false,
        progress_ms: 0,
        last_update: clock.now(),
        rotations: 0,
    }));
    (
        SimulatedSensor {
            shared: shared.clone(),
            clock: clock.clone(),
            idle_level,
        },
        SimulatedMotor { shared, clock },
    )
}

pub struct SimulatedSensor {
    shared: Shared,
    clock: Arc<dyn Clock + Send + Sync>,
    idle_level: bool,
}

impl RotationSensor for SimulatedSensor {
    fn is_high(&mut self) -> bool {
        match self.shared.lock() {
            Ok(mut m) => {
                m.advance(self.clock.now());
                m.level()
            }
            Err(_) => self.idle_level,
        }
    }
}

pub struct SimulatedMotor {
    shared: Shared,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl SimulatedMotor {
    fn set(&mut self, on: bool) -> Result<(), HwError> {
        let mut m = self
            .shared
            .lock()
            .map_err(|_| HwError::Sim("mechanism state poisoned".into()))?;
        m.advance(self.clock.now());
        m.energized = on;
        Ok(())
    }

    /// Whole rotations completed so far.
    pub fn rotations(&self) -> u64 {
        self.shared.lock().map(|m| m.rotations).unwrap_or(0)
    }

    pub fn is_energized(&self) -> bool {
        self.shared.lock().map(|m| m.energized).unwrap_or(false)
    }
}

impl Motor for SimulatedMotor {
    fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::trace!("motor started (simulated)");
        self.set(true)?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::trace!("motor stopped (simulated)");
        self.set(false)?;
        Ok(())
    }
}
