//! Test and helper mocks for feeder_core

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use feeder_traits::{Motor, RotationSensor};

/// Sensor whose electrical level is set from outside. Clones share the line.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    level: Arc<AtomicBool>,
}

impl ScriptedSensor {
    pub fn new(high: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(high)),
        }
    }

    pub fn set_high(&self, high: bool) {
        self.level.store(high, Ordering::Relaxed);
    }
}

impl RotationSensor for ScriptedSensor {
    fn is_high(&mut self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

/// Motor that counts calls. Clones share the counters.
#[derive(Debug, Clone, Default)]
pub struct RecordingMotor {
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    energized: Arc<AtomicBool>,
    fail_start: Arc<AtomicBool>,
}

impl RecordingMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }

    pub fn is_energized(&self) -> bool {
        self.energized.load(Ordering::Relaxed)
    }

    /// Make subsequent `start` calls fail.
    pub fn fail_starts(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::Relaxed);
    }
}

impl Motor for RecordingMotor {
    fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.starts.fetch_add(1, Ordering::Relaxed);
        if self.fail_start.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("motor relay failed")));
        }
        self.energized.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.stops.fetch_add(1, Ordering::Relaxed);
        self.energized.store(false, Ordering::Relaxed);
        Ok(())
    }
}
