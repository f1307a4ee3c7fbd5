pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemWallClock, WallClock};

/// Rotation sensor input line.
///
/// Implementations report the electrical level only; wiring polarity
/// (pull-up / active-low) is applied by the debouncer in `feeder_core`.
pub trait RotationSensor {
    fn is_high(&mut self) -> bool;
}

/// Feed motor power output.
///
/// `start` energizes the motor, `stop` de-energizes it. There is no speed
/// control; a rotation is a fixed unit of travel.
pub trait Motor {
    fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: RotationSensor + ?Sized> RotationSensor for Box<T> {
    fn is_high(&mut self) -> bool {
        (**self).is_high()
    }
}

impl<T: Motor + ?Sized> Motor for Box<T> {
    fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).start()
    }
    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).stop()
    }
}
