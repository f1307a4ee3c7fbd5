//! Rotation sensor and motor drivers for the feeder.
//!
//! - `sim`: a simulated feeder mechanism, used by tests and the CLI's
//!   default (non-hardware) mode.
//! - `gpio` (feature `hardware`): Raspberry Pi GPIO sensor and motor relay.
pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use sim::{SimCfg, SimulatedMotor, SimulatedSensor, simulated_feeder};

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::{GpioMotor, GpioSensor};
