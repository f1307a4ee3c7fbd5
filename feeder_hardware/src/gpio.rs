//! Raspberry Pi GPIO drivers.

use feeder_traits::{Motor, RotationSensor};
use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::error::{HwError, Result};

fn gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))
}

/// Rotation sensor input with the internal pull-up enabled.
pub struct GpioSensor {
    pin: InputPin,
}

impl GpioSensor {
    pub fn new(bcm_pin: u8) -> Result<Self> {
        let pin = gpio()?
            .get(bcm_pin)
            .map_err(|e| HwError::Gpio(format!("rotation sensor pin {bcm_pin}: {e}")))?
            .into_input_pullup();
        tracing::debug!(pin = bcm_pin, "rotation sensor ready");
        Ok(Self { pin })
    }
}

impl RotationSensor for GpioSensor {
    fn is_high(&mut self) -> bool {
        self.pin.is_high()
    }
}

/// Motor power relay. Energized while the pin is high.
pub struct GpioMotor {
    pin: OutputPin,
}

impl GpioMotor {
    /// The pin is driven low (motor off) as soon as it is claimed.
    pub fn new(bcm_pin: u8) -> Result<Self> {
        let pin = gpio()?
            .get(bcm_pin)
            .map_err(|e| HwError::Gpio(format!("motor pin {bcm_pin}: {e}")))?
            .into_output_low();
        tracing::debug!(pin = bcm_pin, "motor relay ready");
        Ok(Self { pin })
    }
}

impl Motor for GpioMotor {
    fn start(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.set_high();
        tracing::trace!("motor energized");
        Ok(())
    }

    fn stop(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.set_low();
        tracing::trace!("motor de-energized");
        Ok(())
    }
}

impl Drop for GpioMotor {
    fn drop(&mut self) {
        self.pin.set_low();
    }
}
