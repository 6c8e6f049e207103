//! Raspberry Pi GPIO backends.

use std::time::Duration;

use feeder_traits::{Actuator, BoxError, LidSwitch, WeightSource};
use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::error::{HwError, Result};
use crate::hx711::Hx711;

/// Load cell behind an HX711 amplifier.
pub struct HardwareScale {
    hx711: Hx711,
}

impl HardwareScale {
    pub fn new(dt_pin: u8, sck_pin: u8) -> Result<Self> {
        let gpio = Gpio::new()?;
        let dt = gpio.get(dt_pin)?.into_input();
        let sck = gpio.get(sck_pin)?.into_output();
        Ok(Self {
            hx711: Hx711::new(dt, sck),
        })
    }
}

impl WeightSource for HardwareScale {
    fn read(&mut self, timeout: Duration) -> std::result::Result<i32, BoxError> {
        match self.hx711.read_with_timeout(timeout) {
            Ok(raw) => Ok(raw),
            Err(HwError::DataReadyTimeout) => {
                tracing::debug!(timeout_ms = timeout.as_millis() as u64, "hx711 not ready");
                Err(Box::new(HwError::Timeout))
            }
            Err(e) => {
                tracing::error!(error = %e, "scale read error");
                Err(Box::new(e))
            }
        }
    }
}

/// Feeder motor on a software-PWM output pin.
pub struct PwmMotor {
    pin: OutputPin,
    frequency_hz: f64,
    level: u8,
}

impl PwmMotor {
    pub fn new(pin: u8, frequency_hz: f64) -> Result<Self> {
        let mut pin = Gpio::new()?.get(pin)?.into_output();
        pin.set_low();
        Ok(Self {
            pin,
            frequency_hz,
            level: 0,
        })
    }
}

impl Actuator for PwmMotor {
    fn set_drive(&mut self, level: u8) -> std::result::Result<(), BoxError> {
        if level == self.level {
            return Ok(());
        }
        if level == 0 {
            self.pin.clear_pwm().map_err(HwError::from)?;
            self.pin.set_low();
        } else {
            let duty = f64::from(level) / 255.0;
            self.pin
                .set_pwm_frequency(self.frequency_hz, duty)
                .map_err(HwError::from)?;
        }
        self.level = level;
        tracing::debug!(level, "motor drive");
        Ok(())
    }
}

impl Drop for PwmMotor {
    fn drop(&mut self) {
        let _ = self.pin.clear_pwm();
        self.pin.set_low();
    }
}

/// Normally-open contact to ground with the internal pull-up enabled.
pub struct GpioLidSwitch {
    pin: InputPin,
}

impl GpioLidSwitch {
    pub fn new(pin: u8) -> Result<Self> {
        Ok(Self {
            pin: Gpio::new()?.get(pin)?.into_input_pullup(),
        })
    }
}

impl LidSwitch for GpioLidSwitch {
    fn is_pressed(&mut self) -> std::result::Result<bool, BoxError> {
        Ok(self.pin.is_low())
    }
}
