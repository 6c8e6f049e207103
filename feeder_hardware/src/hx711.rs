use std::time::Duration;
use tracing::trace;

use crate::error::Result;
use crate::util::{sign_extend_24, wait_until_low_with_timeout};

/// Bit-banged HX711 on channel A, gain 128 (25 clock pulses per sample).
pub struct Hx711 {
    dt: rppal::gpio::InputPin,
    sck: rppal::gpio::OutputPin,
}

const CHANNEL_A_GAIN_128_PULSES: u8 = 1;

impl Hx711 {
    pub fn new(dt: rppal::gpio::InputPin, mut sck: rppal::gpio::OutputPin) -> Self {
        sck.set_low(); // clock idle low keeps the chip powered up
        Self { dt, sck }
    }

    /// Read one 24-bit sample, waiting at most `timeout` for data-ready.
    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), timeout, Duration::from_micros(200))?;

        let mut value: u32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            std::hint::spin_loop();
            value = (value << 1) | u32::from(self.dt.is_high());
            self.sck.set_low();
            std::hint::spin_loop();
        }
        // Extra pulses select the channel/gain of the next conversion.
        for _ in 0..CHANNEL_A_GAIN_128_PULSES {
            self.sck.set_high();
            std::hint::spin_loop();
            self.sck.set_low();
            std::hint::spin_loop();
        }

        let raw = sign_extend_24(value);
        trace!(raw, "hx711 raw read");
        Ok(raw)
    }
}
