//! Hardware and transport boundaries for the feeder.
//!
//! Every collaborator the control loop talks to sits behind one of these
//! traits so the core can be driven by simulated devices in tests and by GPIO
//! drivers on the device.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Strain-gauge amplifier under the bowl.
pub trait WeightSource {
    /// Read one raw sample (ADC counts), waiting at most `timeout`.
    fn read(&mut self, timeout: std::time::Duration) -> Result<i32, BoxError>;
}

/// Dispensing motor.
pub trait Actuator {
    /// Set the drive level; 0 is off, 255 is full drive.
    fn set_drive(&mut self, level: u8) -> Result<(), BoxError>;

    fn stop(&mut self) -> Result<(), BoxError> {
        self.set_drive(0)
    }
}

/// One inbound publication taken off the message bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: String,
    pub payload: String,
}

/// Publish/subscribe transport. Connection management lives behind it.
pub trait CommandChannel {
    /// Non-blocking: return the next pending inbound message, if any.
    fn poll(&mut self) -> Option<Inbound>;

    /// Publish `payload` on the full `topic`.
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BoxError>;
}

/// Humidity/temperature probe. Returns `(relative_humidity_pct, celsius)`.
pub trait ClimateSensor {
    fn read(&mut self, timeout: std::time::Duration) -> Result<(f32, f32), BoxError>;
}

/// Time-of-flight ranger looking down into the food container.
pub trait RangeSensor {
    /// Distance in millimetres, or `None` when the target is out of range.
    fn distance_mm(&mut self, timeout: std::time::Duration) -> Result<Option<u16>, BoxError>;
}

/// Lid/button contact.
pub trait LidSwitch {
    fn is_pressed(&mut self) -> Result<bool, BoxError>;
}

impl<T: WeightSource + ?Sized> WeightSource for Box<T> {
    fn read(&mut self, timeout: std::time::Duration) -> Result<i32, BoxError> {
        (**self).read(timeout)
    }
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn set_drive(&mut self, level: u8) -> Result<(), BoxError> {
        (**self).set_drive(level)
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        (**self).stop()
    }
}

impl<T: CommandChannel + ?Sized> CommandChannel for Box<T> {
    fn poll(&mut self) -> Option<Inbound> {
        (**self).poll()
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), BoxError> {
        (**self).publish(topic, payload, retain)
    }
}
