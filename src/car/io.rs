// Hardware boundary: pin I/O, ultrasonic ranging and the blocking delay

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::board::{AnalogPin, DigitalPin};
use super::encoder::Level;
use super::error::Result;

/// Unit returned by the ultrasonic ranging primitive
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PingUnit {
    MicroSeconds = 0,
    Centimeters = 1,
    Inches = 2,
}

/// Pin-level access to the car
///
/// Writes are assumed to take effect immediately. A ranging failure is reported
/// through whatever value the implementation returns, not through an error.
pub trait CarIo {
    fn write_digital(&mut self, pin: DigitalPin, level: Level) -> Result<()>;

    fn read_analog(&mut self, pin: AnalogPin) -> Result<u16>;

    fn ping(&mut self, trigger: DigitalPin, echo: DigitalPin, unit: PingUnit) -> Result<u16>;
}

impl<T: CarIo + ?Sized> CarIo for Box<T> {
    fn write_digital(&mut self, pin: DigitalPin, level: Level) -> Result<()> {
        (**self).write_digital(pin, level)
    }

    fn read_analog(&mut self, pin: AnalogPin) -> Result<u16> {
        (**self).read_analog(pin)
    }

    fn ping(&mut self, trigger: DigitalPin, echo: DigitalPin, unit: PingUnit) -> Result<u16> {
        (**self).ping(trigger, echo, unit)
    }
}

/// Blocking delay used to hold a timed move
pub trait Clock {
    fn sleep_ms(&mut self, ms: f64);
}

/// Wall-clock delay on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Wall-clock length of a hold, `None` when there is nothing to wait for.
    /// Holds beyond what `Duration` can represent saturate to `Duration::MAX`.
    pub fn hold_duration(ms: f64) -> Option<Duration> {
        if !(ms.is_finite() && ms > 0.0) {
            return None;
        }
        Some(Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX))
    }
}

impl Clock for SystemClock {
    fn sleep_ms(&mut self, ms: f64) {
        if let Some(hold) = Self::hold_duration(ms) {
            thread::sleep(hold);
        }
    }
}
