// In-memory car for simulation and tests
//
// SimIo keeps the last level written to every pin and serves configurable
// analog/ranging readings. SimIo and ManualClock can share one EventLog so the
// exact order of writes and holds can be inspected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::board::{AnalogPin, DigitalPin};
use super::encoder::Level;
use super::error::Result;
use super::io::{CarIo, Clock, PingUnit};

/// One observable interaction with the hardware boundary
#[derive(Debug, Clone, PartialEq)]
pub enum IoEvent {
    Write { pin: DigitalPin, level: Level },
    AnalogRead { pin: AnalogPin, value: u16 },
    Ping { trigger: DigitalPin, echo: DigitalPin, unit: PingUnit, value: u16 },
    Sleep { ms: f64 },
}

/// Ordered, shareable record of boundary events
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<IoEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<IoEvent>> {
        match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push(&self, event: IoEvent) {
        self.lock().push(event);
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> Vec<IoEvent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Recorded holds, in order
    pub fn sleeps(&self) -> Vec<f64> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                IoEvent::Sleep { ms } => Some(*ms),
                _ => None,
            })
            .collect()
    }
}

/// Simulated pins and sensors
#[derive(Debug, Default)]
pub struct SimIo {
    log: EventLog,
    digital: HashMap<DigitalPin, Level>,
    analog: HashMap<AnalogPin, u16>,
    distance: u16,
}

impl SimIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Last level written to `pin`, `None` if never written
    pub fn level(&self, pin: DigitalPin) -> Option<Level> {
        self.digital.get(&pin).copied()
    }

    pub fn set_analog(&mut self, pin: AnalogPin, value: u16) {
        self.analog.insert(pin, value);
    }

    /// Value returned by the next pings
    pub fn set_distance(&mut self, value: u16) {
        self.distance = value;
    }
}

impl CarIo for SimIo {
    fn write_digital(&mut self, pin: DigitalPin, level: Level) -> Result<()> {
        debug!("sim write {} = {:?}", pin, level);
        self.digital.insert(pin, level);
        self.log.push(IoEvent::Write { pin, level });
        Ok(())
    }

    fn read_analog(&mut self, pin: AnalogPin) -> Result<u16> {
        let value = self.analog.get(&pin).copied().unwrap_or(0);
        self.log.push(IoEvent::AnalogRead { pin, value });
        Ok(value)
    }

    fn ping(&mut self, trigger: DigitalPin, echo: DigitalPin, unit: PingUnit) -> Result<u16> {
        let value = self.distance;
        self.log.push(IoEvent::Ping {
            trigger,
            echo,
            unit,
            value,
        });
        Ok(value)
    }
}

/// Clock that records holds and advances virtual time instead of sleeping
#[derive(Debug, Default)]
pub struct ManualClock {
    log: EventLog,
    elapsed_ms: f64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: EventLog) -> Self {
        Self {
            log,
            elapsed_ms: 0.0,
        }
    }

    /// Total virtual time spent in positive holds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }
}

impl Clock for ManualClock {
    fn sleep_ms(&mut self, ms: f64) {
        self.log.push(IoEvent::Sleep { ms });
        if ms.is_finite() && ms > 0.0 {
            self.elapsed_ms += ms;
        }
    }
}
