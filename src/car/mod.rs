// Driver for the DeskPi microcar (two-motor differential drive)
//
// Provides:
// - Board pin layout and calibration factors
// - Drive signal encoder (motion intent -> pin levels)
// - Timed open-loop driver and sensor readers
// - Serial pin bridge and an in-memory simulation backend

pub mod board;
pub mod bridge;
pub mod calibration;
mod driver;
pub mod encoder;
mod error;
pub mod io;
pub mod sim;

pub use board::{AnalogPin, BoardLayout, BoardVariant, DigitalPin};
pub use bridge::BridgeBus;
pub use calibration::CalibrationFactors;
pub use driver::{Car, LineSensor};
pub use encoder::{Direction, Level, Motor, TurnDirection};
pub use error::{CarError, Result};
pub use io::{CarIo, Clock, PingUnit, SystemClock};
pub use sim::{EventLog, IoEvent, ManualClock, SimIo};
