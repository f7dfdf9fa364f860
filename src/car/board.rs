// Board variants and their pin layouts
//
// Only the DeskPi microcar is supported. Pin numbers follow the micro:bit
// edge connector naming (P0..P20).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::CarError;

/// Digital pin on the edge connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DigitalPin(pub u8);

/// Analog-capable pin on the edge connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalogPin(pub u8);

impl fmt::Display for DigitalPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl fmt::Display for AnalogPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Supported car models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardVariant {
    #[default]
    DeskpiMicrocar,
}

impl BoardVariant {
    pub fn name(&self) -> &'static str {
        match self {
            BoardVariant::DeskpiMicrocar => "deskpi_microcar",
        }
    }

    /// Resolve the pin layout wired on this model
    pub fn layout(&self) -> BoardLayout {
        match self {
            BoardVariant::DeskpiMicrocar => BoardLayout {
                left_pos: DigitalPin(13),
                left_neg: DigitalPin(14),
                right_pos: DigitalPin(15),
                right_neg: DigitalPin(16),
                ultrasonic_trigger: DigitalPin(12),
                ultrasonic_echo: DigitalPin(9),
                line_left: AnalogPin(1),
                line_right: AnalogPin(2),
            },
        }
    }
}

impl fmt::Display for BoardVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoardVariant {
    type Err = CarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "deskpi_microcar" => Ok(BoardVariant::DeskpiMicrocar),
            other => Err(CarError::InvalidVariant(other.to_string())),
        }
    }
}

/// Resolved pin assignments for one board variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLayout {
    pub left_pos: DigitalPin,
    pub left_neg: DigitalPin,
    pub right_pos: DigitalPin,
    pub right_neg: DigitalPin,
    pub ultrasonic_trigger: DigitalPin,
    pub ultrasonic_echo: DigitalPin,
    pub line_left: AnalogPin,
    pub line_right: AnalogPin,
}

impl BoardLayout {
    /// Motor pins as [left+, left-, right+, right-]
    pub fn motor_pins(&self) -> [DigitalPin; 4] {
        [self.left_pos, self.left_neg, self.right_pos, self.right_neg]
    }
}
