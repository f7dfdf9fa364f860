// Drive signal encoder
//
// Maps motion intents to the level of each motor terminal. Polarity is fixed
// by the car's wiring: a motor spins forward with its + pin low and its - pin high.

use serde::{Deserialize, Serialize};

use super::board::{BoardLayout, DigitalPin};

/// Straight-line direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

/// Pivot direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDirection {
    Left,
    Right,
}

/// Motor selection for single-motor drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motor {
    Left,
    Right,
    Both,
}

/// Digital pin level
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    #[default]
    Low = 0,
    High = 1,
}

/// Levels for the (+, -) terminals of one motor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorLevels {
    pub pos: Level,
    pub neg: Level,
}

impl MotorLevels {
    pub const OFF: MotorLevels = MotorLevels {
        pos: Level::Low,
        neg: Level::Low,
    };

    pub fn new(pos: Level, neg: Level) -> Self {
        Self { pos, neg }
    }

    /// Terminal levels spinning a motor in `direction`
    pub fn spinning(direction: Direction) -> Self {
        match direction {
            Direction::Forward => Self::new(Level::Low, Level::High),
            Direction::Backward => Self::new(Level::High, Level::Low),
        }
    }
}

/// Requested levels for both motors. `None` leaves that motor's pins as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinLevels {
    pub left: Option<MotorLevels>,
    pub right: Option<MotorLevels>,
}

impl PinLevels {
    fn both(left: MotorLevels, right: MotorLevels) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
        }
    }

    /// Resolve against a layout into (pin, level) writes, left motor first
    pub fn pin_writes(&self, layout: &BoardLayout) -> Vec<(DigitalPin, Level)> {
        let mut writes = Vec::with_capacity(4);
        if let Some(left) = self.left {
            writes.push((layout.left_pos, left.pos));
            writes.push((layout.left_neg, left.neg));
        }
        if let Some(right) = self.right {
            writes.push((layout.right_pos, right.pos));
            writes.push((layout.right_neg, right.neg));
        }
        writes
    }
}

/// Both motors spinning the same way
pub fn translate(direction: Direction) -> PinLevels {
    let levels = MotorLevels::spinning(direction);
    PinLevels::both(levels, levels)
}

/// Motors spinning opposite ways, pivoting about the centre of the car
pub fn turn(direction: TurnDirection) -> PinLevels {
    match direction {
        TurnDirection::Left => PinLevels::both(
            MotorLevels::spinning(Direction::Backward),
            MotorLevels::spinning(Direction::Forward),
        ),
        TurnDirection::Right => PinLevels::both(
            MotorLevels::spinning(Direction::Forward),
            MotorLevels::spinning(Direction::Backward),
        ),
    }
}

/// Translate polarity on the selected motor(s) only
pub fn single(motor: Motor, direction: Direction) -> PinLevels {
    let levels = MotorLevels::spinning(direction);
    match motor {
        Motor::Left => PinLevels {
            left: Some(levels),
            right: None,
        },
        Motor::Right => PinLevels {
            left: None,
            right: Some(levels),
        },
        Motor::Both => PinLevels::both(levels, levels),
    }
}

/// All four terminals low
pub fn stopped() -> PinLevels {
    PinLevels::both(MotorLevels::OFF, MotorLevels::OFF)
}
