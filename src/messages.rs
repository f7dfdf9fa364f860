// Message types exchanged with the runtime

use serde::{Deserialize, Serialize};

use crate::car::{Direction, Motor, TurnDirection};

// Command from teleop/scripts -> runtime
// Tagged by "cmd", eg. {"cmd":"move_distance","direction":"forward","cm":10}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum CarCommand {
    SelectBoard { model: String },
    MoveDuration { direction: Direction, ms: f64 },
    MoveDistance { direction: Direction, cm: f64 },
    TurnDuration { direction: TurnDirection, ms: f64 },
    TurnAngle { direction: TurnDirection, degrees: f64 },
    MoveMotor { motor: Motor, direction: Direction },
    Stop,
    SetDistanceFactor { value: f64 },
    SetAngleFactor { value: f64 },
    SetLineThreshold { value: f64 },
}

/// Sensor snapshot published by runtime
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CarStatus {
    pub line_left: bool,
    pub line_right: bool,
    pub distance_cm: u16,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    BridgeFault,
}
