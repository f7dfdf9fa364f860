// Open-loop calibration factors
//
// Converts physical units into drive durations with a plain linear model.
// Nothing here is validated: zero or negative factors give zero-length moves.

use serde::{Deserialize, Serialize};

/// Default milliseconds of driving per centimetre travelled
pub const DEFAULT_DISTANCE_TO_TIME_MS: f64 = 85.0;

/// Default milliseconds of pivoting per degree turned
pub const DEFAULT_ANGLE_TO_TIME_MS: f64 = 6.0;

/// Default raw analog value above which a line is detected
/// (black tape on a white surface)
pub const DEFAULT_LINE_THRESHOLD: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFactors {
    pub distance_to_time_ms: f64,
    pub angle_to_time_ms: f64,
    pub line_threshold: f64,
}

impl Default for CalibrationFactors {
    fn default() -> Self {
        Self {
            distance_to_time_ms: DEFAULT_DISTANCE_TO_TIME_MS,
            angle_to_time_ms: DEFAULT_ANGLE_TO_TIME_MS,
            line_threshold: DEFAULT_LINE_THRESHOLD,
        }
    }
}

impl CalibrationFactors {
    pub fn set_distance_factor(&mut self, value: f64) {
        self.distance_to_time_ms = value;
    }

    pub fn set_angle_factor(&mut self, value: f64) {
        self.angle_to_time_ms = value;
    }

    pub fn set_line_threshold(&mut self, value: f64) {
        self.line_threshold = value;
    }

    /// Drive time needed to cover `cm` centimetres
    pub fn move_time_ms(&self, cm: f64) -> f64 {
        cm * self.distance_to_time_ms
    }

    /// Pivot time needed to turn `degrees`
    pub fn turn_time_ms(&self, degrees: f64) -> f64 {
        degrees * self.angle_to_time_ms
    }

    /// Strictly above the threshold counts as a line
    pub fn detects_line(&self, raw: u16) -> bool {
        f64::from(raw) > self.line_threshold
    }
}
