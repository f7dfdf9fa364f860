// High-level driver for the microcar
//
// Combines the board layout, calibration factors and drive signal encoder to
// provide timed moves, turns and sensor readings on top of a CarIo backend.

use tracing::{debug, info, warn};

use super::board::{BoardLayout, BoardVariant};
use super::calibration::CalibrationFactors;
use super::encoder::{self, Direction, Motor, PinLevels, TurnDirection};
use super::error::Result;
use super::io::{CarIo, Clock, PingUnit};

/// Line sensor selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSensor {
    Left,
    Right,
}

/// Open-loop driver for one car
///
/// Every operation borrows the car mutably, so a timed move always completes
/// its stop phase before the next call can start.
pub struct Car<IO: CarIo, C: Clock> {
    io: IO,
    clock: C,
    model: BoardVariant,
    layout: BoardLayout,
    calibration: CalibrationFactors,
}

impl<IO: CarIo, C: Clock> Car<IO, C> {
    /// Create a driver for the default board with default calibration
    pub fn new(io: IO, clock: C) -> Self {
        Self::with_calibration(io, clock, CalibrationFactors::default())
    }

    pub fn with_calibration(io: IO, clock: C, calibration: CalibrationFactors) -> Self {
        let model = BoardVariant::default();
        info!("Car model {} selected", model);
        Self {
            io,
            clock,
            model,
            layout: model.layout(),
            calibration,
        }
    }

    // === Board selection ===

    /// Force the car model, which determines the pins used
    pub fn select_board(&mut self, variant: BoardVariant) -> &BoardLayout {
        self.model = variant;
        self.layout = variant.layout();
        info!("Car model {} selected: {:?}", variant, self.layout);
        &self.layout
    }

    /// Select a model by name. Unknown names leave the current layout in place.
    pub fn select_board_named(&mut self, name: &str) -> Result<&BoardLayout> {
        match name.parse::<BoardVariant>() {
            Ok(variant) => Ok(self.select_board(variant)),
            Err(e) => {
                warn!("{}, keeping {}", e, self.model);
                Err(e)
            }
        }
    }

    pub fn model(&self) -> BoardVariant {
        self.model
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    // === Calibration ===

    pub fn calibration(&self) -> &CalibrationFactors {
        &self.calibration
    }

    /// Milliseconds of driving per centimetre
    pub fn set_distance_factor(&mut self, value: f64) {
        debug!("Distance factor set to {} ms/cm", value);
        self.calibration.set_distance_factor(value);
    }

    /// Milliseconds of pivoting per degree
    pub fn set_angle_factor(&mut self, value: f64) {
        debug!("Angle factor set to {} ms/deg", value);
        self.calibration.set_angle_factor(value);
    }

    pub fn set_line_threshold(&mut self, value: f64) {
        debug!("Line threshold set to {}", value);
        self.calibration.set_line_threshold(value);
    }

    // === Motion ===

    /// Drive forward or backward for `ms` milliseconds, then stop
    pub fn move_duration(&mut self, direction: Direction, ms: f64) -> Result<()> {
        info!("Moving {:?} for {} ms", direction, ms);
        self.drive_for(encoder::translate(direction), ms)
    }

    /// Drive forward or backward for `cm` centimetres, then stop
    pub fn move_distance(&mut self, direction: Direction, cm: f64) -> Result<()> {
        let ms = self.calibration.move_time_ms(cm);
        info!("Moving {:?} for {} cm ({} ms)", direction, cm, ms);
        self.drive_for(encoder::translate(direction), ms)
    }

    /// Pivot left or right for `ms` milliseconds, then stop
    pub fn turn_duration(&mut self, direction: TurnDirection, ms: f64) -> Result<()> {
        info!("Turning {:?} for {} ms", direction, ms);
        self.drive_for(encoder::turn(direction), ms)
    }

    /// Pivot left or right by `degrees`, then stop
    pub fn turn_angle(&mut self, direction: TurnDirection, degrees: f64) -> Result<()> {
        let ms = self.calibration.turn_time_ms(degrees);
        info!("Turning {:?} for {} degrees ({} ms)", direction, degrees, ms);
        self.drive_for(encoder::turn(direction), ms)
    }

    /// Start the selected motor(s) and return immediately.
    ///
    /// There is no stop phase: the motor keeps running until `stop` or another
    /// command overwrites its pins.
    pub fn move_motor(&mut self, motor: Motor, direction: Direction) -> Result<()> {
        info!("Running {:?} motor(s) {:?}", motor, direction);
        self.apply(encoder::single(motor, direction))
    }

    /// Drive all four motor pins low
    pub fn stop(&mut self) -> Result<()> {
        debug!("Stopping motors");
        self.apply(encoder::stopped())
    }

    /// Set levels, hold, then zero every motor pin
    fn drive_for(&mut self, levels: PinLevels, ms: f64) -> Result<()> {
        self.apply(levels)?;
        self.clock.sleep_ms(ms);
        self.stop()
    }

    fn apply(&mut self, levels: PinLevels) -> Result<()> {
        for (pin, level) in levels.pin_writes(&self.layout) {
            self.io.write_digital(pin, level)?;
        }
        Ok(())
    }

    // === Sensors ===

    /// True if the raw reading is strictly above the line threshold
    pub fn line_detected(&mut self, sensor: LineSensor) -> Result<bool> {
        let pin = match sensor {
            LineSensor::Left => self.layout.line_left,
            LineSensor::Right => self.layout.line_right,
        };
        let raw = self.io.read_analog(pin)?;
        let detected = self.calibration.detects_line(raw);
        debug!("Line sensor {:?}: raw={} detected={}", sensor, raw, detected);
        Ok(detected)
    }

    /// Ultrasonic distance in centimetres, passed through unfiltered
    pub fn distance_cm(&mut self) -> Result<u16> {
        self.io.ping(
            self.layout.ultrasonic_trigger,
            self.layout.ultrasonic_echo,
            PingUnit::Centimeters,
        )
    }

    // === Accessors ===

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<IO: CarIo, C: Clock> Drop for Car<IO, C> {
    fn drop(&mut self) {
        // Never leave the motors running once the driver is gone
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::board::{AnalogPin, DigitalPin};
    use crate::car::encoder::Level;
    use crate::car::sim::{EventLog, IoEvent, ManualClock, SimIo};

    fn sim_car() -> (Car<SimIo, ManualClock>, EventLog) {
        let log = EventLog::new();
        let car = Car::new(
            SimIo::with_log(log.clone()),
            ManualClock::with_log(log.clone()),
        );
        (car, log)
    }

    fn write(pin: u8, level: Level) -> IoEvent {
        IoEvent::Write {
            pin: DigitalPin(pin),
            level,
        }
    }

    fn all_low() -> Vec<IoEvent> {
        vec![
            write(13, Level::Low),
            write(14, Level::Low),
            write(15, Level::Low),
            write(16, Level::Low),
        ]
    }

    #[test]
    fn test_move_duration_drives_then_stops() {
        let (mut car, log) = sim_car();
        car.move_duration(Direction::Forward, 1000.0).unwrap();

        let mut expected = vec![
            write(13, Level::Low),
            write(14, Level::High),
            write(15, Level::Low),
            write(16, Level::High),
            IoEvent::Sleep { ms: 1000.0 },
        ];
        expected.extend(all_low());
        assert_eq!(log.snapshot(), expected);
        assert_eq!(car.clock().elapsed_ms(), 1000.0);
    }

    #[test]
    fn test_move_backward_uses_swapped_polarity_on_both_motors() {
        let (mut car, log) = sim_car();
        car.move_duration(Direction::Backward, 250.0).unwrap();

        let events = log.snapshot();
        assert_eq!(
            &events[..4],
            &[
                write(13, Level::High),
                write(14, Level::Low),
                write(15, Level::High),
                write(16, Level::Low),
            ]
        );
        assert_eq!(log.sleeps(), vec![250.0]);
        assert_eq!(&events[5..], all_low().as_slice());
    }

    #[test]
    fn test_move_distance_matches_equivalent_duration() {
        let (mut by_distance, distance_log) = sim_car();
        by_distance.move_distance(Direction::Forward, 10.0).unwrap();

        let (mut by_duration, duration_log) = sim_car();
        by_duration.move_duration(Direction::Forward, 850.0).unwrap();

        assert_eq!(distance_log.sleeps(), vec![850.0]);
        assert_eq!(distance_log.snapshot(), duration_log.snapshot());
    }

    #[test]
    fn test_turn_angle_matches_equivalent_duration() {
        let (mut by_angle, angle_log) = sim_car();
        by_angle.turn_angle(TurnDirection::Left, 90.0).unwrap();

        let (mut by_duration, duration_log) = sim_car();
        by_duration
            .turn_duration(TurnDirection::Left, 540.0)
            .unwrap();

        assert_eq!(angle_log.sleeps(), vec![540.0]);
        assert_eq!(angle_log.snapshot(), duration_log.snapshot());

        // Left motor backward, right motor forward
        assert_eq!(
            &angle_log.snapshot()[..4],
            &[
                write(13, Level::High),
                write(14, Level::Low),
                write(15, Level::Low),
                write(16, Level::High),
            ]
        );
    }

    #[test]
    fn test_turn_right_mirrors_left() {
        let (mut car, log) = sim_car();
        car.turn_duration(TurnDirection::Right, 100.0).unwrap();
        assert_eq!(
            &log.snapshot()[..4],
            &[
                write(13, Level::Low),
                write(14, Level::High),
                write(15, Level::High),
                write(16, Level::Low),
            ]
        );
    }

    #[test]
    fn test_calibration_changes_timing() {
        let (mut car, log) = sim_car();
        car.set_distance_factor(50.0);
        car.set_angle_factor(2.5);
        car.move_distance(Direction::Backward, 3.0).unwrap();
        car.turn_angle(TurnDirection::Right, 45.0).unwrap();
        assert_eq!(log.sleeps(), vec![150.0, 112.5]);
    }

    #[test]
    fn test_degenerate_magnitudes_are_accepted() {
        let (mut car, log) = sim_car();
        car.move_distance(Direction::Forward, -5.0).unwrap();
        car.turn_duration(TurnDirection::Left, 0.0).unwrap();
        assert_eq!(log.sleeps(), vec![-425.0, 0.0]);
        assert_eq!(car.clock().elapsed_ms(), 0.0);
        // Still ends stopped
        assert_eq!(car.io().level(DigitalPin(14)), Some(Level::Low));
        assert_eq!(car.io().level(DigitalPin(16)), Some(Level::Low));
    }

    #[test]
    fn test_move_motor_is_instantaneous_and_selective() {
        let (mut car, log) = sim_car();
        car.move_motor(Motor::Left, Direction::Forward).unwrap();

        assert_eq!(
            log.snapshot(),
            vec![write(13, Level::Low), write(14, Level::High)]
        );
        assert!(log.sleeps().is_empty());
        assert_eq!(car.io().level(DigitalPin(15)), None);
        assert_eq!(car.io().level(DigitalPin(16)), None);
    }

    #[test]
    fn test_move_motor_keeps_other_motor_running() {
        let (mut car, _log) = sim_car();
        car.move_motor(Motor::Right, Direction::Backward).unwrap();
        car.move_motor(Motor::Left, Direction::Forward).unwrap();

        assert_eq!(car.io().level(DigitalPin(13)), Some(Level::Low));
        assert_eq!(car.io().level(DigitalPin(14)), Some(Level::High));
        assert_eq!(car.io().level(DigitalPin(15)), Some(Level::High));
        assert_eq!(car.io().level(DigitalPin(16)), Some(Level::Low));
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut car, log) = sim_car();
        car.move_motor(Motor::Both, Direction::Forward).unwrap();
        log.clear();

        car.stop().unwrap();
        let first = log.snapshot();
        log.clear();
        car.stop().unwrap();
        let second = log.snapshot();

        assert_eq!(first, all_low());
        assert_eq!(first, second);
    }

    #[test]
    fn test_line_detection_threshold_boundary() {
        let (mut car, _log) = sim_car();
        car.io_mut().set_analog(AnalogPin(1), 300);
        car.io_mut().set_analog(AnalogPin(2), 301);

        assert!(!car.line_detected(LineSensor::Left).unwrap());
        assert!(car.line_detected(LineSensor::Right).unwrap());

        car.set_line_threshold(299.0);
        assert!(car.line_detected(LineSensor::Left).unwrap());

        car.set_line_threshold(301.0);
        assert!(!car.line_detected(LineSensor::Right).unwrap());
    }

    #[test]
    fn test_distance_passes_through() {
        let (mut car, log) = sim_car();
        car.io_mut().set_distance(0);
        assert_eq!(car.distance_cm().unwrap(), 0);

        car.io_mut().set_distance(37);
        assert_eq!(car.distance_cm().unwrap(), 37);
        assert_eq!(
            log.snapshot().last(),
            Some(&IoEvent::Ping {
                trigger: DigitalPin(12),
                echo: DigitalPin(9),
                unit: PingUnit::Centimeters,
                value: 37,
            })
        );
    }

    #[test]
    fn test_invalid_board_keeps_layout() {
        let (mut car, _log) = sim_car();
        let before = *car.select_board(BoardVariant::DeskpiMicrocar);

        assert!(car.select_board_named("unknown_car").is_err());
        assert_eq!(*car.layout(), before);
        assert_eq!(car.model(), BoardVariant::DeskpiMicrocar);

        assert!(car.select_board_named("deskpi_microcar").is_ok());
        assert_eq!(*car.layout(), before);
    }

    #[test]
    fn test_cars_are_independent() {
        let (mut a, log_a) = sim_car();
        let (b, log_b) = sim_car();
        a.set_distance_factor(10.0);
        a.move_distance(Direction::Forward, 1.0).unwrap();

        assert_eq!(log_a.sleeps(), vec![10.0]);
        assert!(log_b.snapshot().is_empty());
        assert_eq!(b.calibration().distance_to_time_ms, 85.0);
    }

    #[test]
    fn test_drop_stops_motors() {
        let (mut car, log) = sim_car();
        car.move_motor(Motor::Both, Direction::Backward).unwrap();
        log.clear();
        drop(car);
        assert_eq!(log.snapshot(), all_low());
    }
}
