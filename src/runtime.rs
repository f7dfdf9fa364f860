// Command runtime: zenoh commands in, sensor readings and health out
//
// The car sits behind one mutex. Each command runs to completion (including the
// hold and stop of a timed move) on a blocking thread while holding the lock, so
// commands and sensor polls never interleave.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::car::{
    self, BridgeBus, CalibrationFactors, Car, CarIo, Clock, LineSensor, SimIo, SystemClock,
};
use crate::config::{STATUS_HZ, TOPIC_CMD, TOPIC_HEALTH, TOPIC_SENSORS};
use crate::messages::{CarCommand, CarStatus, RuntimeHealth};

pub type SharedCar = Arc<Mutex<Car<Box<dyn CarIo + Send>, SystemClock>>>;

/// Startup options, usually filled from the command line
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub port: String,
    pub simulate: bool,
    pub model: String,
    pub calibration: CalibrationFactors,
}

/// Apply one command to the car
pub fn execute<IO: CarIo, C: Clock>(car: &mut Car<IO, C>, cmd: &CarCommand) -> car::Result<()> {
    match *cmd {
        CarCommand::SelectBoard { ref model } => car.select_board_named(model).map(|_| ()),
        CarCommand::MoveDuration { direction, ms } => car.move_duration(direction, ms),
        CarCommand::MoveDistance { direction, cm } => car.move_distance(direction, cm),
        CarCommand::TurnDuration { direction, ms } => car.turn_duration(direction, ms),
        CarCommand::TurnAngle { direction, degrees } => car.turn_angle(direction, degrees),
        CarCommand::MoveMotor { motor, direction } => car.move_motor(motor, direction),
        CarCommand::Stop => car.stop(),
        CarCommand::SetDistanceFactor { value } => {
            car.set_distance_factor(value);
            Ok(())
        }
        CarCommand::SetAngleFactor { value } => {
            car.set_angle_factor(value);
            Ok(())
        }
        CarCommand::SetLineThreshold { value } => {
            car.set_line_threshold(value);
            Ok(())
        }
    }
}

/// Read both line sensors and the ultrasonic distance
pub fn read_status<IO: CarIo, C: Clock>(car: &mut Car<IO, C>) -> car::Result<CarStatus> {
    Ok(CarStatus {
        line_left: car.line_detected(LineSensor::Left)?,
        line_right: car.line_detected(LineSensor::Right)?,
        distance_cm: car.distance_cm()?,
    })
}

/// Tracks health across command and sensor results
///
/// Commands and sensor polls fault independently: a good sensor poll does not
/// clear a failed command, only a later successful command does.
pub struct Runtime {
    command_health: RuntimeHealth,
    sensor_health: RuntimeHealth,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            command_health: RuntimeHealth::Ok,
            sensor_health: RuntimeHealth::Ok,
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        if self.command_health == RuntimeHealth::Ok && self.sensor_health == RuntimeHealth::Ok {
            RuntimeHealth::Ok
        } else {
            RuntimeHealth::BridgeFault
        }
    }

    /// Record the outcome of a command
    pub fn on_command<T>(&mut self, result: car::Result<T>) -> Option<T> {
        record(&mut self.command_health, "Command", result)
    }

    /// Record the outcome of a sensor poll
    pub fn on_sensor_poll<T>(&mut self, result: car::Result<T>) -> Option<T> {
        record(&mut self.sensor_health, "Sensor poll", result)
    }

    /// The command task died before reporting a result
    pub fn on_command_aborted(&mut self) {
        self.command_health = RuntimeHealth::BridgeFault;
    }
}

fn record<T>(health: &mut RuntimeHealth, context: &str, result: car::Result<T>) -> Option<T> {
    match result {
        Ok(value) => {
            *health = RuntimeHealth::Ok;
            Some(value)
        }
        // Already logged by the driver; bad input leaves the hardware fine
        Err(car::CarError::InvalidVariant(_)) => None,
        Err(e) => {
            if *health != RuntimeHealth::BridgeFault {
                warn!("{} failed: {}", context, e);
            }
            *health = RuntimeHealth::BridgeFault;
            None
        }
    }
}

fn lock(car: &SharedCar) -> MutexGuard<'_, Car<Box<dyn CarIo + Send>, SystemClock>> {
    match car.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn open_car(options: &RuntimeOptions) -> car::Result<Car<Box<dyn CarIo + Send>, SystemClock>> {
    let io: Box<dyn CarIo + Send> = if options.simulate {
        info!("Using simulated pins");
        Box::new(SimIo::new())
    } else {
        info!("Opening pin bridge on {}", options.port);
        Box::new(BridgeBus::open(&options.port)?)
    };

    let mut car = Car::with_calibration(io, SystemClock, options.calibration);
    // Unknown model names are logged and the default layout is kept
    let _ = car.select_board_named(&options.model);
    car.stop()?;
    Ok(car)
}

pub async fn run(options: RuntimeOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let car: SharedCar = Arc::new(Mutex::new(open_car(&options)?));

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD).await?;
    let pub_sensors = session.declare_publisher(TOPIC_SENSORS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new();
    let mut tick = interval(Duration::from_millis(1000 / STATUS_HZ));
    // A long timed move must not be followed by a burst of polls
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Listen once so a Ctrl-C during a timed move is not lost
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Runtime started: {}Hz status", STATUS_HZ);
    info!("Subscribed to: {}", TOPIC_CMD);
    info!("Publishing to: {}, {}", TOPIC_SENSORS, TOPIC_HEALTH);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut ctrl_c => {
                info!("Shutting down");
                break;
            }
        }

        // 1. Run all pending commands in arrival order
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            let cmd = match serde_json::from_slice::<CarCommand>(&payload) {
                Ok(cmd) => cmd,
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                    continue;
                }
            };

            info!("Received command: {:?}", &cmd);
            let shared = Arc::clone(&car);
            let task = tokio::task::spawn_blocking(move || {
                let mut car = lock(&shared);
                execute(&mut *car, &cmd)
            });
            match task.await {
                Ok(result) => {
                    runtime.on_command(result);
                }
                Err(e) => {
                    warn!("Command task aborted: {}", e);
                    runtime.on_command_aborted();
                    // The move may have died between drive and stop
                    if let Err(e) = lock(&car).stop() {
                        warn!("Failed to stop motors: {}", e);
                    }
                }
            }
        }

        // 2. Poll sensors
        let shared = Arc::clone(&car);
        let status = tokio::task::spawn_blocking(move || {
            let mut car = lock(&shared);
            read_status(&mut *car)
        })
        .await?;
        if let Some(status) = runtime.on_sensor_poll(status) {
            pub_sensors.put(serde_json::to_string(&status)?).await?;
        }

        // 3. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }

    lock(&car).stop()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::{
        AnalogPin, BoardVariant, DigitalPin, Direction, EventLog, Level, ManualClock, Motor,
        TurnDirection,
    };

    fn sim_car() -> (Car<SimIo, ManualClock>, EventLog) {
        let log = EventLog::new();
        let car = Car::new(
            SimIo::with_log(log.clone()),
            ManualClock::with_log(log.clone()),
        );
        (car, log)
    }

    #[test]
    fn test_execute_timed_commands() {
        let (mut car, log) = sim_car();
        let script = [
            CarCommand::SetDistanceFactor { value: 100.0 },
            CarCommand::MoveDistance {
                direction: Direction::Forward,
                cm: 2.0,
            },
            CarCommand::TurnAngle {
                direction: TurnDirection::Right,
                degrees: 90.0,
            },
            CarCommand::MoveDuration {
                direction: Direction::Backward,
                ms: 300.0,
            },
            CarCommand::SetAngleFactor { value: 1.0 },
            CarCommand::TurnDuration {
                direction: TurnDirection::Left,
                ms: 75.0,
            },
        ];
        for cmd in &script {
            execute(&mut car, cmd).unwrap();
        }
        assert_eq!(log.sleeps(), vec![200.0, 540.0, 300.0, 75.0]);
        assert_eq!(car.calibration().angle_to_time_ms, 1.0);
    }

    #[test]
    fn test_execute_continuous_drive_then_stop() {
        // Drive both motors, then stop, as a script would
        let (mut car, log) = sim_car();
        execute(
            &mut car,
            &CarCommand::MoveMotor {
                motor: Motor::Both,
                direction: Direction::Forward,
            },
        )
        .unwrap();
        assert_eq!(car.io().level(DigitalPin(16)), Some(Level::High));

        execute(&mut car, &CarCommand::Stop).unwrap();
        assert_eq!(car.io().level(DigitalPin(16)), Some(Level::Low));
        assert!(log.sleeps().is_empty());
    }

    #[test]
    fn test_execute_select_board() {
        let (mut car, _log) = sim_car();
        let before = *car.layout();
        assert!(
            execute(
                &mut car,
                &CarCommand::SelectBoard {
                    model: "other".to_string()
                }
            )
            .is_err()
        );
        assert_eq!(*car.layout(), before);
        assert!(
            execute(
                &mut car,
                &CarCommand::SelectBoard {
                    model: "deskpi_microcar".to_string()
                }
            )
            .is_ok()
        );
    }

    #[test]
    fn test_read_status() {
        let (mut car, _log) = sim_car();
        execute(&mut car, &CarCommand::SetLineThreshold { value: 500.0 }).unwrap();
        car.io_mut().set_analog(AnalogPin(1), 600);
        car.io_mut().set_analog(AnalogPin(2), 500);
        car.io_mut().set_distance(18);

        assert_eq!(
            read_status(&mut car).unwrap(),
            CarStatus {
                line_left: true,
                line_right: false,
                distance_cm: 18,
            }
        );
    }

    #[test]
    fn test_health_tracking() {
        let mut runtime = Runtime::new();
        assert_eq!(runtime.health(), RuntimeHealth::Ok);

        let invalid: car::Result<()> = Err(car::CarError::InvalidVariant("x".to_string()));
        assert_eq!(runtime.on_command(invalid), None);
        assert_eq!(runtime.health(), RuntimeHealth::Ok);

        let fault: car::Result<()> = Err(car::CarError::Timeout);
        assert_eq!(runtime.on_command(fault), None);
        assert_eq!(runtime.health(), RuntimeHealth::BridgeFault);

        assert_eq!(runtime.on_command(Ok(7)), Some(7));
        assert_eq!(runtime.health(), RuntimeHealth::Ok);

        runtime.on_command_aborted();
        assert_eq!(runtime.health(), RuntimeHealth::BridgeFault);
    }

    #[test]
    fn test_failed_command_survives_good_sensor_poll() {
        let (mut car, _log) = sim_car();
        let mut runtime = Runtime::new();

        runtime.on_command::<()>(Err(car::CarError::ChecksumMismatch));
        let status = runtime.on_sensor_poll(read_status(&mut car));
        assert!(status.is_some());
        assert_eq!(runtime.health(), RuntimeHealth::BridgeFault);

        runtime.on_command(execute(&mut car, &CarCommand::Stop));
        assert_eq!(runtime.health(), RuntimeHealth::Ok);
    }

    #[test]
    fn test_failed_sensor_poll_survives_good_command() {
        let (mut car, _log) = sim_car();
        let mut runtime = Runtime::new();

        runtime.on_sensor_poll::<CarStatus>(Err(car::CarError::Timeout));
        runtime.on_command(execute(&mut car, &CarCommand::Stop));
        assert_eq!(runtime.health(), RuntimeHealth::BridgeFault);

        runtime.on_sensor_poll(read_status(&mut car));
        assert_eq!(runtime.health(), RuntimeHealth::Ok);
    }

    #[test]
    fn test_huge_move_completes_with_stop() {
        let (mut car, log) = sim_car();
        execute(
            &mut car,
            &CarCommand::MoveDistance {
                direction: Direction::Forward,
                cm: 1e300,
            },
        )
        .unwrap();
        assert_eq!(log.sleeps(), vec![1e300 * 85.0]);
        assert_eq!(car.io().level(DigitalPin(14)), Some(Level::Low));
        assert_eq!(car.io().level(DigitalPin(16)), Some(Level::Low));
    }

    #[test]
    fn test_open_simulated_car() {
        let options = RuntimeOptions {
            port: String::new(),
            simulate: true,
            model: "not_a_car".to_string(),
            calibration: CalibrationFactors::default(),
        };
        let car = open_car(&options).unwrap();
        assert_eq!(car.model(), BoardVariant::DeskpiMicrocar);
    }
}
