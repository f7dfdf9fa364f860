// Keyboard teleop: W/S move, A/D turn, SPACE stop, R/F step size, Q quit
//
// Each key press publishes one timed command; the car stops on its own
// once the move completes.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::info;

use microcar_zenoh_runtime::car::{Direction, TurnDirection};
use microcar_zenoh_runtime::config::TOPIC_CMD;
use microcar_zenoh_runtime::messages::CarCommand;

const STEPS_CM: [f64; 3] = [2.0, 5.0, 10.0];
const STEPS_DEG: [f64; 3] = [15.0, 45.0, 90.0];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD).await?;

    info!("Controls: W/S=move, A/D=turn, SPACE=stop, R/F=step, Q=quit");
    print_step(0);

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut step_idx: usize = 0;

    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let cmd = match code {
            KeyCode::Char('w') => CarCommand::MoveDistance {
                direction: Direction::Forward,
                cm: STEPS_CM[step_idx],
            },
            KeyCode::Char('s') => CarCommand::MoveDistance {
                direction: Direction::Backward,
                cm: STEPS_CM[step_idx],
            },
            KeyCode::Char('a') => CarCommand::TurnAngle {
                direction: TurnDirection::Left,
                degrees: STEPS_DEG[step_idx],
            },
            KeyCode::Char('d') => CarCommand::TurnAngle {
                direction: TurnDirection::Right,
                degrees: STEPS_DEG[step_idx],
            },
            KeyCode::Char(' ') => CarCommand::Stop,

            // Step size
            KeyCode::Char('r') => {
                step_idx = (step_idx + 1).min(2);
                print_step(step_idx);
                continue;
            }
            KeyCode::Char('f') => {
                step_idx = step_idx.saturating_sub(1);
                print_step(step_idx);
                continue;
            }

            KeyCode::Char('q') | KeyCode::Esc => break,

            _ => continue,
        };

        info!("Sending {:?}", cmd);
        publisher.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}

fn print_step(idx: usize) {
    info!("Step: {} cm / {} deg", STEPS_CM[idx], STEPS_DEG[idx]);
}
