use clap::Parser;
use tracing_subscriber::EnvFilter;

use microcar_zenoh_runtime::car::calibration::{
    DEFAULT_ANGLE_TO_TIME_MS, DEFAULT_DISTANCE_TO_TIME_MS, DEFAULT_LINE_THRESHOLD,
};
use microcar_zenoh_runtime::car::CalibrationFactors;
use microcar_zenoh_runtime::config::BRIDGE_PORT;
use microcar_zenoh_runtime::runtime::{self, RuntimeOptions};

/// Zenoh runtime driving a DeskPi microcar
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Serial port of the pin bridge
    #[arg(long, default_value = BRIDGE_PORT)]
    port: String,

    /// Use simulated pins instead of the serial bridge
    #[arg(long)]
    simulate: bool,

    /// Car model
    #[arg(long, default_value = "deskpi_microcar")]
    model: String,

    /// Milliseconds of driving per centimetre
    #[arg(long, default_value_t = DEFAULT_DISTANCE_TO_TIME_MS)]
    distance_factor: f64,

    /// Milliseconds of pivoting per degree
    #[arg(long, default_value_t = DEFAULT_ANGLE_TO_TIME_MS)]
    angle_factor: f64,

    /// Raw analog value above which a line is detected
    #[arg(long, default_value_t = DEFAULT_LINE_THRESHOLD)]
    line_threshold: f64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();
    let options = RuntimeOptions {
        port: args.port,
        simulate: args.simulate,
        model: args.model,
        calibration: CalibrationFactors {
            distance_to_time_ms: args.distance_factor,
            angle_to_time_ms: args.angle_factor,
            line_threshold: args.line_threshold,
        },
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
