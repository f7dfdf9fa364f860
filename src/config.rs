// Topics, rates and bridge defaults

// Sensor/health publishing frequency
pub const STATUS_HZ: u64 = 10;

// Zenoh topics
pub const TOPIC_CMD: &str = "microcar/cmd"; // commands
pub const TOPIC_SENSORS: &str = "microcar/state/sensors"; // sensor readings
pub const TOPIC_HEALTH: &str = "microcar/state/health"; // health status

// Serial port of the micro:bit running the pin bridge firmware
pub const BRIDGE_PORT: &str = "/dev/ttyACM0";
