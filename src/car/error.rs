// Error types for the microcar driver and its pin bridge

/// Errors raised by the car driver and the hardware boundary
#[derive(Debug, thiserror::Error)]
pub enum CarError {
    #[error("Unsupported board variant: {0:?}")]
    InvalidVariant(String),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from bridge: {reason}")]
    InvalidResponse { reason: String },

    #[error("Checksum mismatch in bridge response")]
    ChecksumMismatch,

    #[error("Bridge returned error status: 0x{status:02X}")]
    BridgeFault { status: u8 },

    #[error("Timeout waiting for response from bridge")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, CarError>;
