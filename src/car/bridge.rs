// Serial pin bridge protocol
//
// The micro:bit on the car runs a small bridge firmware that executes pin
// operations on behalf of the host.
// Request:  [0xFF, 0xFF, Length, Instruction, Params..., Checksum]
// Response: [0xFF, 0xFF, Length, Status, Params..., Checksum]
// Length counts the instruction/status byte, params and checksum.

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

use super::board::{AnalogPin, DigitalPin};
use super::encoder::Level;
use super::error::{CarError, Result};
use super::io::{CarIo, PingUnit};

pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

const HEADER: [u8; 2] = [0xFF, 0xFF];

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    DigitalWrite = 0x01,
    AnalogRead = 0x02,
    Ping = 0x03,
}

/// Pin bridge reached over a serial link
pub struct BridgeBus<P = Box<dyn SerialPort>> {
    port: P,
}

impl BridgeBus {
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }
}

impl<P: Read + Write> BridgeBus<P> {
    /// Wrap an already opened byte stream
    pub fn from_port(port: P) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    fn build_packet(instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8;
        let mut packet = Vec::with_capacity(5 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);

        let checksum = Self::checksum(&packet[2..]);
        packet.push(checksum);

        packet
    }

    /// Check a frame without its header, `[LEN, STATUS, PARAMS..., CHECKSUM]`,
    /// and return the params
    fn decode_frame(frame: &[u8]) -> Result<Vec<u8>> {
        let Some((&checksum, body)) = frame.split_last() else {
            return Err(CarError::InvalidResponse {
                reason: "Empty frame".to_string(),
            });
        };
        if Self::checksum(body) != checksum {
            return Err(CarError::ChecksumMismatch);
        }

        match body {
            [_, 0, params @ ..] => Ok(params.to_vec()),
            [_, status, ..] => Err(CarError::BridgeFault { status: *status }),
            _ => Err(CarError::InvalidResponse {
                reason: format!("Frame too short: {:02X?}", frame),
            }),
        }
    }

    fn read_response(&mut self) -> Result<Vec<u8>> {
        // Header and length first, then the length-counted rest
        let mut prefix = [0u8; 3];
        self.port.read_exact(&mut prefix).map_err(read_error)?;
        if prefix[..2] != HEADER {
            return Err(CarError::InvalidResponse {
                reason: format!("Invalid header: {:02X?}", &prefix[..2]),
            });
        }

        let length = prefix[2] as usize;
        if length < 2 {
            return Err(CarError::InvalidResponse {
                reason: format!("Length {} too short", length),
            });
        }

        let mut frame = vec![0u8; length + 1];
        frame[0] = prefix[2];
        self.port.read_exact(&mut frame[1..]).map_err(read_error)?;
        Self::decode_frame(&frame)
    }

    fn transact(&mut self, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        let packet = Self::build_packet(instruction, params);
        debug!("Bridge {:?}: {:02X?}", instruction, packet);
        self.port.write_all(&packet)?;
        self.port.flush()?;
        self.read_response()
    }

    fn transact_u16(&mut self, instruction: Instruction, params: &[u8]) -> Result<u16> {
        let response = self.transact(instruction, params)?;
        if response.len() < 2 {
            return Err(CarError::InvalidResponse {
                reason: format!("Expected 2 bytes, got {}", response.len()),
            });
        }
        Ok(u16::from_le_bytes([response[0], response[1]]))
    }
}

fn read_error(e: std::io::Error) -> CarError {
    if e.kind() == std::io::ErrorKind::TimedOut {
        CarError::Timeout
    } else {
        CarError::Io(e)
    }
}

impl<P: Read + Write> CarIo for BridgeBus<P> {
    fn write_digital(&mut self, pin: DigitalPin, level: Level) -> Result<()> {
        self.transact(Instruction::DigitalWrite, &[pin.0, level as u8])?;
        Ok(())
    }

    fn read_analog(&mut self, pin: AnalogPin) -> Result<u16> {
        self.transact_u16(Instruction::AnalogRead, &[pin.0])
    }

    fn ping(&mut self, trigger: DigitalPin, echo: DigitalPin, unit: PingUnit) -> Result<u16> {
        self.transact_u16(Instruction::Ping, &[trigger.0, echo.0, unit as u8])
    }
}
