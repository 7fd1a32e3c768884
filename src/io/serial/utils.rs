// src/io/serial/utils.rs
//
// Port setting types and conversions to the serialport crate.

use serde::{Deserialize, Serialize};
use serialport::{DataBits, Parity as SpParity, StopBits};

use crate::io::error::IoError;
use crate::io::types::PortSetting;

// ============================================================================
// Types
// ============================================================================

/// Parity setting for serial port configuration.
/// Accepts "none"/"odd"/"even" and the single letters "N"/"O"/"E".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl Parity {
    pub fn letter(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        }
    }
}

impl std::str::FromStr for Parity {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "odd" | "o" => Ok(Parity::Odd),
            "even" | "e" => Ok(Parity::Even),
            other => Err(IoError::invalid_setting(format!(
                "parity must be none, odd or even (got {:?})",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Parity {
    type Error = IoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert our Parity enum to serialport crate's Parity type
pub fn to_serialport_parity(p: Parity) -> SpParity {
    match p {
        Parity::None => SpParity::None,
        Parity::Odd => SpParity::Odd,
        Parity::Even => SpParity::Even,
    }
}

/// Convert a word length to serialport crate's DataBits type
pub fn to_serialport_data_bits(bits: u8) -> Result<DataBits, IoError> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(IoError::invalid_setting(format!(
            "word length must be 5 to 8 bits (got {})",
            other
        ))),
    }
}

/// Convert stop bits count to serialport crate's StopBits type
pub fn to_serialport_stop_bits(bits: u8) -> Result<StopBits, IoError> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(IoError::invalid_setting(format!(
            "stop bits must be 1 or 2 (got {})",
            other
        ))),
    }
}

/// Check every field of a PortSetting against what the transport accepts
pub fn validate_port_setting(setting: &PortSetting) -> Result<(), IoError> {
    if setting.baud == 0 {
        return Err(IoError::invalid_setting("baud rate must be non-zero"));
    }
    to_serialport_data_bits(setting.word_length)?;
    to_serialport_stop_bits(setting.stop_bit)?;
    if let Some(name) = &setting.port_name {
        if name.trim().is_empty() {
            return Err(IoError::invalid_setting("port name must not be empty"));
        }
    }
    Ok(())
}

/// Trailing decimal digits of a host port name ("COM12" -> 12, "/dev/ttyUSB0" -> 0)
pub fn port_number_from_name(name: &str) -> Option<u32> {
    let digits_start = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    name[digits_start..].parse().ok()
}

// ============================================================================
// Tests
// ============================================================================
