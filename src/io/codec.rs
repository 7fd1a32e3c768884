// src/io/codec.rs
//
// Inbound record decoding for whatever marshaling layer sits in front of the
// bridge. One generic step per record type: deserialize, then validate.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::error::IoError;
use super::serial::delimiter::DelimiterMode;
use super::serial::utils::validate_port_setting;
use super::types::{DelimiterSetting, PortSetting};

/// Field-level checks run after a record is deserialized
pub trait Validate {
    fn validate(&self) -> Result<(), IoError>;
}

impl Validate for PortSetting {
    fn validate(&self) -> Result<(), IoError> {
        validate_port_setting(self)
    }
}

impl Validate for DelimiterSetting {
    fn validate(&self) -> Result<(), IoError> {
        DelimiterMode::try_from(self).map(|_| ())
    }
}

/// Outbound bytes as sent by a caller. `data` is a byte list; `text` uses the
/// transmit text syntax. Exactly one must be present.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub data: Option<Vec<u8>>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Validate for SendRequest {
    fn validate(&self) -> Result<(), IoError> {
        match (&self.data, &self.text) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(IoError::invalid_input("send request needs exactly one of data or text")),
        }
    }
}

/// Decode a record from a JSON value and validate it
pub fn decode_record<T>(value: serde_json::Value) -> Result<T, IoError>
where
    T: DeserializeOwned + Validate,
{
    let record: T = serde_json::from_value(value)
        .map_err(|e| IoError::invalid_setting(format!("malformed record: {}", e)))?;
    record.validate()?;
    Ok(record)
}

/// Decode a record from JSON text and validate it
pub fn decode_record_str<T>(json: &str) -> Result<T, IoError>
where
    T: DeserializeOwned + Validate,
{
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| IoError::invalid_setting(format!("malformed JSON: {}", e)))?;
    decode_record(value)
}
