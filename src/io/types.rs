// src/io/types.rs
//
// Value records exchanged with callers of the bridge.
// Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use super::serial::utils::Parity;

// ============================================================================
// Port Records
// ============================================================================

/// One enumerable serial endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDescriptor {
    /// Numeric identifier (COM number, or trailing digits of the device path)
    pub number: u32,
    /// Host port name passed to the driver (e.g. "COM3", "/dev/ttyUSB0")
    pub name: String,
}

/// Result of one port enumeration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSnapshot {
    pub port_numbers: Vec<u32>,
    pub port_count: u32,
    #[serde(default)]
    pub ports: Vec<PortDescriptor>,
}

impl PortSnapshot {
    pub fn from_descriptors(ports: Vec<PortDescriptor>) -> Self {
        let port_numbers: Vec<u32> = ports.iter().map(|p| p.number).collect();
        PortSnapshot {
            port_count: port_numbers.len() as u32,
            port_numbers,
            ports,
        }
    }

    pub fn find(&self, number: u32) -> Option<&PortDescriptor> {
        self.ports.iter().find(|p| p.number == number)
    }

    pub fn is_empty(&self) -> bool {
        self.port_count == 0
    }
}

/// Electrical and framing parameters applied when a port is opened
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSetting {
    pub port_no: u32,
    pub baud: u32,
    #[serde(default)]
    pub parity: Parity,
    pub stop_bit: u8,
    pub word_length: u8,
    /// Explicit host port name; bypasses number lookup when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
}

impl PortSetting {
    /// 8N1 at the given baud rate
    pub fn new(port_no: u32, baud: u32) -> Self {
        PortSetting {
            port_no,
            baud,
            parity: Parity::None,
            stop_bit: 1,
            word_length: 8,
            port_name: None,
        }
    }

    /// Short line description, e.g. "9600 8-N-1"
    pub fn line_format(&self) -> String {
        format!(
            "{} {}-{}-{}",
            self.baud,
            self.word_length,
            self.parity.letter(),
            self.stop_bit
        )
    }
}

// ============================================================================
// Framing Records
// ============================================================================

/// Runtime frame-splitting policy as supplied by callers.
/// `delimit_by_code` selects code mode; otherwise `interval_ms` applies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelimiterSetting {
    #[serde(default)]
    pub interval_ms: u32,
    #[serde(default)]
    pub delimit_by_code: bool,
    #[serde(default)]
    pub code: u16,
}

impl DelimiterSetting {
    pub fn interval(interval_ms: u32) -> Self {
        DelimiterSetting {
            interval_ms,
            delimit_by_code: false,
            code: 0,
        }
    }

    pub fn code(code: u8) -> Self {
        DelimiterSetting {
            interval_ms: 0,
            delimit_by_code: true,
            code: code as u16,
        }
    }
}

impl Default for DelimiterSetting {
    fn default() -> Self {
        DelimiterSetting::interval(150)
    }
}

/// One delivered unit of received data
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// When true, these bytes continue the previously delivered frame
    pub append: bool,
    pub data: Vec<u8>,
}

/// Outcome of one outbound write
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub data: Vec<u8>,
    /// Empty on success
    pub error_message: String,
}

impl WriteResult {
    pub fn success(data: Vec<u8>) -> Self {
        WriteResult {
            data,
            error_message: String::new(),
        }
    }

    pub fn error(data: Vec<u8>, message: impl Into<String>) -> Self {
        let mut error_message = message.into();
        if error_message.is_empty() {
            error_message = "write failed".to_string();
        }
        WriteResult { data, error_message }
    }

    pub fn is_success(&self) -> bool {
        self.error_message.is_empty()
    }
}

// ============================================================================
// Session Records
// ============================================================================

/// Lifecycle state of the bridge's serial session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Closed,
    Opening,
    Open,
    Closing,
    Faulted,
}

/// Event delivered on a session's frame stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Frame(Frame),
    /// Unrecoverable read error; always the last event of the stream
    Fault { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_count_matches_numbers() {
        let snapshot = PortSnapshot::from_descriptors(vec![
            PortDescriptor { number: 1, name: "COM1".to_string() },
            PortDescriptor { number: 4, name: "COM4".to_string() },
        ]);
        assert_eq!(snapshot.port_numbers, vec![1, 4]);
        assert_eq!(snapshot.port_count, 2);
        assert_eq!(snapshot.find(4).map(|p| p.name.as_str()), Some("COM4"));
        assert!(snapshot.find(2).is_none());
    }

    #[test]
    fn test_write_result_error_never_empty() {
        let result = WriteResult::error(vec![1, 2], "");
        assert!(!result.is_success());
        assert!(!result.error_message.is_empty());
    }

    #[test]
    fn test_port_setting_wire_names() {
        let json = serde_json::to_value(PortSetting::new(3, 9600)).unwrap();
        assert_eq!(json["portNo"], 3);
        assert_eq!(json["stopBit"], 1);
        assert_eq!(json["wordLength"], 8);
        assert_eq!(json["parity"], "none");
        assert!(json.get("portName").is_none());
    }

    #[test]
    fn test_line_format() {
        let mut setting = PortSetting::new(1, 115200);
        setting.parity = Parity::Even;
        setting.stop_bit = 2;
        assert_eq!(setting.line_format(), "115200 8-E-2");
    }

    #[test]
    fn test_fault_event_serializes_tagged() {
        let json = serde_json::to_value(SessionEvent::Fault {
            reason: "unplugged".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "fault");
        assert_eq!(json["reason"], "unplugged");
    }
}
