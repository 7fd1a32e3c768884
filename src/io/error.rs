// src/io/error.rs
//
// Error type shared by the port enumerator, session and bridge.

use thiserror::Error;

/// Errors surfaced by the serial bridge.
///
/// Write failures are not errors at this level; they are reported per call
/// through `WriteResult::error_message`. Read faults that happen outside any
/// call arrive as `SessionEvent::Fault` on the frame stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    /// Host port discovery failed or timed out. Transient.
    #[error("port enumeration failed: {0}")]
    Enumeration(String),

    /// A parameter was rejected before touching the device.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// The device could not be opened with the requested parameters.
    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    /// A session is already opening, open or closing.
    #[error("serial port is busy: a session is already active")]
    Busy,

    /// The previous session faulted and has not been closed yet.
    #[error("serial session faulted; close it before reopening")]
    Faulted,

    #[error("serial port is not open")]
    NotOpen,

    /// The pending open was cancelled by a concurrent close.
    #[error("open cancelled by close")]
    Cancelled,

    /// User-supplied send text could not be parsed.
    #[error("{0}")]
    InvalidInput(String),

    #[error("config error: {0}")]
    Config(String),
}

impl IoError {
    pub fn enumeration(reason: impl std::fmt::Display) -> Self {
        IoError::Enumeration(reason.to_string())
    }

    pub fn invalid_setting(reason: impl std::fmt::Display) -> Self {
        IoError::InvalidSetting(reason.to_string())
    }

    pub fn open(port: &str, reason: impl std::fmt::Display) -> Self {
        IoError::Open {
            port: port.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_input(reason: impl std::fmt::Display) -> Self {
        IoError::InvalidInput(reason.to_string())
    }

    pub fn config(reason: impl std::fmt::Display) -> Self {
        IoError::Config(reason.to_string())
    }

    /// Whether the caller may reasonably retry the same call later.
    pub fn is_transient(&self) -> bool {
        matches!(self, IoError::Enumeration(_) | IoError::Busy | IoError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_names_port() {
        let err = IoError::open("COM3", "access denied");
        assert_eq!(err.to_string(), "failed to open COM3: access denied");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_enumeration_is_transient() {
        assert!(IoError::enumeration("timed out").is_transient());
        assert!(!IoError::NotOpen.is_transient());
    }
}
