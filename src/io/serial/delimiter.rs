// src/io/serial/delimiter.rs
//
// Frame boundary policy. Pure decisions, no buffering: the framer owns state
// and asks this module where one frame ends and the next begins.

use std::time::Duration;

use crate::io::error::IoError;
use crate::io::types::DelimiterSetting;

/// Validated delimiting mode. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelimiterMode {
    /// Close a frame once it has been open for this long
    Interval(Duration),
    /// Close a frame right after this byte is appended
    Code(u8),
}

impl TryFrom<&DelimiterSetting> for DelimiterMode {
    type Error = IoError;

    fn try_from(setting: &DelimiterSetting) -> Result<Self, Self::Error> {
        if setting.delimit_by_code {
            let code = u8::try_from(setting.code).map_err(|_| {
                IoError::invalid_setting(format!(
                    "delimiter code must be a byte value 0x00-0xFF (got 0x{:X})",
                    setting.code
                ))
            })?;
            Ok(DelimiterMode::Code(code))
        } else {
            if setting.interval_ms == 0 {
                return Err(IoError::invalid_setting("delimiter interval must be at least 1 ms"));
            }
            Ok(DelimiterMode::Interval(Duration::from_millis(setting.interval_ms as u64)))
        }
    }
}

impl std::fmt::Display for DelimiterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelimiterMode::Interval(d) => write!(f, "interval {}ms", d.as_millis()),
            DelimiterMode::Code(c) => write!(f, "code 0x{:02X}", c),
        }
    }
}

/// Where an incoming byte falls relative to the open frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Append the byte to the open frame
    Continue,
    /// Append the byte, then complete the frame
    CloseAfter,
    /// Complete the open frame first; the byte starts the next one
    CloseBefore,
}

/// Decide what to do with `byte`.
/// `elapsed` is the age of the open frame, or `None` when no frame is open.
pub fn decide(mode: &DelimiterMode, elapsed: Option<Duration>, byte: u8) -> Boundary {
    match mode {
        DelimiterMode::Interval(interval) => match elapsed {
            Some(age) if age >= *interval => Boundary::CloseBefore,
            _ => Boundary::Continue,
        },
        DelimiterMode::Code(code) => {
            if byte == *code {
                Boundary::CloseAfter
            } else {
                Boundary::Continue
            }
        }
    }
}

/// Tick-side check: whether an open frame of age `elapsed` is due in interval mode.
/// Code mode never expires on time.
pub fn interval_expired(mode: &DelimiterMode, elapsed: Option<Duration>) -> bool {
    match (mode, elapsed) {
        (DelimiterMode::Interval(interval), Some(age)) => age >= *interval,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_150: Duration = Duration::from_millis(150);

    #[test]
    fn test_mode_from_setting() {
        assert_eq!(
            DelimiterMode::try_from(&DelimiterSetting::interval(150)).unwrap(),
            DelimiterMode::Interval(MS_150)
        );
        assert_eq!(
            DelimiterMode::try_from(&DelimiterSetting::code(0x0A)).unwrap(),
            DelimiterMode::Code(0x0A)
        );
    }

    #[test]
    fn test_mode_from_setting_rejects_bad_values() {
        let wide = DelimiterSetting {
            interval_ms: 0,
            delimit_by_code: true,
            code: 0x100,
        };
        assert!(matches!(DelimiterMode::try_from(&wide), Err(IoError::InvalidSetting(_))));
        assert!(DelimiterMode::try_from(&DelimiterSetting::interval(0)).is_err());
    }

    #[test]
    fn test_code_mode_ignores_interval_when_delimiting_by_code() {
        let setting = DelimiterSetting {
            interval_ms: 0,
            delimit_by_code: true,
            code: 0x0D,
        };
        assert_eq!(DelimiterMode::try_from(&setting).unwrap(), DelimiterMode::Code(0x0D));
    }

    #[test]
    fn test_interval_decisions() {
        let mode = DelimiterMode::Interval(MS_150);
        assert_eq!(decide(&mode, None, 0x41), Boundary::Continue);
        assert_eq!(decide(&mode, Some(Duration::from_millis(149)), 0x41), Boundary::Continue);
        assert_eq!(decide(&mode, Some(MS_150), 0x41), Boundary::CloseBefore);
    }

    #[test]
    fn test_code_decisions() {
        let mode = DelimiterMode::Code(0x0A);
        assert_eq!(decide(&mode, None, 0x0A), Boundary::CloseAfter);
        assert_eq!(decide(&mode, Some(Duration::from_secs(10)), 0x41), Boundary::Continue);
    }

    #[test]
    fn test_interval_expired() {
        let mode = DelimiterMode::Interval(MS_150);
        assert!(!interval_expired(&mode, None));
        assert!(!interval_expired(&mode, Some(Duration::from_millis(10))));
        assert!(interval_expired(&mode, Some(MS_150)));
        assert!(!interval_expired(&DelimiterMode::Code(0), Some(Duration::from_secs(5))));
    }

    #[test]
    fn test_display() {
        assert_eq!(DelimiterMode::Code(0x0A).to_string(), "code 0x0A");
        assert_eq!(DelimiterMode::Interval(MS_150).to_string(), "interval 150ms");
    }
}
