// src/lib.rs
//
// comtap: serial bridge library.
// Enumerates serial ports, opens one session at a time, frames the receive
// stream by interval or delimiter code, and serializes transmits.

#[macro_use]
mod logging;

pub mod bridge;
pub mod io;
pub mod settings;

pub use bridge::Bridge;
pub use io::serial::{DelimiterMode, FrameStream, Parity, PortDriver, SystemDriver};
pub use io::{
    DelimiterSetting, Frame, IoError, PortDescriptor, PortSetting, PortSnapshot, SessionEvent,
    SessionState, WriteResult,
};
pub use logging::{init_file_logging, set_stderr_level, stop_file_logging, LogLevel};
pub use settings::BridgeConfig;
