// src/io/mod.rs
//
// Serial I/O layer: value records, errors, inbound decoding and the serial
// session machinery.

pub mod codec;
mod error;
pub mod serial;
mod types;

pub use codec::{decode_record, decode_record_str, SendRequest, Validate};
pub use error::IoError;
pub use types::{
    DelimiterSetting, Frame, PortDescriptor, PortSetting, PortSnapshot, SessionEvent, SessionState,
    WriteResult,
};
