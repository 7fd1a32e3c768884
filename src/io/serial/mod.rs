// src/io/serial/mod.rs
//
// Serial port bridge internals.
//
// Features:
// - Port enumeration with a bounded discovery timeout
// - Interval- or code-delimited framing of the receive stream
// - Serialized transmit on the same handle as the read loop

pub mod delimiter;
pub mod framer;
pub mod input;
pub mod ports;
pub mod reader;
pub(crate) mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use delimiter::{Boundary, DelimiterMode};
pub use framer::FrameAssembler;
pub use input::parse_send_input;
pub use ports::{enumerate, snapshot_from_names, PortDriver, PortHandle, SystemDriver};
pub use reader::{FrameStream, SerialSession, SessionOptions};
pub use utils::Parity;
