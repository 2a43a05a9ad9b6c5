//! Length-and-checksum message framing.
//!
//! Every message on the wire is a fixed 20-byte header followed by the payload:
//! - An 8-byte little-endian payload size
//! - An 8-byte little-endian CRC-64 checksum of the payload
//! - A 4-byte little-endian opcode, opaque to the transport
//!
//! There is no magic number and no version field; both peers must agree on
//! this layout.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    checksum, decode_header, encode_header, encode_message, FrameConfig, Message, Meta,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::MessageReader;
pub use writer::MessageWriter;
