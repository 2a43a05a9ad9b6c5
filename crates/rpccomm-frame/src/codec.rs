use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_64_REDIS};

/// Message header: size (8) + checksum (8) + opcode (4) = 20 bytes.
pub const HEADER_SIZE: usize = 20;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// Content hash both peers use for the header checksum.
///
/// CRC-64 with the Redis parameters: deterministic, order-sensitive and
/// independent of platform or build.
pub fn checksum(payload: &[u8]) -> u64 {
    CRC64.checksum(payload)
}

/// The fixed-width header preceding every message on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Meta {
    /// Byte length of the payload that follows the header.
    pub size: u64,
    /// [`checksum`] of the payload.
    pub checksum: u64,
    /// Application-defined message kind, passed through unmodified.
    pub opcode: u32,
}

impl Meta {
    /// Create a header from raw field values.
    pub fn new(size: u64, checksum: u64, opcode: u32) -> Self {
        Self {
            size,
            checksum,
            opcode,
        }
    }

    /// Build the header that correctly describes `payload`.
    pub fn for_payload(opcode: u32, payload: &[u8]) -> Self {
        Self {
            size: payload.len() as u64,
            checksum: checksum(payload),
            opcode,
        }
    }

    /// Whether `payload` has the declared size and hashes to the declared checksum.
    pub fn describes(&self, payload: &[u8]) -> bool {
        self.size == payload.len() as u64 && self.checksum == checksum(payload)
    }
}

/// A received or outgoing message: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The message header.
    pub meta: Meta,
    /// The message payload.
    pub payload: Bytes,
}

impl Message {
    /// Create a message whose header is computed from `payload`.
    pub fn new(opcode: u32, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            meta: Meta::for_payload(opcode, &payload),
            payload,
        }
    }

    /// The total wire size of this message (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a header into its wire form.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬────────────┬─────────────────┐
/// │ Size         │ Checksum     │ Opcode     │ Payload         │
/// │ (8B LE u64)  │ (8B LE u64)  │ (4B LE u32)│ (Size bytes)    │
/// └──────────────┴──────────────┴────────────┴─────────────────┘
/// ```
pub fn encode_header(meta: &Meta) -> [u8; HEADER_SIZE] {
    let mut block = [0u8; HEADER_SIZE];
    let mut dst = &mut block[..];
    dst.put_u64_le(meta.size);
    dst.put_u64_le(meta.checksum);
    dst.put_u32_le(meta.opcode);
    block
}

/// Decode a header from its wire form.
///
/// Total: every block decodes. Bounds on `size` are the caller's business.
pub fn decode_header(block: &[u8; HEADER_SIZE]) -> Meta {
    let mut src = &block[..];
    Meta {
        size: src.get_u64_le(),
        checksum: src.get_u64_le(),
        opcode: src.get_u32_le(),
    }
}

/// Append a header and its payload to `dst`.
pub fn encode_message(meta: &Meta, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&encode_header(meta));
    dst.put_slice(payload);
}

/// Configuration for the blocking message reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
