/// Errors that can occur while reading or writing framed messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: usize },

    /// The header's declared size disagrees with the payload supplied.
    #[error("header declares {declared} payload bytes but {actual} were supplied")]
    SizeMismatch { declared: u64, actual: usize },

    /// The received payload does not hash to the header's checksum.
    #[error("checksum mismatch on opcode {opcode} (header {expected:#018x}, payload {actual:#018x})")]
    ChecksumMismatch {
        opcode: u32,
        expected: u64,
        actual: u64,
    },

    /// An I/O error occurred while reading or writing messages.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was transferred.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
