use std::fmt;

use rpccomm_transport::TransportError;

/// Coarse classification of communicator failures, as reported to
/// [`Handler::on_error`](crate::Handler::on_error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Binding or accepting the inbound connection failed.
    AcceptFailure,
    /// The outbound connection could not be established.
    ConnectFailure,
    /// A read failed, including the peer closing mid-message.
    ReadFailure,
    /// A write failed.
    WriteFailure,
    /// A received payload did not hash to its header's checksum.
    ChecksumMismatch,
    /// The caller or the peer broke the protocol contract.
    ProtocolViolation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AcceptFailure => "accept failure",
            Self::ConnectFailure => "connect failure",
            Self::ReadFailure => "read failure",
            Self::WriteFailure => "write failure",
            Self::ChecksumMismatch => "checksum mismatch",
            Self::ProtocolViolation => "protocol violation",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in communicator operations.
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    /// The listening endpoint could not be bound.
    #[error("bind failed: {0}")]
    Bind(#[source] TransportError),

    /// Accepting the inbound connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] TransportError),

    /// Connecting to the peer failed.
    #[error("connect failed: {0}")]
    Connect(#[source] TransportError),

    /// Reading a header or payload failed.
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    /// Writing a message failed.
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    /// A received payload does not hash to the header's checksum.
    #[error("checksum mismatch on opcode {opcode} (header {expected:#018x}, payload {actual:#018x})")]
    ChecksumMismatch {
        opcode: u32,
        expected: u64,
        actual: u64,
    },

    /// A payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: usize },

    /// An outgoing header's size disagrees with its payload.
    #[error("header declares {declared} payload bytes but {actual} were supplied")]
    SizeMismatch { declared: u64, actual: usize },

    /// The operation is not allowed in the current state.
    #[error("{operation} not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// The per-connection event loop could not be created.
    #[error("failed to build event loop: {0}")]
    Runtime(#[source] std::io::Error),
}

impl CommError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bind(_) | Self::Accept(_) => ErrorKind::AcceptFailure,
            Self::Connect(_) => ErrorKind::ConnectFailure,
            Self::Read(_) => ErrorKind::ReadFailure,
            Self::Write(_) => ErrorKind::WriteFailure,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::PayloadTooLarge { .. }
            | Self::SizeMismatch { .. }
            | Self::InvalidState { .. }
            | Self::Runtime(_) => ErrorKind::ProtocolViolation,
        }
    }

    /// Whether this is the peer going away rather than a local fault.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Read(err) | Self::Write(err) => matches!(
                err.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let io = || std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert_eq!(CommError::Read(io()).kind(), ErrorKind::ReadFailure);
        assert_eq!(CommError::Write(io()).kind(), ErrorKind::WriteFailure);
        assert_eq!(
            CommError::Accept(TransportError::Accept(io())).kind(),
            ErrorKind::AcceptFailure
        );
        assert_eq!(
            CommError::Connect(TransportError::Io(io())).kind(),
            ErrorKind::ConnectFailure
        );
        assert_eq!(
            CommError::ChecksumMismatch {
                opcode: 1,
                expected: 2,
                actual: 3
            }
            .kind(),
            ErrorKind::ChecksumMismatch
        );
        assert_eq!(
            CommError::InvalidState {
                operation: "send_meta",
                state: "sending"
            }
            .kind(),
            ErrorKind::ProtocolViolation
        );
    }

    #[test]
    fn disconnect_detection() {
        let eof = CommError::Read(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(eof.is_disconnect());
        let aborted = CommError::Read(std::io::Error::from(std::io::ErrorKind::ConnectionAborted));
        assert!(!aborted.is_disconnect());
    }

    #[test]
    fn messages_are_readable() {
        let err = CommError::InvalidState {
            operation: "recv_meta",
            state: "awaiting header",
        };
        assert_eq!(err.to_string(), "recv_meta not allowed while awaiting header");
        assert_eq!(ErrorKind::ChecksumMismatch.to_string(), "checksum mismatch");
    }
}
