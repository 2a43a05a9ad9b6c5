use std::fmt;
use std::io;

use rpccomm_communicator::CommError;
use rpccomm_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: &io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::NotFound
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: &TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn comm_error(context: &str, err: &CommError) -> CliError {
    match err {
        CommError::Bind(source) | CommError::Accept(source) | CommError::Connect(source) => {
            transport_error(context, source)
        }
        CommError::Read(source) | CommError::Write(source) => io_error(context, source),
        CommError::ChecksumMismatch { .. }
        | CommError::PayloadTooLarge { .. }
        | CommError::SizeMismatch { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        CommError::InvalidState { .. } | CommError::Runtime(_) => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpccomm_transport::Endpoint;

    #[test]
    fn refused_connect_is_plain_failure() {
        let err = CommError::Connect(TransportError::Connect {
            endpoint: Endpoint::loopback(1),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        });
        assert_eq!(comm_error("connect failed", &err).code, FAILURE);
    }

    #[test]
    fn corrupt_data_maps_to_data_invalid() {
        let err = CommError::ChecksumMismatch {
            opcode: 1,
            expected: 2,
            actual: 3,
        };
        let cli = comm_error("receive failed", &err);
        assert_eq!(cli.code, DATA_INVALID);
        assert!(cli.message.starts_with("receive failed: checksum mismatch"));
    }

    #[test]
    fn path_too_long_is_transport_error() {
        let err = TransportError::PathTooLong {
            path: "/tmp/x".into(),
            len: 200,
            max: 108,
        };
        assert_eq!(transport_error("bind failed", &err).code, TRANSPORT_ERROR);
    }
}
