use std::fmt;

/// Lifecycle of the communicator's single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not yet accepted or connected, or establishing failed.
    Unconnected,
    /// Established; sends and receives may be issued.
    Open,
    /// A read, write or checksum failure ended the connection.
    Failed,
    /// Stopped locally.
    Closed,
}

impl ConnectionState {
    /// Whether the connection can never carry traffic again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::Open => "open",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }
}

/// Progress of the receive side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecvState {
    Idle,
    AwaitingHeader,
    AwaitingPayload,
    Validating,
    /// The last message was handed to the handler.
    Delivered,
    Failed,
}

impl RecvState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingHeader => "awaiting header",
            Self::AwaitingPayload => "awaiting payload",
            Self::Validating => "validating",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

/// Progress of the send side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendState {
    Idle,
    Sending,
    /// The last message was fully written.
    SendComplete,
    Failed,
}

impl SendState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::SendComplete => "send complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for RecvState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for SendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
