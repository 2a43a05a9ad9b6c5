use rpccomm_frame::DEFAULT_MAX_PAYLOAD;

/// Per-communicator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunicatorConfig {
    /// Largest payload accepted or sent, in bytes.
    ///
    /// An inbound header declaring more fails the connection before any
    /// payload buffer is allocated.
    pub max_payload_size: usize,

    /// Disable Nagle's algorithm on TCP connections.
    pub nodelay: bool,
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            nodelay: true,
        }
    }
}

impl CommunicatorConfig {
    /// Set the maximum payload size.
    pub fn with_max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max;
        self
    }

    /// Enable or disable `TCP_NODELAY`.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}
