//! Framed, checksummed point-to-point message communicator.
//!
//! rpccomm moves opaque binary messages between two peers over a single
//! stream socket. Every message carries a fixed header (payload size, CRC-64
//! checksum, opcode) and is verified on arrival.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix domain socket endpoints, listeners and streams
//! - [`frame`]: header codec, checksum and blocking message reader/writer
//! - [`thread`]: thread pool and count barrier for coordinating peers
//! - [`communicator`]: the asynchronous communicator and its handler callbacks

/// Re-export transport types.
pub mod transport {
    pub use rpccomm_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rpccomm_frame::*;
}

/// Re-export thread coordination types.
pub mod thread {
    pub use rpccomm_thread::*;
}

/// Re-export communicator types.
pub mod communicator {
    pub use rpccomm_communicator::*;
}
