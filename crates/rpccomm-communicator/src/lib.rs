//! Asynchronous framed message communicator over one stream socket.
//!
//! A [`Communicator`] owns a single connection and the single-threaded event
//! loop that drives it. Each message is a fixed header (size, checksum,
//! opcode) followed by its payload. Receiving reads the header, then exactly
//! the declared payload, verifies the checksum and hands the message to the
//! [`Handler`]. Sending writes header and payload as one unit. Outcomes reach
//! the application only through the handler's callbacks, which may issue the
//! next send or receive through their [`Context`].

pub mod communicator;
pub mod config;
pub mod context;
pub mod error;
pub mod event_loop;
pub mod handler;
pub mod state;

mod recv;
mod send;

pub use communicator::Communicator;
pub use config::CommunicatorConfig;
pub use context::Context;
pub use error::{CommError, ErrorKind, Result};
pub use event_loop::{EventLoop, StopHandle};
pub use handler::{Callbacks, Handler};
pub use state::{ConnectionState, RecvState, SendState};

pub use bytes::Bytes;
pub use rpccomm_frame::{checksum, Meta, HEADER_SIZE};
pub use rpccomm_transport::Endpoint;
