//! Stream socket transport for the rpccomm communicator.
//!
//! Provides a unified interface over the stream sockets a communicator can
//! run on:
//! - TCP (any platform, the default)
//! - Unix domain sockets (Linux/macOS)
//!
//! This is the lowest layer of rpccomm. Everything else builds on top of
//! the [`Listener`], [`connect`] and [`Stream`] items provided here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::{connect, Listener};
pub use stream::{BoxedReader, BoxedWriter, Stream};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
