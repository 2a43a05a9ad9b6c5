use std::future::Future;

use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

use crate::error::{CommError, Result};

/// Single-threaded event loop that drives one connection.
///
/// All socket completions and handler callbacks for a communicator run on
/// the thread that calls [`block_on`](Self::block_on).
#[derive(Debug)]
pub struct EventLoop {
    runtime: Runtime,
}

impl EventLoop {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CommError::Runtime)?;
        Ok(Self { runtime })
    }

    /// Run `future` to completion on this loop.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Cloneable, thread-safe trigger for stopping a communicator.
///
/// Stopping wakes a blocked [`Communicator::run`](crate::Communicator::run),
/// closes the socket and abandons any accept or connect in progress.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Request shutdown. Idempotent.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}
