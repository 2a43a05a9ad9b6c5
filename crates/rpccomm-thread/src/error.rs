/// Errors raised by the thread pool.
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    /// A pool needs at least one worker.
    #[error("thread pool size must be greater than zero")]
    EmptyPool,

    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The pool's workers have already exited.
    #[error("thread pool is shut down")]
    ShutDown,
}

pub type Result<T> = std::result::Result<T, ThreadError>;
