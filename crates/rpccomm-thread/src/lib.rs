//! Thread execution helpers for running communicators.
//!
//! Each communicator owns a single-threaded event loop that blocks while it
//! runs. These primitives supply the threads and the coordination:
//! - [`ThreadPool`] runs long-lived tasks (typically `Communicator::run`) on
//!   worker threads and can wait for all of them to finish.
//! - [`CountBarrier`] lets independent threads report completion and lets an
//!   observer block until the expected number of reports has arrived.

pub mod barrier;
pub mod error;
pub mod pool;

pub use barrier::CountBarrier;
pub use error::{Result, ThreadError};
pub use pool::ThreadPool;
