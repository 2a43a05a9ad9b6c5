use bytes::Bytes;
use rpccomm_frame::Meta;

use crate::context::Context;
use crate::error::{CommError, ErrorKind};

/// Application callbacks invoked by the communicator's event loop.
///
/// Every callback runs on the thread driving [`Communicator::run`] and must
/// return promptly. Continuing the conversation (replying, receiving the next
/// message) is done by issuing operations through the [`Context`].
///
/// [`Communicator::run`]: crate::Communicator::run
pub trait Handler {
    /// The connection was established. On the accepting side the first
    /// receive is already armed.
    fn on_connected(&mut self, ctx: &mut Context<'_>) {
        let _ = ctx;
    }

    /// A complete message passed checksum validation.
    fn on_message_received(&mut self, ctx: &mut Context<'_>, meta: Meta, payload: Bytes);

    /// The last send was fully written.
    fn on_send_complete(&mut self, ctx: &mut Context<'_>) {
        let _ = ctx;
    }

    /// The connection failed, could not be established, or had an operation
    /// aborted by stop. Called at most once per failure.
    fn on_error(&mut self, kind: ErrorKind, error: &CommError) {
        let _ = (kind, error);
    }
}

/// [`Handler`] built from a pair of closures.
pub struct Callbacks<M, S> {
    on_message: M,
    on_sent: S,
}

impl<M, S> Callbacks<M, S> {
    pub fn new(on_message: M, on_sent: S) -> Self
    where
        M: FnMut(&mut Context<'_>, Meta, Bytes),
        S: FnMut(&mut Context<'_>),
    {
        Self {
            on_message,
            on_sent,
        }
    }
}

impl<M, S> Handler for Callbacks<M, S>
where
    M: FnMut(&mut Context<'_>, Meta, Bytes),
    S: FnMut(&mut Context<'_>),
{
    fn on_message_received(&mut self, ctx: &mut Context<'_>, meta: Meta, payload: Bytes) {
        (self.on_message)(ctx, meta, payload);
    }

    fn on_send_complete(&mut self, ctx: &mut Context<'_>) {
        (self.on_sent)(ctx);
    }
}
