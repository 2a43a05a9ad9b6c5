use std::io;

use bytes::Bytes;
use rpccomm_frame::Meta;
use rpccomm_transport::Endpoint;
use tokio_util::sync::CancellationToken;

use crate::config::CommunicatorConfig;
use crate::error::{CommError, Result};
use crate::recv::RecvMachine;
use crate::send::SendMachine;
use crate::state::{ConnectionState, RecvState, SendState};

/// Connection-side state shared by the driver and handler callbacks.
pub(crate) struct Link {
    pub(crate) connection: ConnectionState,
    pub(crate) recv: RecvMachine,
    pub(crate) send: SendMachine,
    pub(crate) stop: CancellationToken,
    pub(crate) config: CommunicatorConfig,
    pub(crate) peer: Option<Endpoint>,
}

impl Link {
    pub(crate) fn new(config: CommunicatorConfig) -> Self {
        Self {
            connection: ConnectionState::Unconnected,
            recv: RecvMachine::new(),
            send: SendMachine::new(),
            stop: CancellationToken::new(),
            config,
            peer: None,
        }
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.connection == ConnectionState::Open && self.stop.is_cancelled() {
            return Err(CommError::InvalidState {
                operation,
                state: "stopping",
            });
        }
        if self.connection != ConnectionState::Open {
            return Err(CommError::InvalidState {
                operation,
                state: self.connection.name(),
            });
        }
        Ok(())
    }

    pub(crate) fn recv_meta(&mut self) -> Result<()> {
        self.ensure_open("recv_meta")?;
        self.recv.arm()
    }

    pub(crate) fn send_meta(&mut self, meta: Meta, payload: Bytes) -> Result<()> {
        self.ensure_open("send_meta")?;
        self.send.arm(meta, payload, self.config.max_payload_size)
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.recv.is_busy() || self.send.is_busy()
    }

    /// Close both halves for a local stop.
    ///
    /// Returns the error to report for an aborted operation. A pending
    /// receive takes precedence over a pending send.
    pub(crate) fn abort(&mut self) -> Option<CommError> {
        let read_aborted = self.recv.close();
        let write_aborted = self.send.close();
        let aborted = || io::Error::new(io::ErrorKind::ConnectionAborted, "stopped locally");
        if read_aborted {
            Some(CommError::Read(aborted()))
        } else if write_aborted {
            Some(CommError::Write(aborted()))
        } else {
            None
        }
    }

    /// Close both halves after a failure.
    pub(crate) fn fail(&mut self) {
        self.recv.mark_failed();
        self.send.mark_failed();
        self.connection = ConnectionState::Failed;
    }
}

/// Handle given to [`Handler`](crate::Handler) callbacks for issuing the
/// next operation on the connection.
///
/// Operations issued here are started once the callback returns.
pub struct Context<'a> {
    link: &'a mut Link,
}

impl<'a> Context<'a> {
    pub(crate) fn new(link: &'a mut Link) -> Self {
        Self { link }
    }

    /// Start receiving the next message.
    ///
    /// Legal while the receive side is idle or has just delivered.
    pub fn recv_meta(&mut self) -> Result<()> {
        self.link.recv_meta()
    }

    /// Start sending `meta` followed by `payload`.
    ///
    /// `meta.size` must equal the payload length. The checksum is sent as
    /// given. Rejected while a previous send is still being written.
    pub fn send_meta(&mut self, meta: Meta, payload: impl Into<Bytes>) -> Result<()> {
        self.link.send_meta(meta, payload.into())
    }

    /// Send `payload` under a header computed from it.
    pub fn send_message(&mut self, opcode: u32, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        self.link.send_meta(Meta::for_payload(opcode, &payload), payload)
    }

    /// Request shutdown once the current callback returns.
    pub fn stop(&mut self) {
        self.link.stop.cancel();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.link.connection
    }

    pub fn recv_state(&self) -> RecvState {
        self.link.recv.state()
    }

    pub fn send_state(&self) -> SendState {
        self.link.send.state()
    }

    /// Endpoint of the connected peer, when known.
    pub fn peer_endpoint(&self) -> Option<&Endpoint> {
        self.link.peer.as_ref()
    }

    pub fn config(&self) -> &CommunicatorConfig {
        &self.link.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_rejected_until_open() {
        let mut link = Link::new(CommunicatorConfig::default());
        let mut ctx = Context::new(&mut link);

        let err = ctx.recv_meta().unwrap_err();
        assert!(matches!(
            err,
            CommError::InvalidState {
                operation: "recv_meta",
                state: "unconnected"
            }
        ));
        let err = ctx.send_message(1, "x").unwrap_err();
        assert!(matches!(
            err,
            CommError::InvalidState {
                operation: "send_meta",
                ..
            }
        ));
        assert_eq!(ctx.recv_state(), RecvState::Idle);
        assert_eq!(ctx.send_state(), SendState::Idle);
    }

    #[test]
    fn stop_blocks_new_operations() {
        let (reader, writer) = tokio::io::duplex(64);
        let mut link = Link::new(CommunicatorConfig::default());
        link.recv.attach(Box::new(reader));
        link.send.attach(Box::new(writer));
        link.connection = ConnectionState::Open;

        let mut ctx = Context::new(&mut link);
        ctx.stop();
        assert!(matches!(
            ctx.recv_meta(),
            Err(CommError::InvalidState {
                state: "stopping",
                ..
            })
        ));
    }

    #[test]
    fn abort_prefers_pending_read() {
        let (reader, writer) = tokio::io::duplex(64);
        let mut link = Link::new(CommunicatorConfig::default());
        link.recv.attach(Box::new(reader));
        link.send.attach(Box::new(writer));
        link.connection = ConnectionState::Open;

        link.recv_meta().unwrap();
        link.send_meta(Meta::for_payload(1, b"x"), Bytes::from_static(b"x"))
            .unwrap();
        assert!(link.is_busy());
        assert!(matches!(link.abort(), Some(CommError::Read(_))));
        assert!(!link.is_busy());
        assert_eq!(link.abort().map(|err| err.kind()), None);
    }
}
