use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use rpccomm_frame::{encode_header, Meta};
use rpccomm_transport::BoxedWriter;
use tokio::io::AsyncWriteExt;
use tracing::trace;

use crate::error::{CommError, Result};
use crate::state::SendState;

type WriteOutput = (BoxedWriter, io::Result<()>);
type WriteFuture = Pin<Box<dyn Future<Output = WriteOutput> + Send>>;

/// Send half of a connection. The writer travels with the single
/// outstanding write, as the reader does on the receive side.
pub(crate) struct SendMachine {
    state: SendState,
    writer: Option<BoxedWriter>,
    in_flight: Option<WriteFuture>,
}

async fn write_message(writer: &mut BoxedWriter, meta: &Meta, payload: &[u8]) -> io::Result<()> {
    writer.write_all(&encode_header(meta)).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await
}

impl SendMachine {
    pub(crate) fn new() -> Self {
        Self {
            state: SendState::Idle,
            writer: None,
            in_flight: None,
        }
    }

    pub(crate) fn attach(&mut self, writer: BoxedWriter) {
        self.writer = Some(writer);
        self.state = SendState::Idle;
    }

    pub(crate) fn state(&self) -> SendState {
        self.state
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start writing `meta` followed by `payload`.
    ///
    /// The header is sent as given; its checksum is not recomputed.
    pub(crate) fn arm(&mut self, meta: Meta, payload: Bytes, max_payload_size: usize) -> Result<()> {
        if !matches!(self.state, SendState::Idle | SendState::SendComplete) {
            return Err(self.invalid());
        }
        if meta.size != payload.len() as u64 {
            return Err(CommError::SizeMismatch {
                declared: meta.size,
                actual: payload.len(),
            });
        }
        if payload.len() > max_payload_size {
            return Err(CommError::PayloadTooLarge {
                size: meta.size,
                max: max_payload_size,
            });
        }
        let Some(mut writer) = self.writer.take() else {
            return Err(self.invalid());
        };

        trace!(size = meta.size, opcode = meta.opcode, "sending message");
        self.in_flight = Some(Box::pin(async move {
            let result = write_message(&mut writer, &meta, &payload).await;
            (writer, result)
        }));
        self.state = SendState::Sending;
        Ok(())
    }

    /// Wait for the outstanding write. Never resolves while nothing is in flight.
    pub(crate) async fn next(&mut self) -> WriteOutput {
        let output = match self.in_flight.as_mut() {
            Some(write) => write.await,
            None => return std::future::pending().await,
        };
        self.in_flight = None;
        output
    }

    pub(crate) fn complete(
        &mut self,
        writer: BoxedWriter,
        result: io::Result<()>,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                self.writer = Some(writer);
                self.state = SendState::SendComplete;
                Ok(())
            }
            Err(err) => {
                self.state = SendState::Failed;
                Err(CommError::Write(err))
            }
        }
    }

    /// Return to idle unless the handler already started another send.
    pub(crate) fn settle(&mut self) {
        if self.state == SendState::SendComplete {
            self.state = SendState::Idle;
        }
    }

    /// Drop the writer and any outstanding write. Returns whether a write was aborted.
    pub(crate) fn close(&mut self) -> bool {
        self.writer = None;
        let aborted = self.in_flight.take().is_some();
        if aborted {
            self.state = SendState::Failed;
        }
        aborted
    }

    pub(crate) fn mark_failed(&mut self) {
        self.close();
        self.state = SendState::Failed;
    }

    fn invalid(&self) -> CommError {
        CommError::InvalidState {
            operation: "send_meta",
            state: self.state.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpccomm_frame::{decode_header, HEADER_SIZE};
    use tokio::io::AsyncReadExt;

    fn machine() -> (SendMachine, tokio::io::DuplexStream) {
        let (ours, theirs) = tokio::io::duplex(1024);
        let mut send = SendMachine::new();
        send.attach(Box::new(ours));
        (send, theirs)
    }

    #[tokio::test]
    async fn writes_header_then_payload() {
        let (mut send, mut peer) = machine();
        let meta = Meta::for_payload(5, b"payload");
        send.arm(meta, Bytes::from_static(b"payload"), 1024).unwrap();
        assert_eq!(send.state(), SendState::Sending);

        let (writer, result) = send.next().await;
        send.complete(writer, result).unwrap();
        assert_eq!(send.state(), SendState::SendComplete);

        let mut header = [0u8; HEADER_SIZE];
        peer.read_exact(&mut header).await.unwrap();
        assert_eq!(decode_header(&header), meta);
        let mut body = [0u8; 7];
        peer.read_exact(&mut body).await.unwrap();
        assert_eq!(&body, b"payload");

        send.settle();
        assert_eq!(send.state(), SendState::Idle);
    }

    #[tokio::test]
    async fn header_checksum_is_not_recomputed() {
        let (mut send, mut peer) = machine();
        let meta = Meta::new(3, 0xDEAD, 1);
        send.arm(meta, Bytes::from_static(b"abc"), 1024).unwrap();
        let (writer, result) = send.next().await;
        send.complete(writer, result).unwrap();

        let mut header = [0u8; HEADER_SIZE];
        peer.read_exact(&mut header).await.unwrap();
        assert_eq!(decode_header(&header).checksum, 0xDEAD);
    }

    #[tokio::test]
    async fn closed_peer_is_write_failure() {
        let (ours, theirs) = tokio::io::duplex(8);
        drop(theirs);
        let mut send = SendMachine::new();
        send.attach(Box::new(ours));

        send.arm(Meta::for_payload(1, b"x"), Bytes::from_static(b"x"), 1024)
            .unwrap();
        let (writer, result) = send.next().await;
        assert!(matches!(send.complete(writer, result), Err(CommError::Write(_))));
        assert_eq!(send.state(), SendState::Failed);
    }

    #[test]
    fn overlapping_send_rejected() {
        let (mut send, _peer) = machine();
        send.arm(Meta::for_payload(1, b"a"), Bytes::from_static(b"a"), 1024)
            .unwrap();
        let err = send
            .arm(Meta::for_payload(2, b"b"), Bytes::from_static(b"b"), 1024)
            .unwrap_err();
        assert!(matches!(
            err,
            CommError::InvalidState {
                operation: "send_meta",
                state: "sending"
            }
        ));
    }

    #[test]
    fn size_mismatch_rejected() {
        let (mut send, _peer) = machine();
        let err = send
            .arm(Meta::new(10, 0, 1), Bytes::from_static(b"short"), 1024)
            .unwrap_err();
        assert!(matches!(
            err,
            CommError::SizeMismatch {
                declared: 10,
                actual: 5
            }
        ));
        assert_eq!(send.state(), SendState::Idle);
    }

    #[test]
    fn oversized_payload_rejected() {
        let (mut send, _peer) = machine();
        let payload = Bytes::from(vec![0u8; 32]);
        let err = send
            .arm(Meta::for_payload(1, &payload), payload, 16)
            .unwrap_err();
        assert!(matches!(err, CommError::PayloadTooLarge { size: 32, max: 16 }));
    }
}
