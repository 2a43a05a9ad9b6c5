use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use rpccomm_frame::{checksum, decode_header, Meta, HEADER_SIZE};
use rpccomm_transport::BoxedReader;
use tokio::io::AsyncReadExt;
use tracing::trace;

use crate::error::{CommError, Result};
use crate::state::RecvState;

pub(crate) enum ReadStep {
    Header([u8; HEADER_SIZE]),
    Payload(Meta, Bytes),
}

type ReadOutput = (BoxedReader, io::Result<ReadStep>);
type ReadFuture = Pin<Box<dyn Future<Output = ReadOutput> + Send>>;

pub(crate) enum RecvOutcome {
    /// The header arrived and the payload read is now outstanding.
    Pending,
    Delivered(Meta, Bytes),
    Failed(CommError),
}

/// Receive half of a connection.
///
/// The reader is moved into the outstanding read future and handed back on
/// completion, so at most one read exists at a time and an interrupted
/// `read_exact` is never restarted mid-buffer.
pub(crate) struct RecvMachine {
    state: RecvState,
    reader: Option<BoxedReader>,
    in_flight: Option<ReadFuture>,
}

impl RecvMachine {
    pub(crate) fn new() -> Self {
        Self {
            state: RecvState::Idle,
            reader: None,
            in_flight: None,
        }
    }

    pub(crate) fn attach(&mut self, reader: BoxedReader) {
        self.reader = Some(reader);
        self.state = RecvState::Idle;
    }

    pub(crate) fn state(&self) -> RecvState {
        self.state
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start reading the next header.
    pub(crate) fn arm(&mut self) -> Result<()> {
        if !matches!(self.state, RecvState::Idle | RecvState::Delivered) {
            return Err(self.invalid());
        }
        let Some(mut reader) = self.reader.take() else {
            return Err(self.invalid());
        };

        self.in_flight = Some(Box::pin(async move {
            let mut block = [0u8; HEADER_SIZE];
            let result = reader
                .read_exact(&mut block)
                .await
                .map(|_| ReadStep::Header(block));
            (reader, result)
        }));
        self.state = RecvState::AwaitingHeader;
        trace!("awaiting header");
        Ok(())
    }

    /// Wait for the outstanding read. Never resolves while nothing is in flight.
    ///
    /// Cancel safe: the read future survives in `self` until it completes.
    pub(crate) async fn next(&mut self) -> ReadOutput {
        let output = match self.in_flight.as_mut() {
            Some(read) => read.await,
            None => return std::future::pending().await,
        };
        self.in_flight = None;
        output
    }

    /// Advance the machine with a finished read.
    pub(crate) fn complete(
        &mut self,
        mut reader: BoxedReader,
        result: io::Result<ReadStep>,
        max_payload_size: usize,
    ) -> RecvOutcome {
        match result {
            Err(err) => {
                self.state = RecvState::Failed;
                RecvOutcome::Failed(CommError::Read(err))
            }
            Ok(ReadStep::Header(block)) => {
                let meta = decode_header(&block);
                trace!(size = meta.size, opcode = meta.opcode, "header received");
                if meta.size > max_payload_size as u64 {
                    self.state = RecvState::Failed;
                    return RecvOutcome::Failed(CommError::PayloadTooLarge {
                        size: meta.size,
                        max: max_payload_size,
                    });
                }
                if meta.size == 0 {
                    self.reader = Some(reader);
                    return self.validate(meta, Bytes::new());
                }

                let size = meta.size as usize;
                self.in_flight = Some(Box::pin(async move {
                    let mut payload = BytesMut::zeroed(size);
                    let result = reader
                        .read_exact(&mut payload)
                        .await
                        .map(|_| ReadStep::Payload(meta, payload.freeze()));
                    (reader, result)
                }));
                self.state = RecvState::AwaitingPayload;
                RecvOutcome::Pending
            }
            Ok(ReadStep::Payload(meta, payload)) => {
                self.reader = Some(reader);
                self.validate(meta, payload)
            }
        }
    }

    fn validate(&mut self, meta: Meta, payload: Bytes) -> RecvOutcome {
        self.state = RecvState::Validating;
        let actual = checksum(&payload);
        if actual != meta.checksum {
            self.state = RecvState::Failed;
            return RecvOutcome::Failed(CommError::ChecksumMismatch {
                opcode: meta.opcode,
                expected: meta.checksum,
                actual,
            });
        }
        self.state = RecvState::Delivered;
        RecvOutcome::Delivered(meta, payload)
    }

    /// Return to idle unless the handler already re-armed.
    pub(crate) fn settle(&mut self) {
        if self.state == RecvState::Delivered {
            self.state = RecvState::Idle;
        }
    }

    /// Drop the reader and any outstanding read. Returns whether a read was aborted.
    pub(crate) fn close(&mut self) -> bool {
        self.reader = None;
        let aborted = self.in_flight.take().is_some();
        if aborted {
            self.state = RecvState::Failed;
        }
        aborted
    }

    pub(crate) fn mark_failed(&mut self) {
        self.close();
        self.state = RecvState::Failed;
    }

    fn invalid(&self) -> CommError {
        CommError::InvalidState {
            operation: "recv_meta",
            state: self.state.name(),
        }
    }
}
