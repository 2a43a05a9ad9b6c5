use std::io::{ErrorKind, Read};
use std::net::TcpStream;

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{checksum, decode_header, FrameConfig, Message, HEADER_SIZE};
use crate::error::{FrameError, Result};

/// Reads complete, checksum-verified messages from any `Read` stream.
///
/// Reads exactly one header, then exactly the declared payload; nothing past
/// the current message is consumed.
pub struct MessageReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, whether
    /// cleanly between messages or partway through one.
    pub fn read_message(&mut self) -> Result<Message> {
        let mut block = [0u8; HEADER_SIZE];
        self.read_full(&mut block)?;
        let meta = decode_header(&block);

        if meta.size > self.config.max_payload_size as u64 {
            return Err(FrameError::PayloadTooLarge {
                size: meta.size,
                max: self.config.max_payload_size,
            });
        }

        let mut payload = BytesMut::zeroed(meta.size as usize);
        self.read_full(&mut payload)?;

        let actual = checksum(&payload);
        if actual != meta.checksum {
            return Err(FrameError::ChecksumMismatch {
                opcode: meta.opcode,
                expected: meta.checksum,
                actual,
            });
        }

        trace!(opcode = meta.opcode, size = meta.size, "read message");
        Ok(Message {
            meta,
            payload: payload.freeze(),
        })
    }

    fn read_full(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent reads.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl MessageReader<TcpStream> {
    /// Create a reader for a blocking TCP stream and apply the read timeout from config.
    pub fn with_config_tcp(inner: TcpStream, config: FrameConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BufMut;

    use super::*;
    use crate::codec::{encode_header, encode_message, Meta};

    fn wire(messages: &[(u32, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (opcode, payload) in messages {
            encode_message(&Meta::for_payload(*opcode, payload), payload, &mut buf);
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_message() {
        let mut reader = MessageReader::new(Cursor::new(wire(&[(654321, b"hello")])));
        let message = reader.read_message().unwrap();

        assert_eq!(message.meta.opcode, 654321);
        assert_eq!(message.meta.size, 5);
        assert_eq!(message.payload.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_messages() {
        let bytes = wire(&[(1, b"one"), (2, b"two"), (3, b"three")]);
        let mut reader = MessageReader::new(Cursor::new(bytes));

        let m1 = reader.read_message().unwrap();
        let m2 = reader.read_message().unwrap();
        let m3 = reader.read_message().unwrap();

        assert_eq!((m1.meta.opcode, m1.payload.as_ref()), (1, b"one".as_ref()));
        assert_eq!((m2.meta.opcode, m2.payload.as_ref()), (2, b"two".as_ref()));
        assert_eq!((m3.meta.opcode, m3.payload.as_ref()), (3, b"three".as_ref()));
    }

    #[test]
    fn read_empty_payload() {
        let mut reader = MessageReader::new(Cursor::new(wire(&[(9, b"")])));
        let message = reader.read_message().unwrap();

        assert_eq!(message.meta.size, 0);
        assert!(message.payload.is_empty());
    }

    #[test]
    fn read_large_payload() {
        let payload = vec![0xAB; 64 * 1024];
        let mut reader = MessageReader::new(Cursor::new(wire(&[(9, &payload)])));
        let message = reader.read_message().unwrap();

        assert_eq!(message.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[(4, b"slow")]),
            pos: 0,
        };
        let mut reader = MessageReader::new(byte_reader);

        let message = reader.read_message().unwrap();
        assert_eq!(message.meta.opcode, 4);
        assert_eq!(message.payload.as_ref(), b"slow");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = MessageReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_after_header() {
        let meta = Meta::for_payload(2, b"never-arrives");
        let mut reader = MessageReader::new(Cursor::new(encode_header(&meta).to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_payload() {
        let meta = Meta::for_payload(2, b"only-part-of-this");
        let mut partial = BytesMut::new();
        partial.put_slice(&encode_header(&meta));
        partial.put_slice(b"only-part");

        let mut reader = MessageReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn checksum_mismatch_rejected() {
        let mut bytes = BytesMut::new();
        let mut meta = Meta::for_payload(77, b"payload");
        meta.checksum ^= 1;
        encode_message(&meta, b"payload", &mut bytes);

        let mut reader = MessageReader::new(Cursor::new(bytes.to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(
            err,
            FrameError::ChecksumMismatch { opcode: 77, expected, actual }
                if expected == meta.checksum && actual == meta.checksum ^ 1
        ));
    }

    #[test]
    fn oversized_message_rejected_before_payload() {
        let meta = Meta::new(1024, 0, 1);
        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader =
            MessageReader::with_config(Cursor::new(encode_header(&meta).to_vec()), cfg);
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 1024, max: 16 }));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(&[(8, b"ok")])),
        };
        let mut framed = MessageReader::new(reader);
        let message = framed.read_message().unwrap();

        assert_eq!(message.meta.opcode, 8);
        assert_eq!(message.payload.as_ref(), b"ok");
    }

    #[test]
    fn would_block_propagates_io_error() {
        let mut framed = MessageReader::new(WouldBlockReader);
        let err = framed.read_message().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn roundtrip_over_tcp() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let cfg = FrameConfig {
                read_timeout: Some(std::time::Duration::from_secs(5)),
                ..FrameConfig::default()
            };
            let mut reader = MessageReader::with_config_tcp(stream, cfg).unwrap();
            reader.read_message().unwrap()
        });

        let stream = TcpStream::connect(addr).unwrap();
        let mut writer = crate::writer::MessageWriter::new(stream);
        writer.send_payload(11, b"tcp").unwrap();

        let message = server.join().unwrap();
        assert_eq!(message.meta.opcode, 11);
        assert_eq!(message.payload.as_ref(), b"tcp");
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = MessageReader::new(Cursor::new(Vec::<u8>::new()));
        reader.set_max_payload_size(8);
        assert_eq!(reader.config().max_payload_size, 8);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct WouldBlockReader;

    impl Read for WouldBlockReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }
}
