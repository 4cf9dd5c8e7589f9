use std::io::{ErrorKind, Read};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use seriallink_transport::SerialStream;

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 256;

/// Reads newline-terminated lines from any `Read` stream.
///
/// Handles partial reads internally: bytes of an unfinished line are kept
/// across calls, including across read timeouts.
pub struct LineReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> LineReader<T> {
    /// Create a new line reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new line reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete line (blocking), without its `\n`.
    ///
    /// Returns `Ok(None)` when the stream's read timeout elapses before a
    /// full line arrived. Returns `Err(FrameError::ConnectionClosed)` at EOF.
    pub fn read_line(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
                let mut line = self.buf.split_to(pos + 1);
                line.truncate(pos);
                if line.len() > self.config.max_line_len {
                    return Err(FrameError::LineTooLong {
                        size: line.len(),
                        max: self.config.max_line_len,
                    });
                }
                return Ok(Some(line.freeze()));
            }

            if self.buf.len() > self.config.max_line_len {
                let size = self.buf.len();
                self.buf.clear();
                return Err(FrameError::LineTooLong {
                    size,
                    max: self.config.max_line_len,
                });
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(None)
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Number of buffered bytes belonging to an unfinished line.
    pub fn pending(&self) -> usize {
        self.buf.len()
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

    /// Current line reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl LineReader<Box<dyn SerialStream>> {
    /// Create a line reader for a serial stream and apply its read timeout.
    pub fn with_config_stream(
        mut inner: Box<dyn SerialStream>,
        config: FrameConfig,
        read_timeout: Duration,
    ) -> Result<Self> {
        inner
            .set_timeout(read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: seriallink_transport::TransportError) -> FrameError {
    match err {
        seriallink_transport::TransportError::Io(io) => FrameError::Io(io),
        seriallink_transport::TransportError::Open { source, .. }
        | seriallink_transport::TransportError::Configure { source, .. } => FrameError::Io(source),
        seriallink_transport::TransportError::Closed => FrameError::ConnectionClosed,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn read_single_line() {
        let mut reader = LineReader::new(Cursor::new(b"hello\n".to_vec()));
        let line = reader.read_line().unwrap().unwrap();
        assert_eq!(line.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_lines_keeps_carriage_return() {
        let mut reader = LineReader::new(Cursor::new(b"one\r\ntwo\n%1+x~\n".to_vec()));

        assert_eq!(reader.read_line().unwrap().unwrap().as_ref(), b"one\r");
        assert_eq!(reader.read_line().unwrap().unwrap().as_ref(), b"two");
        assert_eq!(reader.read_line().unwrap().unwrap().as_ref(), b"%1+x~");
    }

    #[test]
    fn empty_line_is_returned_empty() {
        let mut reader = LineReader::new(Cursor::new(b"\nx\n".to_vec()));
        assert!(reader.read_line().unwrap().unwrap().is_empty());
        assert_eq!(reader.read_line().unwrap().unwrap().as_ref(), b"x");
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: b"slow line\n".to_vec(),
            pos: 0,
        };
        let mut reader = LineReader::new(byte_reader);
        assert_eq!(reader.read_line().unwrap().unwrap().as_ref(), b"slow line");
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = LineReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_line().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_line() {
        let mut reader = LineReader::new(Cursor::new(b"unterminated".to_vec()));
        let err = reader.read_line().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert_eq!(reader.pending(), 12);
    }

    #[test]
    fn timeout_keeps_partial_line() {
        let reader = TimeoutBetweenChunks {
            chunks: vec![b"par".to_vec(), b"tial\n".to_vec()],
            next: 0,
            timed_out: false,
        };
        let mut framed = LineReader::new(reader);

        assert!(framed.read_line().unwrap().is_none());
        assert_eq!(framed.pending(), 3);
        assert_eq!(framed.read_line().unwrap().unwrap().as_ref(), b"partial");
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            state: 0,
            bytes: b"ok\n".to_vec(),
            pos: 0,
        };
        let mut framed = LineReader::new(reader);
        assert_eq!(framed.read_line().unwrap().unwrap().as_ref(), b"ok");
    }

    #[test]
    fn oversized_line_is_discarded() {
        let cfg = FrameConfig {
            max_line_len: 8,
            ..FrameConfig::default()
        };
        let mut wire = vec![b'a'; 300];
        wire.extend_from_slice(b"\nshort\n");
        let mut reader = LineReader::with_config(Cursor::new(wire), cfg);

        let err = reader.read_line().unwrap_err();
        assert!(matches!(err, FrameError::LineTooLong { max: 8, .. }));
    }

    #[test]
    fn other_io_errors_propagate() {
        let mut reader = LineReader::new(BrokenReader);
        let err = reader.read_line().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = LineReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        assert_eq!(reader.config().max_line_len, crate::DEFAULT_MAX_LINE_LEN);
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
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

    struct TimeoutBetweenChunks {
        chunks: Vec<Vec<u8>>,
        next: usize,
        timed_out: bool,
    }

    impl Read for TimeoutBetweenChunks {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.next > 0 && !self.timed_out {
                self.timed_out = true;
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            let Some(chunk) = self.chunks.get(self.next) else {
                return Ok(0);
            };
            self.next += 1;
            self.timed_out = false;
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }
}
