use std::io::{ErrorKind, Write};
use std::time::Duration;

use bytes::BytesMut;
use seriallink_transport::SerialStream;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::ids::PacketId;
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete packet frames to any `Write` stream.
///
/// A frame is encoded into one buffer and written contiguously, so frames
/// from a single writer never interleave. Concurrent writers on the same port
/// are not coordinated.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a packet payload.
    ///
    /// A write that exceeds the stream's timeout yields
    /// [`FrameError::WriteTimeout`].
    pub fn send(&mut self, id: PacketId, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_frame(id, payload, &self.config, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(write_error(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(write_error(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<Box<dyn SerialStream>> {
    /// Create a frame writer for a serial stream and apply its write timeout.
    pub fn with_config_stream(
        mut inner: Box<dyn SerialStream>,
        config: FrameConfig,
        write_timeout: Duration,
    ) -> Result<Self> {
        inner
            .set_timeout(write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn write_error(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => FrameError::WriteTimeout,
        _ => FrameError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::{classify_line, decode_packet_header, Line};

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(600, &12345u32.to_le_bytes()).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"`600+\x39\x30\x00\x00~");
    }

    #[test]
    fn write_multiple_frames_back_to_back() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(0, &1u32.to_le_bytes()).unwrap();
        writer.send(1, &2u32.to_le_bytes()).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"`0+\x01\x00\x00\x00~`1+\x02\x00\x00\x00~");
    }

    #[test]
    fn custom_sigils_are_used() {
        let cfg = FrameConfig {
            start_sigil: b'<',
            separator: b':',
            end_sigil: b'>',
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg.clone());
        writer.send(7, b"ab").unwrap();
        assert_eq!(writer.get_ref().get_ref().as_slice(), b"<7:ab>");

        let echo_cfg = FrameConfig {
            inbound_sigil: b'<',
            ..cfg
        };
        let wire = bytes::Bytes::copy_from_slice(writer.get_ref().get_ref());
        let Line::Packet(candidate) = classify_line(wire, &echo_cfg) else {
            panic!("expected packet candidate");
        };
        let raw = decode_packet_header(candidate, &echo_cfg).unwrap();
        assert_eq!((raw.id, raw.payload.as_ref()), (7, b"ab".as_ref()));
    }

    #[test]
    fn short_writes_are_completed() {
        let mut writer = FrameWriter::new(OneByteWriter::default());
        writer.send(42, b"payload").unwrap();
        assert_eq!(writer.get_ref().written, b"`42+payload~");
        assert_eq!(writer.get_ref().flushes, 1);
    }

    #[test]
    fn timed_out_write_is_write_timeout() {
        let mut writer = FrameWriter::new(FailingWriter(ErrorKind::TimedOut));
        let err = writer.send(1, b"").unwrap_err();
        assert!(matches!(err, FrameError::WriteTimeout));
    }

    #[test]
    fn other_write_errors_propagate() {
        let mut writer = FrameWriter::new(FailingWriter(ErrorKind::BrokenPipe));
        let err = writer.send(1, b"").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn zero_length_write_is_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(1, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Default)]
    struct OneByteWriter {
        written: Vec<u8>,
        flushes: usize,
    }

    impl Write for OneByteWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match buf.first() {
                Some(b) => {
                    self.written.push(*b);
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    struct FailingWriter(ErrorKind);

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(self.0))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
