use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use seriallink_frame::{
    classify_line, decode_packet_header, FrameConfig, FrameError, Line, LineReader, Packet,
    UniversalParser,
};
use seriallink_transport::SerialStream;
use tracing::{debug, trace, warn};

use crate::error::{LinkError, Result};
use crate::queue::BoundedQueue;

/// Decides which parsed packets are buffered.
///
/// Applied to every successfully parsed packet before it is queued. Packets
/// that are not admitted are dropped silently.
pub trait PacketFilter: Send + Sync {
    fn admit(&self, packet: &Packet) -> bool;
}

impl<F> PacketFilter for F
where
    F: Fn(&Packet) -> bool + Send + Sync,
{
    fn admit(&self, packet: &Packet) -> bool {
        self(packet)
    }
}

/// Filter that buffers every packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmitAll;

impl PacketFilter for AdmitAll {
    fn admit(&self, _packet: &Packet) -> bool {
        true
    }
}

/// Routes inbound lines into the string and packet buffers.
pub(crate) struct LineDispatcher {
    pub(crate) port: String,
    pub(crate) frame: FrameConfig,
    pub(crate) parser: UniversalParser,
    pub(crate) admit: Arc<dyn PacketFilter>,
    pub(crate) strings: Arc<BoundedQueue<String>>,
    pub(crate) packets: Arc<BoundedQueue<Packet>>,
}

impl LineDispatcher {
    pub(crate) fn dispatch(&self, line: Bytes) {
        if line.is_empty() {
            return;
        }

        match classify_line(line, &self.frame) {
            Line::Text(text) => {
                if text.is_empty() {
                    return;
                }
                trace!(port = %self.port, %text, "diagnostic line");
                if let Err(err) = self.strings.push(text) {
                    warn!(port = %self.port, error = %err, "dropping diagnostic line");
                }
            }
            Line::Packet(candidate) => self.dispatch_packet(candidate),
        }
    }

    fn dispatch_packet(&self, candidate: Bytes) {
        let raw = match decode_packet_header(candidate, &self.frame) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(port = %self.port, error = %err, "dropping malformed packet");
                return;
            }
        };

        let parsed = match self.parser.parse_raw(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    port = %self.port,
                    packet_id = raw.id,
                    error = %err,
                    "dropping undecodable packet"
                );
                return;
            }
        };

        if !parsed.recognized {
            debug!(port = %self.port, packet_id = raw.id, "unrecognized packet id");
        }
        if !parsed.remaining.is_empty() {
            debug!(
                port = %self.port,
                packet_id = raw.id,
                trailing = parsed.remaining.len(),
                "packet has trailing bytes"
            );
        }

        if !self.admit.admit(&parsed.packet) {
            trace!(port = %self.port, packet_id = raw.id, "packet not admitted");
            return;
        }

        if let Err(err) = self.packets.push(parsed.packet) {
            warn!(port = %self.port, packet_id = raw.id, error = %err, "dropping packet");
        }
    }
}

/// Handle to a running background reader thread.
pub(crate) struct ReaderHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReaderHandle {
    /// Spawn the reader loop on its own thread.
    pub(crate) fn spawn(
        lines: LineReader<Box<dyn SerialStream>>,
        dispatcher: LineDispatcher,
        error_pause: Duration,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let name = format!("seriallink-reader-{}", dispatcher.port);

        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || run(lines, dispatcher, flag, error_pause))
            .map_err(LinkError::Spawn)?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Ask the loop to stop and wait for it.
    ///
    /// The loop checks its stop flag between reads, so this returns within
    /// one read timeout (or one error pause).
    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("reader thread panicked");
            }
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ReaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderHandle")
            .field("stopping", &self.stop.load(Ordering::SeqCst))
            .finish()
    }
}

fn run(
    mut lines: LineReader<Box<dyn SerialStream>>,
    dispatcher: LineDispatcher,
    stop: Arc<AtomicBool>,
    error_pause: Duration,
) {
    debug!(port = %dispatcher.port, "reader started");

    while !stop.load(Ordering::SeqCst) {
        match lines.read_line() {
            Ok(Some(line)) => dispatcher.dispatch(line),
            Ok(None) => {}
            Err(FrameError::LineTooLong { size, max }) => {
                warn!(port = %dispatcher.port, size, max, "discarding oversized line");
            }
            Err(err) => {
                warn!(port = %dispatcher.port, error = %err, "read failed");
                thread::sleep(error_pause);
            }
        }
    }

    debug!(port = %dispatcher.port, "reader stopped");
}
