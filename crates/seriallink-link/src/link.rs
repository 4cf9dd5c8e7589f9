use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use seriallink_frame::{
    FrameError, FrameWriter, LineReader, NoExtraPackets, Packet, PacketBuilder, PacketId,
    PacketParser, UniversalParser, PING_REPLY, PING_REQUEST,
};
use seriallink_transport::{PortOpener, SerialPortOpener, SerialStream};
use tracing::{debug, info, warn};

use crate::config::{LinkConfig, WaitOptions};
use crate::error::{LinkError, Result};
use crate::queue::BoundedQueue;
use crate::reader::{AdmitAll, LineDispatcher, PacketFilter, ReaderHandle};
use crate::registry::InterfaceRegistry;

/// Lifecycle state of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

struct Connection {
    writer: Option<FrameWriter<Box<dyn SerialStream>>>,
    reader: Option<ReaderHandle>,
}

pub(crate) struct LinkShared {
    config: LinkConfig,
    opener: Arc<dyn PortOpener>,
    parser: UniversalParser,
    admit: Arc<dyn PacketFilter>,
    registry: Arc<InterfaceRegistry>,
    strings: Arc<BoundedQueue<String>>,
    packets: Arc<BoundedQueue<Packet>>,
    /// Reader thread is running.
    reading: AtomicBool,
    /// Reader was started and not stopped by the caller. Stays set while a
    /// write timeout cycles the connection.
    reader_wanted: AtomicBool,
    cancel_connect: AtomicBool,
    state: Mutex<ConnectionState>,
    conn: Mutex<Connection>,
}

impl LinkShared {
    fn port(&self) -> &str {
        &self.config.port.port
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn connect_locked(self: &Arc<Self>, conn: &mut Connection) -> Result<()> {
        if conn.writer.is_some() {
            debug!(port = %self.port(), "already connected");
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        let started = Instant::now();
        let mut attempts = 0u64;
        let writer = loop {
            if self.cancel_connect.load(Ordering::SeqCst) {
                self.set_state(ConnectionState::Disconnected);
                return Err(LinkError::Cancelled(self.port().to_string()));
            }

            attempts += 1;
            match self.open_writer() {
                Ok(writer) => break writer,
                Err(err) if attempts == 1 => {
                    warn!(port = %self.port(), error = %err, "open failed; retrying until the port appears");
                }
                Err(err) => {
                    debug!(port = %self.port(), attempts, error = %err, "open failed");
                }
            }

            if let Some(limit) = self.config.connect_timeout {
                if started.elapsed() >= limit {
                    self.set_state(ConnectionState::Disconnected);
                    return Err(LinkError::ConnectTimeout {
                        port: self.port().to_string(),
                        attempts,
                    });
                }
            }
            thread::sleep(self.config.connect_retry_interval);
        };

        conn.writer = Some(writer);
        self.set_state(ConnectionState::Connected);
        self.registry.register(self.port(), self);
        info!(
            port = %self.port(),
            baud_rate = self.config.port.baud_rate,
            attempts,
            "connected"
        );
        Ok(())
    }

    fn open_writer(&self) -> Result<FrameWriter<Box<dyn SerialStream>>> {
        let stream = self.opener.open(&self.config.port)?;
        let writer = FrameWriter::with_config_stream(
            stream,
            self.config.frame.clone(),
            self.config.port.write_timeout,
        )?;
        Ok(writer)
    }

    /// Tear the connection down. Returns false if it was already down.
    fn disconnect_locked(&self, conn: &mut Connection) -> bool {
        self.stop_reading_locked(conn);

        let was_open = conn.writer.take().is_some();
        self.set_state(ConnectionState::Disconnected);
        self.registry.deregister(self.port(), self);

        if was_open {
            info!(port = %self.port(), "disconnected");
            self.log_unread();
        }
        was_open
    }

    pub(crate) fn disconnect(&self) -> bool {
        self.cancel_connect.store(true, Ordering::SeqCst);
        let closed = {
            let mut conn = self.lock_conn();
            self.reader_wanted.store(false, Ordering::SeqCst);
            self.disconnect_locked(&mut conn)
        };
        self.cancel_connect.store(false, Ordering::SeqCst);
        closed
    }

    fn start_reading_locked(&self, conn: &mut Connection) -> Result<()> {
        if conn.reader.is_some() {
            warn!(port = %self.port(), "reader already running");
            return Ok(());
        }
        let Some(writer) = conn.writer.as_ref() else {
            return Err(LinkError::NotConnected(self.port().to_string()));
        };

        let stream = writer.get_ref().try_clone_stream()?;
        let lines = LineReader::with_config_stream(
            stream,
            self.config.frame.clone(),
            self.config.port.read_timeout,
        )?;
        let dispatcher = LineDispatcher {
            port: self.port().to_string(),
            frame: self.config.frame.clone(),
            parser: self.parser.clone(),
            admit: Arc::clone(&self.admit),
            strings: Arc::clone(&self.strings),
            packets: Arc::clone(&self.packets),
        };

        conn.reader = Some(ReaderHandle::spawn(
            lines,
            dispatcher,
            self.config.read_error_pause,
        )?);
        self.reading.store(true, Ordering::SeqCst);
        self.reader_wanted.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_reading_locked(&self, conn: &mut Connection) -> bool {
        self.reading.store(false, Ordering::SeqCst);
        match conn.reader.take() {
            Some(reader) => {
                reader.stop();
                true
            }
            None => false,
        }
    }

    fn log_unread(&self) {
        let strings = self.strings.snapshot();
        if !strings.is_empty() {
            warn!(port = %self.port(), count = strings.len(), unread = ?strings, "unread diagnostic lines");
        }
        let packets = self.packets.snapshot();
        if !packets.is_empty() {
            let unread: Vec<String> = packets.iter().map(Packet::to_string).collect();
            warn!(port = %self.port(), count = packets.len(), ?unread, "unread packets");
        }
    }
}

impl Drop for LinkShared {
    fn drop(&mut self) {
        let conn = self.conn.get_mut().unwrap_or_else(PoisonError::into_inner);
        self.reading.store(false, Ordering::SeqCst);
        if let Some(reader) = conn.reader.take() {
            reader.stop();
        }
        if conn.writer.take().is_some() {
            debug!(port = %self.config.port.port, "link dropped while connected");
        }
        self.registry.deregister(&self.config.port.port, self);
    }
}

/// A packet link over one serial port.
///
/// Cloning is cheap: clones share the port, the buffers and the reader.
/// The port is released when the last clone is dropped.
#[derive(Clone)]
pub struct SerialLink {
    inner: Arc<LinkShared>,
}

impl SerialLink {
    /// Start building a link for `config`.
    pub fn builder(config: LinkConfig) -> LinkBuilder {
        LinkBuilder::new(config)
    }

    /// Open the port, retrying every `connect_retry_interval` until it opens
    /// or `connect_timeout` elapses.
    ///
    /// Returns immediately if already connected. Returns
    /// [`LinkError::Cancelled`] if [`SerialLink::disconnect`] or
    /// [`InterfaceRegistry::close_all`] runs while retrying.
    pub fn connect(&self) -> Result<()> {
        let mut conn = self.inner.lock_conn();
        self.inner.connect_locked(&mut conn)
    }

    /// Stop the reader and release the port. Unread buffer contents are
    /// logged and kept.
    ///
    /// Returns false if the link was not connected.
    pub fn disconnect(&self) -> bool {
        self.inner.disconnect()
    }

    /// Start the background reader.
    ///
    /// Starting an already running reader logs a warning and does nothing.
    pub fn start_reading(&self) -> Result<()> {
        let mut conn = self.inner.lock_conn();
        self.inner.start_reading_locked(&mut conn)
    }

    /// Stop the background reader and wait for its thread to exit.
    pub fn stop_reading(&self) -> bool {
        let mut conn = self.inner.lock_conn();
        self.inner.reader_wanted.store(false, Ordering::SeqCst);
        self.inner.stop_reading_locked(&mut conn)
    }

    pub fn is_reading(&self) -> bool {
        self.inner.reading.load(Ordering::SeqCst)
    }

    /// True while the reader runs, and while a write timeout is bringing it
    /// back after a reconnect.
    pub(crate) fn reader_requested(&self) -> bool {
        self.inner.reader_wanted.load(Ordering::SeqCst)
    }

    /// Current lifecycle state. Does not wait for a connect in progress.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn port(&self) -> &str {
        self.inner.port()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }

    /// Frame and write one packet.
    ///
    /// Returns `Ok(false)` if the link is not connected, or if the write timed
    /// out. A timed-out write tears the connection down, reconnects (blocking
    /// until the port opens again) and restarts the reader if it was running;
    /// the packet itself is not resent.
    pub fn write_packet(&self, id: PacketId, payload: &[u8]) -> Result<bool> {
        let mut conn = self.inner.lock_conn();
        let Some(writer) = conn.writer.as_mut() else {
            warn!(port = %self.port(), packet_id = id, "write on a disconnected link");
            return Ok(false);
        };

        match writer.send(id, payload) {
            Ok(()) => {
                debug!(port = %self.port(), packet_id = id, len = payload.len(), "packet written");
                Ok(true)
            }
            Err(FrameError::WriteTimeout) => {
                warn!(port = %self.port(), packet_id = id, "write timed out; reconnecting");
                let was_reading = conn.reader.is_some();
                self.inner.disconnect_locked(&mut conn);
                let restored = self.inner.connect_locked(&mut conn).and_then(|()| {
                    if was_reading {
                        self.inner.start_reading_locked(&mut conn)
                    } else {
                        Ok(())
                    }
                });
                if let Err(err) = restored {
                    self.inner.reader_wanted.store(false, Ordering::SeqCst);
                    return Err(err);
                }
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Send a ping request carrying `seq`.
    pub fn write_ping_request(&self, seq: u32) -> Result<bool> {
        self.write_packet(PING_REQUEST, &PacketBuilder::new().put_u32(seq).finish())
    }

    /// Answer a ping request carrying `seq`.
    pub fn write_ping_reply(&self, seq: u32) -> Result<bool> {
        self.write_packet(PING_REPLY, &PacketBuilder::new().put_u32(seq).finish())
    }

    /// Send a ping request and wait for the reply with the same sequence number.
    ///
    /// Lines are split on `\n`, so a sequence number with a `0x0A` byte in its
    /// little-endian encoding (10, 266, ...) truncates the reply and never
    /// matches.
    ///
    /// Returns `Ok(None)` if the request could not be written or no reply
    /// arrived in time.
    pub fn ping(&self, seq: u32, opts: WaitOptions) -> Result<Option<Packet>> {
        if !self.write_ping_request(seq)? {
            return Ok(None);
        }
        self.wait_for_packet_matching(
            |packet| packet.id() == PING_REPLY && packet.sequence_num() == Some(seq),
            opts,
        )
    }

    /// The parsed-packet buffer.
    pub fn packets(&self) -> &BoundedQueue<Packet> {
        &self.inner.packets
    }

    /// The diagnostic-line buffer.
    pub fn strings(&self) -> &BoundedQueue<String> {
        &self.inner.strings
    }

    pub fn packet_available(&self) -> bool {
        !self.inner.packets.is_empty()
    }

    pub fn string_available(&self) -> bool {
        !self.inner.strings.is_empty()
    }

    /// Pop the oldest packet without blocking.
    pub fn try_read_packet(&self) -> Option<Packet> {
        self.warn_if_not_reading();
        self.inner.packets.pop_oldest()
    }

    /// Pop the oldest diagnostic line without blocking.
    pub fn try_read_string(&self) -> Option<String> {
        self.warn_if_not_reading();
        self.inner.strings.pop_oldest()
    }

    fn warn_if_not_reading(&self) {
        if !self.is_reading() {
            warn!(port = %self.port(), "reading from a link whose reader is not running");
        }
    }
}

impl fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialLink")
            .field("port", &self.port())
            .field("reading", &self.is_reading())
            .field("strings", &self.inner.strings.len())
            .field("packets", &self.inner.packets.len())
            .finish()
    }
}

/// Builder for [`SerialLink`].
pub struct LinkBuilder {
    config: LinkConfig,
    opener: Arc<dyn PortOpener>,
    parser: Arc<dyn PacketParser>,
    admit: Arc<dyn PacketFilter>,
    registry: Arc<InterfaceRegistry>,
}

impl LinkBuilder {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            opener: Arc::new(SerialPortOpener),
            parser: Arc::new(NoExtraPackets),
            admit: Arc::new(AdmitAll),
            registry: Arc::new(InterfaceRegistry::new()),
        }
    }

    /// Use a custom port opener (the default opens a real serial port).
    pub fn with_opener(mut self, opener: Arc<dyn PortOpener>) -> Self {
        self.opener = opener;
        self
    }

    /// Decoder for interface-specific packet ids.
    pub fn with_parser(mut self, parser: Arc<dyn PacketParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Only buffer packets this filter admits.
    pub fn with_admit(mut self, admit: Arc<dyn PacketFilter>) -> Self {
        self.admit = admit;
        self
    }

    /// Register the link in a shared registry.
    pub fn with_registry(mut self, registry: Arc<InterfaceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Build a disconnected link.
    pub fn build(self) -> SerialLink {
        let capacity = self.config.buffer_capacity;
        SerialLink {
            inner: Arc::new(LinkShared {
                parser: UniversalParser::new(self.parser),
                opener: self.opener,
                admit: self.admit,
                registry: self.registry,
                strings: Arc::new(BoundedQueue::new("strings", capacity)),
                packets: Arc::new(BoundedQueue::new("packets", capacity)),
                reading: AtomicBool::new(false),
                reader_wanted: AtomicBool::new(false),
                cancel_connect: AtomicBool::new(false),
                state: Mutex::new(ConnectionState::Disconnected),
                conn: Mutex::new(Connection {
                    writer: None,
                    reader: None,
                }),
                config: self.config,
            }),
        }
    }

    /// Build the link and connect it.
    pub fn connect(self) -> Result<SerialLink> {
        let link = self.build();
        link.connect()?;
        Ok(link)
    }
}

/// Connect to a real serial port with default settings and start its reader.
pub fn connect(
    port: impl Into<String>,
    baud_rate: u32,
    registry: Arc<InterfaceRegistry>,
) -> Result<SerialLink> {
    let link = SerialLink::builder(LinkConfig::new(port).with_baud_rate(baud_rate))
        .with_registry(registry)
        .connect()?;
    link.start_reading()?;
    Ok(link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }

    #[test]
    fn built_link_starts_disconnected() {
        let link = SerialLink::builder(LinkConfig::new("/dev/null-port")).build();
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(!link.is_reading());
        assert_eq!(link.port(), "/dev/null-port");
        assert!(!link.write_packet(5, b"x").unwrap());
        assert!(matches!(
            link.start_reading(),
            Err(LinkError::NotConnected(port)) if port == "/dev/null-port"
        ));
        assert!(!link.disconnect());
    }
}
