#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use seriallink_frame::{decode, Packet, PacketId, Parsed};
use seriallink_link::{InterfaceRegistry, LinkConfig, SerialLink};
use seriallink_transport::{PortOpener, PortSettings, SerialStream, TransportError};

pub const INT_PACKET: PacketId = 600;

/// Shared state behind every handle the mock opener hands out.
#[derive(Default)]
pub struct PortState {
    inbound: Mutex<VecDeque<u8>>,
    written: Mutex<Vec<u8>>,
    write_timeouts: AtomicUsize,
    open_failures: AtomicUsize,
    opens: AtomicUsize,
}

impl PortState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bytes the device "sends".
    pub fn feed(&self, bytes: &[u8]) {
        self.inbound.lock().unwrap().extend(bytes.iter().copied());
    }

    /// Bytes the link wrote.
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.write_timeouts.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_opens(&self, count: usize) {
        self.open_failures.store(count, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

pub struct MockOpener {
    pub state: Arc<PortState>,
}

impl PortOpener for MockOpener {
    fn open(&self, settings: &PortSettings) -> seriallink_transport::Result<Box<dyn SerialStream>> {
        if take_one(&self.state.open_failures) {
            return Err(TransportError::Open {
                port: settings.port.clone(),
                source: io::Error::new(ErrorKind::NotFound, "no such device"),
            });
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            state: Arc::clone(&self.state),
            name: settings.port.clone(),
            timeout: settings.read_timeout,
        }))
    }
}

pub struct MockStream {
    state: Arc<PortState>,
    name: String,
    timeout: Duration,
}

impl std::fmt::Debug for MockStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStream").field("name", &self.name).finish()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        {
            let mut inbound = self.state.inbound.lock().unwrap();
            if !inbound.is_empty() {
                let n = buf.len().min(inbound.len());
                for (slot, byte) in buf.iter_mut().zip(inbound.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
        }
        thread::sleep(self.timeout.min(Duration::from_millis(5)));
        Err(io::Error::from(ErrorKind::TimedOut))
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if take_one(&self.state.write_timeouts) {
            return Err(io::Error::from(ErrorKind::TimedOut));
        }
        self.state.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialStream for MockStream {
    fn try_clone_stream(&self) -> seriallink_transport::Result<Box<dyn SerialStream>> {
        Ok(Box::new(MockStream {
            state: Arc::clone(&self.state),
            name: self.name.clone(),
            timeout: self.timeout,
        }))
    }

    fn set_timeout(&mut self, timeout: Duration) -> seriallink_transport::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

pub fn parse_int_packet<'a>(
    mut packet: Packet,
    payload: &'a [u8],
) -> seriallink_frame::Result<Parsed<'a>> {
    if packet.id() != INT_PACKET {
        return Ok(Parsed::unrecognized(packet, payload));
    }
    let (value, remaining) = decode::take_u32(payload)?;
    packet.insert("value", value);
    Ok(Parsed {
        packet,
        remaining,
        recognized: true,
    })
}

pub fn fast_config(port: &str) -> LinkConfig {
    let mut config = LinkConfig::new(port);
    config.connect_retry_interval = Duration::from_millis(10);
    config.read_error_pause = Duration::from_millis(10);
    config.port.read_timeout = Duration::from_millis(10);
    config
}

/// A disconnected link on a mock port.
pub fn mock_link(port: &str, state: &Arc<PortState>, registry: &Arc<InterfaceRegistry>) -> SerialLink {
    SerialLink::builder(fast_config(port))
        .with_opener(Arc::new(MockOpener {
            state: Arc::clone(state),
        }))
        .with_parser(Arc::new(parse_int_packet))
        .with_registry(Arc::clone(registry))
        .build()
}

/// A connected link with its reader running.
pub fn reading_link(port: &str) -> (SerialLink, Arc<PortState>, Arc<InterfaceRegistry>) {
    let state = PortState::new();
    let registry = Arc::new(InterfaceRegistry::new());
    let link = mock_link(port, &state, &registry);
    link.connect().unwrap();
    link.start_reading().unwrap();
    (link, state, registry)
}

/// An inbound packet line as the device firmware frames it.
pub fn packet_line(id: PacketId, payload: &[u8]) -> Vec<u8> {
    let mut line = format!("%{id}+").into_bytes();
    line.extend_from_slice(payload);
    line.extend_from_slice(b"~\r\n");
    line
}

pub fn ping_reply_line(seq: u32) -> Vec<u8> {
    packet_line(1, &seq.to_le_bytes())
}

pub fn ping_request_line(seq: u32) -> Vec<u8> {
    packet_line(0, &seq.to_le_bytes())
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}
