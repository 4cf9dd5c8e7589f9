use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Default baud rate used by the device firmware.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout. Bounds how long a blocked line read may delay a
/// reader stop request.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Default write timeout. A write exceeding it is reported as timed out.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// A connected serial stream (Read + Write).
///
/// Two handles to the same port are needed at once (the background reader
/// and the writer), so implementations must support cloning the underlying
/// handle. Read and write timeouts are applied per handle.
pub trait SerialStream: Read + Write + Send + fmt::Debug {
    /// Create a second handle onto the same open port.
    fn try_clone_stream(&self) -> Result<Box<dyn SerialStream>>;

    /// Set the timeout used for blocking reads and writes on this handle.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Port identifier this stream was opened on.
    fn port_name(&self) -> &str;
}

/// Opens a serial stream from connection parameters.
///
/// Port discovery lives outside this crate; the opener is handed an already
/// chosen port identifier.
pub trait PortOpener: Send + Sync {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialStream>>;
}

/// Connection parameters for opening a port (always 8N1, no flow control).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    /// Opaque port identifier, e.g. `/dev/ttyACM0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl PortSettings {
    /// Settings for `port` with default baud rate and timeouts.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}
