use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{PortOpener, PortSettings, SerialStream};

/// Serial port stream backed by the `serialport` driver.
pub struct SerialPortStream {
    inner: Box<dyn serialport::SerialPort>,
    port: String,
}

impl SerialPortStream {
    /// Open `settings.port` as 8N1 without flow control.
    ///
    /// The handle starts with the read timeout applied; the writer side is
    /// expected to clone and switch to the write timeout.
    pub fn open(settings: &PortSettings) -> Result<Self> {
        let inner = serialport::new(settings.port.as_str(), settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| TransportError::Open {
                port: settings.port.clone(),
                source: e.into(),
            })?;

        debug!(port = %settings.port, baud = settings.baud_rate, "opened serial port");

        Ok(Self {
            inner,
            port: settings.port.clone(),
        })
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "serial-port"
    }
}

impl Read for SerialPortStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for SerialPortStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl SerialStream for SerialPortStream {
    fn try_clone_stream(&self) -> Result<Box<dyn SerialStream>> {
        let cloned = self
            .inner
            .try_clone()
            .map_err(|e| TransportError::Io(e.into()))?;
        Ok(Box::new(Self {
            inner: cloned,
            port: self.port.clone(),
        }))
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.inner
            .set_timeout(timeout)
            .map_err(|e| TransportError::Configure {
                port: self.port.clone(),
                source: e.into(),
            })
    }

    fn port_name(&self) -> &str {
        &self.port
    }
}

impl std::fmt::Debug for SerialPortStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortStream")
            .field("port", &self.port)
            .field("type", &self.transport_name())
            .finish()
    }
}

/// [`PortOpener`] for physical (or OS-level virtual) serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortOpener;

impl PortOpener for SerialPortOpener {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialStream>> {
        Ok(Box::new(SerialPortStream::open(settings)?))
    }
}
