//! Byte-stream transport abstraction for serial links.
//!
//! Provides a unified interface over the physical port driver:
//! - [`SerialStream`]: a connected, cloneable `Read + Write` handle
//! - [`PortOpener`]: the open primitive, given a port identifier and baud rate
//!
//! This is the lowest layer of seriallink. Everything else builds on top of
//! the traits defined here, so tests and simulators can substitute their own
//! streams for real hardware.

pub mod error;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{SerialPortOpener, SerialPortStream};
pub use traits::{PortOpener, PortSettings, SerialStream};
