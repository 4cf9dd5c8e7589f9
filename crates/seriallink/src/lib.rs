//! Packet-framed communication with microcontrollers over serial ports.
//!
//! A device and a host exchange small binary packets and free-form diagnostic
//! lines over one serial byte stream. This crate bundles the layers:
//!
//! - [`transport`]: byte-stream abstraction and the serial port backend
//! - [`frame`]: sigil-delimited framing, line classification, packet parsing
//! - [`link`]: connection lifecycle, background reader, buffers, wait combinators
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use seriallink::link::{connect, InterfaceRegistry, WaitOptions};
//!
//! # fn main() -> seriallink::link::Result<()> {
//! let registry = Arc::new(InterfaceRegistry::new());
//! let link = connect("/dev/ttyACM0", 9600, registry)?;
//! let reply = link.ping(7, WaitOptions::timeout(Duration::from_secs(2)))?;
//! println!("{reply:?}");
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use seriallink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use seriallink_frame::*;
}

/// Re-export link types.
pub mod link {
    pub use seriallink_link::*;
}
