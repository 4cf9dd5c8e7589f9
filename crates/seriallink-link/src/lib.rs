//! Serial link management for packet-framed device communication.
//!
//! This is the "just works" layer. Open a port (retrying until the device
//! shows up), start the background reader, then wait for packets or
//! diagnostic lines with timeout-bounded combinators while writing packets
//! back. A write timeout triggers a transparent reconnect.

pub mod config;
pub mod error;
pub mod link;
pub mod queue;
pub mod reader;
pub mod registry;
pub mod wait;

pub use config::{
    LinkConfig, MatchPolicy, WaitOptions, DEFAULT_BUFFER_CAPACITY, DEFAULT_POLL_DELAY,
};
pub use error::{LinkError, Result};
pub use link::{connect, ConnectionState, LinkBuilder, SerialLink};
pub use queue::BoundedQueue;
pub use reader::{AdmitAll, PacketFilter};
pub use registry::InterfaceRegistry;
