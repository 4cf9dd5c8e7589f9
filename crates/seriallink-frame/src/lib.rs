//! Sigil-delimited packet framing for serial links.
//!
//! Outbound packets are framed as:
//! - a start sigil
//! - the packet ID in decimal ASCII
//! - a field separator
//! - the raw payload bytes
//! - an end sigil
//!
//! Inbound data arrives as newline-terminated lines. A line starting with the
//! inbound packet sigil is a packet candidate; anything else is diagnostic
//! text printed by the device. The outbound and inbound sigils are configured
//! independently.

pub mod codec;
pub mod decode;
pub mod error;
pub mod ids;
pub mod packet;
pub mod parser;
pub mod reader;
pub mod writer;

pub use codec::{
    classify_line, decode_packet_header, encode_frame, FrameConfig, IdEncoding, Line, RawPacket,
    DECODE_ERROR_SENTINEL, DEFAULT_MAX_LINE_LEN,
};
pub use error::{FrameError, Result};
pub use ids::{PacketId, PING_REPLY, PING_REQUEST, USER_PACKET_START};
pub use packet::{FieldValue, Packet, PacketBuilder, PACKET_ID_FIELD, SEQUENCE_NUM_FIELD};
pub use parser::{NoExtraPackets, PacketParser, Parsed, UniversalParser};
pub use reader::LineReader;
pub use writer::FrameWriter;
