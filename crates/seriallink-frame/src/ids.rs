//! Built-in packet IDs.
//!
//! IDs 0-199 are reserved for universal packet kinds understood by every
//! interface. IDs from 200 upward are available for interface-specific kinds;
//! interfaces conventionally claim a block of 100 (e.g. 600-699).

/// Packet identifier as carried on the wire.
pub type PacketId = u32;

/// Ping request, payload: little-endian `u32` sequence number.
pub const PING_REQUEST: PacketId = 0;

/// Ping reply, payload: little-endian `u32` sequence number.
pub const PING_REPLY: PacketId = 1;

/// First interface-specific packet ID.
pub const USER_PACKET_START: PacketId = 200;

/// Returns a human-readable name for a packet ID.
pub fn packet_name(id: PacketId) -> &'static str {
    match id {
        PING_REQUEST => "PING_REQUEST",
        PING_REPLY => "PING_REPLY",
        2..=199 => "RESERVED",
        _ => "USER",
    }
}

/// Returns true if the ID is in the universal (reserved) range.
pub fn is_reserved(id: PacketId) -> bool {
    id < USER_PACKET_START
}

/// Returns true if the ID is decoded by the built-in parser.
pub fn is_universal(id: PacketId) -> bool {
    id <= PING_REPLY
}
