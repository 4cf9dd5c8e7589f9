use std::sync::Arc;

use crate::codec::RawPacket;
use crate::decode;
use crate::error::Result;
use crate::ids::{is_universal, PacketId};
use crate::packet::{Packet, SEQUENCE_NUM_FIELD};

/// Result of parsing one packet payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<'a> {
    /// The packet with decoded fields added.
    pub packet: Packet,
    /// Payload bytes left over after decoding.
    pub remaining: &'a [u8],
    /// Whether the parser knew this packet ID.
    pub recognized: bool,
}

impl<'a> Parsed<'a> {
    /// The parser did not know this ID; the packet is passed through untouched.
    pub fn unrecognized(packet: Packet, payload: &'a [u8]) -> Self {
        Self {
            packet,
            remaining: payload,
            recognized: false,
        }
    }
}

/// Decodes interface-specific packet kinds.
///
/// Implementations receive a packet that already holds its ID and add the
/// fields they decode from `payload`. Decoding failures (typically
/// [`FrameError::InsufficientBytes`](crate::FrameError::InsufficientBytes))
/// are returned as errors; the caller drops the packet and carries on.
pub trait PacketParser: Send + Sync {
    fn parse<'a>(&self, packet: Packet, payload: &'a [u8]) -> Result<Parsed<'a>>;
}

impl<F> PacketParser for F
where
    F: for<'a> Fn(Packet, &'a [u8]) -> Result<Parsed<'a>> + Send + Sync,
{
    fn parse<'a>(&self, packet: Packet, payload: &'a [u8]) -> Result<Parsed<'a>> {
        self(packet, payload)
    }
}

/// Delegate for interfaces without packet kinds of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtraPackets;

impl PacketParser for NoExtraPackets {
    fn parse<'a>(&self, packet: Packet, payload: &'a [u8]) -> Result<Parsed<'a>> {
        Ok(Parsed::unrecognized(packet, payload))
    }
}

/// Decodes the universal packet kinds and hands everything else to a delegate.
#[derive(Clone)]
pub struct UniversalParser {
    delegate: Arc<dyn PacketParser>,
}

impl UniversalParser {
    pub fn new(delegate: Arc<dyn PacketParser>) -> Self {
        Self { delegate }
    }

    /// Parse a payload for `id` into a fresh packet.
    pub fn parse_id<'a>(&self, id: PacketId, payload: &'a [u8]) -> Result<Parsed<'a>> {
        self.parse(Packet::new(id), payload)
    }

    /// Parse a header-decoded packet candidate.
    pub fn parse_raw<'a>(&self, raw: &'a RawPacket) -> Result<Parsed<'a>> {
        self.parse_id(raw.id, &raw.payload)
    }
}

impl Default for UniversalParser {
    fn default() -> Self {
        Self::new(Arc::new(NoExtraPackets))
    }
}

impl std::fmt::Debug for UniversalParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniversalParser").finish_non_exhaustive()
    }
}

impl PacketParser for UniversalParser {
    fn parse<'a>(&self, mut packet: Packet, payload: &'a [u8]) -> Result<Parsed<'a>> {
        match packet.id() {
            id if is_universal(id) => {
                let (sequence_num, remaining) = decode::take_u32(payload)?;
                packet.insert(SEQUENCE_NUM_FIELD, sequence_num);
                Ok(Parsed {
                    packet,
                    remaining,
                    recognized: true,
                })
            }
            _ => self.delegate.parse(packet, payload),
        }
    }
}
