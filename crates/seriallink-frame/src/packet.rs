use std::collections::BTreeMap;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::ids::PacketId;

/// Field name holding the packet discriminant.
pub const PACKET_ID_FIELD: &str = "packetID";

/// Field name of the sequence number carried by ping packets.
pub const SEQUENCE_NUM_FIELD: &str = "sequenceNum";

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
}

impl FieldValue {
    /// The value as an unsigned integer, if it is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U8(v) => Some(u64::from(*v)),
            Self::U16(v) => Some(u64::from(*v)),
            Self::U32(v) => Some(u64::from(*v)),
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a float, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F32(v) => Some(f64::from(*v)),
            Self::F64(v) => Some(*v),
            other => other.as_u64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

macro_rules! impl_from_field {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        })*
    };
}

impl_from_field!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, f32 => F32, f64 => F64, String => Str);

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// A parsed packet: its ID plus named fields.
///
/// The ID is also present as the `packetID` field, so a packet reads as a
/// single name → value mapping. Field names are unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Packet {
    #[serde(skip)]
    id: PacketId,
    fields: BTreeMap<String, FieldValue>,
}

impl Packet {
    /// Create a packet holding only its ID.
    pub fn new(id: PacketId) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(PACKET_ID_FIELD.to_string(), FieldValue::U32(id));
        Self { id, fields }
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    /// Set a field, returning the previous value.
    ///
    /// The `packetID` field is fixed at construction and cannot be replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        let name = name.into();
        if name == PACKET_ID_FIELD {
            tracing::warn!(packet_id = self.id, "ignoring attempt to overwrite packetID");
            return None;
        }
        self.fields.insert(name, value.into())
    }

    /// Builder-style [`Packet::insert`].
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Unsigned integer field, widened to `u64`.
    pub fn get_uint(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(FieldValue::as_u64)
    }

    /// The ping sequence number, if this packet carries one.
    pub fn sequence_num(&self) -> Option<u32> {
        match self.get(SEQUENCE_NUM_FIELD) {
            Some(FieldValue::U32(v)) => Some(*v),
            _ => None,
        }
    }

    /// Iterate over all fields (including `packetID`) in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields, `packetID` included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{PACKET_ID_FIELD}: {}", self.id)?;
        for (name, value) in self.fields() {
            if name != PACKET_ID_FIELD {
                write!(f, ", {name}: {value}")?;
            }
        }
        write!(f, "}}")
    }
}

/// Builds an outbound payload. Multi-byte values are little-endian.
#[derive(Debug, Default)]
pub struct PacketBuilder {
    buf: BytesMut,
}

impl PacketBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    pub fn put_u16(mut self, value: u16) -> Self {
        self.buf.put_u16_le(value);
        self
    }

    pub fn put_u32(mut self, value: u32) -> Self {
        self.buf.put_u32_le(value);
        self
    }

    pub fn put_u64(mut self, value: u64) -> Self {
        self.buf.put_u64_le(value);
        self
    }

    pub fn put_f32(mut self, value: f32) -> Self {
        self.buf.put_f32_le(value);
        self
    }

    pub fn put_f64(mut self, value: f64) -> Self {
        self.buf.put_f64_le(value);
        self
    }

    /// A fixed-width string field, truncated or space-padded to `len` bytes.
    pub fn put_string(mut self, value: &str, len: usize) -> Self {
        let bytes = value.as_bytes();
        let take = bytes.len().min(len);
        self.buf.put_slice(&bytes[..take]);
        self.buf.put_bytes(b' ', len - take);
        self
    }

    pub fn put_slice(mut self, value: &[u8]) -> Self {
        self.buf.put_slice(value);
        self
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;

    #[test]
    fn packet_id_is_a_field() {
        let packet = Packet::new(1).with_field(SEQUENCE_NUM_FIELD, 5u32);
        assert_eq!(packet.id(), 1);
        assert_eq!(packet.get(PACKET_ID_FIELD), Some(&FieldValue::U32(1)));
        assert_eq!(packet.sequence_num(), Some(5));
        assert_eq!(packet.len(), 2);
    }

    #[test]
    fn packet_id_cannot_be_overwritten() {
        let mut packet = Packet::new(600);
        assert!(packet.insert(PACKET_ID_FIELD, 3u32).is_none());
        assert_eq!(packet.get_uint(PACKET_ID_FIELD), Some(600));
    }

    #[test]
    fn serializes_as_flat_map() {
        let packet = Packet::new(0).with_field(SEQUENCE_NUM_FIELD, 7u32);
        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json, serde_json::json!({ "packetID": 0, "sequenceNum": 7 }));
    }

    #[test]
    fn display_lists_fields() {
        let packet = Packet::new(600)
            .with_field("value", 12345u32)
            .with_field("name", "abc");
        assert_eq!(
            packet.to_string(),
            "{packetID: 600, name: \"abc\", value: 12345}"
        );
    }

    #[test]
    fn builder_matches_decoders() {
        let payload = PacketBuilder::new()
            .put_u32(12345)
            .put_f32(0.5)
            .put_string("hi", 4)
            .finish();

        let (v, rest) = decode::take_u32(&payload).unwrap();
        let (f, rest) = decode::take_f32(rest).unwrap();
        let (s, rest) = decode::take_string(rest, 4).unwrap();
        assert_eq!((v, f, s.as_str()), (12345, 0.5, "hi"));
        assert!(rest.is_empty());
    }
}
