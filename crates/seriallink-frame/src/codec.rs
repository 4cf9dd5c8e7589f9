use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::decode;
use crate::error::{FrameError, Result};
use crate::ids::PacketId;

/// Outbound start sigil: "`".
pub const DEFAULT_START_SIGIL: u8 = b'`';

/// Separator between the decimal packet ID and the payload: "+".
pub const DEFAULT_SEPARATOR: u8 = b'+';

/// Outbound end sigil: "~".
pub const DEFAULT_END_SIGIL: u8 = b'~';

/// First byte of an inbound packet line: "%".
pub const DEFAULT_INBOUND_SIGIL: u8 = b'%';

/// Default maximum inbound line length: 64 KiB.
pub const DEFAULT_MAX_LINE_LEN: usize = 64 * 1024;

/// Replacement text for a diagnostic line that is not valid ASCII.
pub const DECODE_ERROR_SENTINEL: &str = "seriallink: DECODE ERROR";

/// How an inbound packet candidate carries its ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdEncoding {
    /// Decimal ASCII digits terminated by the separator, mirroring outbound frames.
    #[default]
    Decimal,
    /// Four little-endian bytes directly after the sigil, no separator.
    BinaryLe32,
}

/// Configuration for the frame codec.
///
/// The outbound sigils and the inbound sigil are deliberately independent:
/// device firmware is free to announce packets with a different marker than
/// the one it expects to receive.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// First byte of every outbound frame.
    pub start_sigil: u8,
    /// Byte between the packet ID and the payload (both directions).
    pub separator: u8,
    /// Last byte of every outbound frame, stripped from inbound packets.
    pub end_sigil: u8,
    /// First byte marking an inbound line as a packet candidate.
    pub inbound_sigil: u8,
    /// ID encoding of inbound packet candidates.
    pub inbound_id_encoding: IdEncoding,
    /// Maximum inbound line length in bytes. Default: 64 KiB.
    pub max_line_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            start_sigil: DEFAULT_START_SIGIL,
            separator: DEFAULT_SEPARATOR,
            end_sigil: DEFAULT_END_SIGIL,
            inbound_sigil: DEFAULT_INBOUND_SIGIL,
            inbound_id_encoding: IdEncoding::Decimal,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

impl FrameConfig {
    /// A config whose inbound sigil equals the outbound start sigil, as seen
    /// by a peer that echoes our own frames back.
    pub fn symmetric() -> Self {
        Self {
            inbound_sigil: DEFAULT_START_SIGIL,
            ..Self::default()
        }
    }
}

/// Encode a packet into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────────┬───────────┬──────────────┬──────────┐
/// │ Start (1B) │ ID (decimal) │ Separator │ Payload      │ End (1B) │
/// │ "`"        │ "600"        │ "+"       │ (raw bytes)  │ "~"      │
/// └────────────┴──────────────┴───────────┴──────────────┴──────────┘
/// ```
pub fn encode_frame(id: PacketId, payload: &[u8], config: &FrameConfig, dst: &mut BytesMut) {
    let id = id.to_string();
    dst.reserve(3 + id.len() + payload.len());
    dst.put_u8(config.start_sigil);
    dst.put_slice(id.as_bytes());
    dst.put_u8(config.separator);
    dst.put_slice(payload);
    dst.put_u8(config.end_sigil);
}

/// A classified inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// Diagnostic text, trimmed.
    Text(String),
    /// Packet candidate with the inbound sigil stripped.
    Packet(Bytes),
}

/// Classify a raw line (without its `\n` terminator).
///
/// Never fails: a non-ASCII text line is replaced by [`DECODE_ERROR_SENTINEL`].
pub fn classify_line(line: Bytes, config: &FrameConfig) -> Line {
    if line.first() == Some(&config.inbound_sigil) {
        return Line::Packet(line.slice(1..));
    }

    if !line.is_ascii() {
        warn!(len = line.len(), raw = ?line, "diagnostic line is not ascii");
        return Line::Text(DECODE_ERROR_SENTINEL.to_string());
    }

    // ASCII is always valid UTF-8.
    let text = String::from_utf8_lossy(&line);
    Line::Text(text.trim().to_string())
}

/// A packet candidate split into its ID and payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: PacketId,
    pub payload: Bytes,
}

/// Split a packet candidate (sigil already stripped) into ID and payload.
pub fn decode_packet_header(candidate: Bytes, config: &FrameConfig) -> Result<RawPacket> {
    match config.inbound_id_encoding {
        IdEncoding::Decimal => {
            let body = strip_end_sigil(candidate, config.end_sigil);
            let sep = body
                .iter()
                .position(|b| *b == config.separator)
                .ok_or_else(|| FrameError::InvalidHeader("missing separator".to_string()))?;

            let digits = &body[..sep];
            if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
                return Err(FrameError::InvalidHeader(format!(
                    "non-decimal packet id {:?}",
                    String::from_utf8_lossy(digits)
                )));
            }

            let id = std::str::from_utf8(digits)
                .ok()
                .and_then(|s| s.parse::<PacketId>().ok())
                .ok_or_else(|| FrameError::InvalidHeader("packet id out of range".to_string()))?;

            Ok(RawPacket {
                id,
                payload: body.slice(sep + 1..),
            })
        }
        IdEncoding::BinaryLe32 => {
            let (id, _) = decode::take_u32(&candidate)?;
            Ok(RawPacket {
                id,
                payload: candidate.slice(4..),
            })
        }
    }
}

/// Remove one trailing end sigil, tolerating a `\r` left by `println`.
fn strip_end_sigil(body: Bytes, end_sigil: u8) -> Bytes {
    let len = body.len();
    if body.ends_with(&[end_sigil, b'\r']) {
        body.slice(..len - 2)
    } else if body.ends_with(&[end_sigil]) {
        body.slice(..len - 1)
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_layout() {
        let mut buf = BytesMut::new();
        encode_frame(600, &[0x39, 0x30, 0x00, 0x00], &FrameConfig::default(), &mut buf);
        assert_eq!(buf.as_ref(), b"`600+\x39\x30\x00\x00~");
    }

    #[test]
    fn encode_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(0, b"", &FrameConfig::default(), &mut buf);
        assert_eq!(buf.as_ref(), b"`0+~");
    }

    #[test]
    fn classify_text_is_trimmed() {
        let line = classify_line(Bytes::from_static(b"  Boot OK\r"), &FrameConfig::default());
        assert_eq!(line, Line::Text("Boot OK".to_string()));
    }

    #[test]
    fn classify_packet_strips_sigil() {
        let line = classify_line(Bytes::from_static(b"%1+abcd~"), &FrameConfig::default());
        assert_eq!(line, Line::Packet(Bytes::from_static(b"1+abcd~")));
    }

    #[test]
    fn classify_non_ascii_yields_sentinel() {
        let line = classify_line(Bytes::from_static(b"temp \xB0C"), &FrameConfig::default());
        assert_eq!(line, Line::Text(DECODE_ERROR_SENTINEL.to_string()));
    }

    #[test]
    fn outbound_sigil_is_text_under_default_config() {
        // Inbound and outbound sigils differ by default.
        let line = classify_line(Bytes::from_static(b"`1+x~"), &FrameConfig::default());
        assert!(matches!(line, Line::Text(_)));
    }

    #[test]
    fn decimal_header_roundtrip() {
        let config = FrameConfig::symmetric();
        let payload = 7u32.to_le_bytes();
        let mut wire = BytesMut::new();
        encode_frame(1, &payload, &config, &mut wire);

        let Line::Packet(candidate) = classify_line(wire.freeze(), &config) else {
            panic!("expected packet candidate");
        };
        let raw = decode_packet_header(candidate, &config).unwrap();
        assert_eq!(raw.id, 1);
        assert_eq!(raw.payload.as_ref(), &payload);
    }

    #[test]
    fn decimal_header_tolerates_carriage_return() {
        let raw = decode_packet_header(Bytes::from_static(b"42+ab~\r"), &FrameConfig::default())
            .unwrap();
        assert_eq!(raw.id, 42);
        assert_eq!(raw.payload.as_ref(), b"ab");
    }

    #[test]
    fn payload_ending_in_sigil_byte_keeps_it() {
        let raw =
            decode_packet_header(Bytes::from_static(b"3+a~~"), &FrameConfig::default()).unwrap();
        assert_eq!(raw.payload.as_ref(), b"a~");
    }

    #[test]
    fn missing_separator_is_invalid() {
        let err = decode_packet_header(Bytes::from_static(b"12~"), &FrameConfig::default())
            .unwrap_err();
        assert!(matches!(err, FrameError::InvalidHeader(_)));
    }

    #[test]
    fn non_decimal_id_is_invalid() {
        let err = decode_packet_header(Bytes::from_static(b"1x+~"), &FrameConfig::default())
            .unwrap_err();
        assert!(matches!(err, FrameError::InvalidHeader(_)));
    }

    #[test]
    fn binary_header() {
        let config = FrameConfig {
            inbound_id_encoding: IdEncoding::BinaryLe32,
            ..FrameConfig::default()
        };
        let raw = decode_packet_header(
            Bytes::from_static(&[0x58, 0x02, 0x00, 0x00, 0xAA, 0xBB]),
            &config,
        )
        .unwrap();
        assert_eq!(raw.id, 600);
        assert_eq!(raw.payload.as_ref(), &[0xAA, 0xBB]);
    }

    #[test]
    fn binary_header_too_short() {
        let config = FrameConfig {
            inbound_id_encoding: IdEncoding::BinaryLe32,
            ..FrameConfig::default()
        };
        let err = decode_packet_header(Bytes::from_static(&[0x01, 0x00]), &config).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InsufficientBytes {
                needed: 4,
                available: 2
            }
        ));
    }
}
