//! Primitive payload decoders.
//!
//! Each decoder consumes a fixed-width prefix of `src` and returns the value
//! together with the remaining bytes. Multi-byte values are little-endian.

use bytes::Buf;

use crate::error::{FrameError, Result};

fn ensure(src: &[u8], needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(FrameError::InsufficientBytes {
            needed,
            available: src.len(),
        });
    }
    Ok(())
}

pub fn take_u8(mut src: &[u8]) -> Result<(u8, &[u8])> {
    ensure(src, 1)?;
    let value = src.get_u8();
    Ok((value, src))
}

pub fn take_u16(mut src: &[u8]) -> Result<(u16, &[u8])> {
    ensure(src, 2)?;
    let value = src.get_u16_le();
    Ok((value, src))
}

pub fn take_u32(mut src: &[u8]) -> Result<(u32, &[u8])> {
    ensure(src, 4)?;
    let value = src.get_u32_le();
    Ok((value, src))
}

pub fn take_u64(mut src: &[u8]) -> Result<(u64, &[u8])> {
    ensure(src, 8)?;
    let value = src.get_u64_le();
    Ok((value, src))
}

pub fn take_f32(mut src: &[u8]) -> Result<(f32, &[u8])> {
    ensure(src, 4)?;
    let value = src.get_f32_le();
    Ok((value, src))
}

pub fn take_f64(mut src: &[u8]) -> Result<(f64, &[u8])> {
    ensure(src, 8)?;
    let value = src.get_f64_le();
    Ok((value, src))
}

/// A single raw byte (a C `char`). Stored as a [`FieldValue::U8`](crate::FieldValue::U8).
pub fn take_byte(src: &[u8]) -> Result<(u8, &[u8])> {
    take_u8(src)
}

/// A fixed-length ASCII string, trimmed of surrounding whitespace.
///
/// Non-ASCII bytes are replaced rather than rejected; the width is consumed
/// either way.
pub fn take_string(src: &[u8], len: usize) -> Result<(String, &[u8])> {
    ensure(src, len)?;
    let (head, rest) = src.split_at(len);
    let text = String::from_utf8_lossy(head);
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    Ok((text.to_string(), rest))
}
