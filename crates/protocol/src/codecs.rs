//! Little-endian field codecs over unescaped payloads
//!
//! Readers take any [`Buf`] (usually `&[u8]`) and check the remaining length
//! before every read, so a short payload is an `UnexpectedEof` instead of a
//! panic. Writers append to a [`BytesMut`].

use bytes::{Buf, BufMut, BytesMut};
use otbm_core::{OtbmError, Position, Result};

/// Ensure at least `needed` bytes are left in `buf`
#[inline]
pub fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(OtbmError::eof(needed, buf.remaining()));
    }
    Ok(())
}

#[inline]
pub fn read_u8<B: Buf>(buf: &mut B) -> Result<u8> {
    ensure_remaining(buf, 1)?;
    Ok(buf.get_u8())
}

#[inline]
pub fn read_u16<B: Buf>(buf: &mut B) -> Result<u16> {
    ensure_remaining(buf, 2)?;
    Ok(buf.get_u16_le())
}

#[inline]
pub fn read_u32<B: Buf>(buf: &mut B) -> Result<u32> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_u32_le())
}

/// Read an `x u16, y u16, z u8` triple
pub fn read_position<B: Buf>(buf: &mut B) -> Result<Position> {
    ensure_remaining(buf, 5)?;
    let x = buf.get_u16_le();
    let y = buf.get_u16_le();
    let z = buf.get_u8();
    Ok(Position { x, y, z })
}

/// Read a u16-length-prefixed string
///
/// # Format
/// - 2 bytes: length (little-endian)
/// - N bytes: one byte per character
///
/// Each byte maps to the character with the same code point, so any byte
/// sequence survives a read/write cycle unchanged.
pub fn read_string<B: Buf>(buf: &mut B) -> Result<String> {
    let len = read_u16(buf)? as usize;
    ensure_remaining(buf, len)?;

    let mut text = String::with_capacity(len);
    for _ in 0..len {
        text.push(char::from(buf.get_u8()));
    }
    Ok(text)
}

#[inline]
pub fn write_u8(buf: &mut BytesMut, val: u8) {
    buf.put_u8(val);
}

#[inline]
pub fn write_u16(buf: &mut BytesMut, val: u16) {
    buf.put_u16_le(val);
}

#[inline]
pub fn write_u32(buf: &mut BytesMut, val: u32) {
    buf.put_u32_le(val);
}

pub fn write_position(buf: &mut BytesMut, pos: Position) {
    buf.put_u16_le(pos.x);
    buf.put_u16_le(pos.y);
    buf.put_u8(pos.z);
}

/// Bytes a string takes on the wire, length prefix included
pub fn string_wire_len(text: &str) -> usize {
    2 + text.chars().count()
}

/// Write a u16-length-prefixed string
///
/// # Errors
/// - `StringTooLong` when the text has more than 65535 characters
/// - `InvalidString` for a character above U+00FF
pub fn write_string(buf: &mut BytesMut, text: &str) -> Result<()> {
    let len = text.chars().count();
    let prefix = u16::try_from(len).map_err(|_| OtbmError::StringTooLong(len))?;

    buf.reserve(2 + len);
    buf.put_u16_le(prefix);
    for c in text.chars() {
        let byte = u8::try_from(u32::from(c)).map_err(|_| OtbmError::InvalidString(c))?;
        buf.put_u8(byte);
    }
    Ok(())
}
