//! Escape codec for node payloads

use bytes::{BufMut, BytesMut};
use otbm_core::{OtbmError, Result};

use crate::{is_marker, ESCAPE_CHAR};

/// Escape a payload, prefixing every marker byte with `0xFD`
pub fn escape(payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(escaped_len(payload));
    escape_into(&mut buf, payload);
    buf.to_vec()
}

/// Escape a payload directly into an output buffer
pub fn escape_into(buf: &mut BytesMut, payload: &[u8]) {
    buf.reserve(escaped_len(payload));
    for &byte in payload {
        if is_marker(byte) {
            buf.put_u8(ESCAPE_CHAR);
        }
        buf.put_u8(byte);
    }
}

/// Length of `payload` once escaped
pub fn escaped_len(payload: &[u8]) -> usize {
    payload.len() + payload.iter().filter(|&&b| is_marker(b)).count()
}

/// Remove escape bytes from a framed payload
///
/// Every `0xFD` is dropped and the byte after it is kept as data whatever its
/// value, so an escaped `0xFD` never starts another escape.
///
/// # Errors
/// `TruncatedEscape` when the input ends on an escape byte.
pub fn unescape(framed: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(framed.len());
    let mut bytes = framed.iter();

    while let Some(&byte) = bytes.next() {
        if byte == ESCAPE_CHAR {
            match bytes.next() {
                Some(&literal) => out.push(literal),
                None => return Err(OtbmError::TruncatedEscape),
            }
        } else {
            out.push(byte);
        }
    }

    Ok(out)
}
