//! # OTBM Protocol Library
//!
//! Byte-level building blocks of the OTBM map format.
//!
//! ## Layers
//!
//! ### 1. Framing ([`escape`])
//! A map file is a tree of nodes delimited by single marker bytes:
//! - `0xFE` opens a node
//! - `0xFF` closes the current node
//! - `0xFD` escapes the byte after it
//!
//! Any marker value occurring as data inside a node payload is prefixed with
//! `0xFD`. Escaping is applied to a whole node payload at once, never to
//! individual fields.
//!
//! ### 2. Primitives ([`codecs`])
//! Bounds-checked little-endian reads over unescaped payloads and the
//! matching writers. Strings carry a u16 length prefix and one byte per
//! character.
//!
//! ### 3. Attributes ([`attributes`])
//! The tag-prefixed attribute list carried by map data, tile, house tile and
//! item nodes.
//!
//! ## Usage Example
//!
//! ```rust
//! use otbm_protocol::escape::{escape, unescape};
//!
//! let payload = [0x06, 0xFE, 0x08];
//! let framed = escape(&payload);
//! assert_eq!(framed, vec![0x06, 0xFD, 0xFE, 0x08]);
//! assert_eq!(unescape(&framed).unwrap(), payload);
//! ```

pub mod escape;
pub mod codecs;
pub mod attributes;

pub use escape::*;
pub use codecs::*;
pub use attributes::*;

/// Opens a node
pub const NODE_START: u8 = 0xFE;

/// Closes the current node
pub const NODE_END: u8 = 0xFF;

/// Marks the next byte as literal data
pub const ESCAPE_CHAR: u8 = 0xFD;

/// Whether a byte must be escaped when it appears as payload data
#[inline]
pub const fn is_marker(byte: u8) -> bool {
    matches!(byte, ESCAPE_CHAR | NODE_START | NODE_END)
}
