//! # OTBM Map Codec
//!
//! Reads OTBM map files into a node tree and writes node trees back out.
//!
//! ## Features
//! - Escape-aware node framing with a nesting limit
//! - Typed node kinds, each with its own children slot
//! - Tag-based attribute lists, unknown tags optionally preserved
//! - Atomic file writes
//! - JSON export of decoded maps
//!
//! ## Map Format
//!
//! - **Identifier**: 4 bytes, zero or ASCII "OTBM"
//! - **Nodes**: `0xFE` {payload} {children} `0xFF`, with `0xFD` escaping
//!   marker bytes inside payloads
//! - **Hierarchy**: map header > map data > tile areas / towns / waypoints
//!   > tiles > items
//!
//! ```rust,no_run
//! use otbm_map::{read, write};
//!
//! let doc = read("world.otbm")?;
//! println!("{} nodes", doc.root.count_nodes());
//! write("copy.otbm", &doc.root)?;
//! # Ok::<(), otbm_map::OtbmError>(())
//! ```

pub mod node;
pub mod reader;
pub mod writer;
pub mod codec;

pub use otbm_core::{FormatIdentifier, NodeKind, OtbmError, Position, Result};
pub use otbm_config::CodecConfig;
pub use otbm_protocol::{AttributeKind, AttributeMap, AttributeValue, RawAttribute, TileFlags};
pub use node::*;
pub use reader::{DecodeStats, NodeReader};
pub use writer::NodeWriter;
pub use codec::{MapCodec, MapDocument};

use bytes::Bytes;
use std::path::Path;

/// Read a map file with default settings
pub fn read<P: AsRef<Path>>(path: P) -> Result<MapDocument> {
    MapCodec::default().read(path)
}

/// Write a map file with default settings
pub fn write<P: AsRef<Path>>(path: P, root: &Node) -> Result<()> {
    MapCodec::default().write(path, root)
}

/// Encode a tree in memory with default settings
pub fn serialize(root: &Node) -> Result<Bytes> {
    MapCodec::default().serialize(root)
}

/// Decode an in-memory map with default settings
pub fn decode(data: &[u8]) -> Result<MapDocument> {
    MapCodec::default().decode(data)
}
