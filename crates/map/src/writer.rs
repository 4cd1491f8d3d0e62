//! Map file encoder
//!
//! Mirror of the reader. Every node becomes
//! ```text
//! {FE}{escaped header + attributes}{child nodes...}{FF}
//! ```
//! and the stream is prefixed with a zero u32 identifier, whatever identifier
//! the tree was read with.
//!
//! Node kinds form a closed enum, so there is no unknown-kind case here.

use bytes::{BufMut, Bytes, BytesMut};
use otbm_config::CodecConfig;
use otbm_core::{OtbmError, Result};
use otbm_protocol::{
    encode_attributes, escape_into, string_wire_len, write_string, write_u16, write_u32,
    write_u8, NODE_END, NODE_START,
};

use crate::node::Node;

/// Encoder building one output buffer
pub struct NodeWriter {
    max_depth: usize,
    buf: BytesMut,
    nodes_written: usize,
}

impl NodeWriter {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            max_depth: config.effective_max_depth(),
            buf: BytesMut::with_capacity(4096),
            nodes_written: 0,
        }
    }

    /// Encode a tree rooted at `root`
    ///
    /// # Errors
    /// - `MaxDepthExceeded` if the tree nests deeper than the configured limit
    /// - string and attribute errors from the field codecs
    pub fn encode(mut self, root: &Node) -> Result<Bytes> {
        self.buf.put_u32_le(0);
        self.write_node(root, 1)?;

        tracing::debug!(
            nodes = self.nodes_written,
            bytes = self.buf.len(),
            "encoded map"
        );
        Ok(self.buf.freeze())
    }

    fn write_node(&mut self, node: &Node, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(OtbmError::MaxDepthExceeded(self.max_depth));
        }

        let payload = encode_payload(node)?;
        self.buf.put_u8(NODE_START);
        escape_into(&mut self.buf, &payload);
        self.nodes_written += 1;

        for child in node.children() {
            self.write_node(child, depth + 1)?;
        }

        self.buf.put_u8(NODE_END);
        Ok(())
    }
}

/// Size of a node's kind tag plus fixed fields
pub fn header_len(node: &Node) -> usize {
    let strings = match node {
        Node::Town(town) => string_wire_len(&town.name) - 2,
        Node::Waypoint(waypoint) => string_wire_len(&waypoint.name) - 2,
        _ => 0,
    };
    node.kind().min_header_len() + strings
}

/// Unescaped payload of one node: kind tag, fixed fields, attributes
pub fn encode_payload(node: &Node) -> Result<BytesMut> {
    let fixed = header_len(node);
    let attributes = node.attributes().map_or(0, |attrs| attrs.encoded_len());
    let mut buf = BytesMut::with_capacity(fixed + attributes);

    write_u8(&mut buf, node.kind().as_u8());
    match node {
        Node::MapHeader(header) => {
            write_u32(&mut buf, header.version);
            write_u16(&mut buf, header.width);
            write_u16(&mut buf, header.height);
            write_u32(&mut buf, header.items_major_version);
            write_u32(&mut buf, header.items_minor_version);
        }
        Node::TileArea(area) => {
            write_u16(&mut buf, area.x);
            write_u16(&mut buf, area.y);
            write_u8(&mut buf, area.z);
        }
        Node::Tile(tile) => {
            write_u8(&mut buf, tile.x);
            write_u8(&mut buf, tile.y);
        }
        Node::HouseTile(tile) => {
            write_u8(&mut buf, tile.x);
            write_u8(&mut buf, tile.y);
            write_u32(&mut buf, tile.house_id);
        }
        Node::Item(item) => write_u16(&mut buf, item.id),
        Node::Town(town) => {
            write_u32(&mut buf, town.town_id);
            write_string(&mut buf, &town.name)?;
            write_u16(&mut buf, town.x);
            write_u16(&mut buf, town.y);
            write_u8(&mut buf, town.z);
        }
        Node::Waypoint(waypoint) => {
            write_string(&mut buf, &waypoint.name)?;
            write_u16(&mut buf, waypoint.x);
            write_u16(&mut buf, waypoint.y);
            write_u8(&mut buf, waypoint.z);
        }
        Node::MapData(_) | Node::Towns(_) | Node::Waypoints(_) => {}
    }
    debug_assert_eq!(buf.len(), fixed);

    if let Some(attrs) = node.attributes() {
        encode_attributes(attrs, &mut buf)?;
    }

    Ok(buf)
}

/// Encode a tree with the given settings
pub fn encode(root: &Node, config: &CodecConfig) -> Result<Bytes> {
    NodeWriter::new(config).encode(root)
}
