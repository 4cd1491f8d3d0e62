//! Map file decoder
//!
//! Walks the framed byte stream, finds node boundaries from the marker bytes
//! and builds the [`Node`] tree recursively.
//!
//! # Layout
//! ```text
//! {u32 identifier}{FE}{payload}{child nodes...}{FF}
//! ```
//! A payload runs from the byte after `0xFE` to the first unescaped marker.
//! Once unescaped, its first byte is the node kind, then come the kind's
//! fixed fields and, for kinds that take them, an attribute list.

use bytes::Buf;
use otbm_config::CodecConfig;
use otbm_core::{FormatIdentifier, NodeKind, OtbmError, Result, UnknownNodePolicy};
use otbm_protocol::{
    ensure_remaining, read_string, read_u16, read_u32, read_u8, unescape, AttributeDecoder,
    ESCAPE_CHAR, NODE_END, NODE_START,
};

use crate::codec::MapDocument;
use crate::node::*;

/// Counters gathered while decoding one buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Nodes opened, skipped ones included
    pub nodes_visited: usize,
    /// Nodes dropped because their kind was unknown
    pub nodes_skipped: usize,
    /// Attribute tags outside the known set
    pub unknown_attributes: usize,
    /// Deepest nesting seen (the root is 1)
    pub max_depth: usize,
}

/// Outcome of reading one node
enum Decoded {
    Node(Node),
    Skipped(u8),
}

/// Decoder over one in-memory map buffer
pub struct NodeReader<'a> {
    data: &'a [u8],
    pos: usize,
    config: &'a CodecConfig,
    max_depth: usize,
    attributes: AttributeDecoder,
    stats: DecodeStats,
}

impl<'a> NodeReader<'a> {
    pub fn new(data: &'a [u8], config: &'a CodecConfig) -> Self {
        Self {
            data,
            pos: 0,
            config,
            max_depth: config.effective_max_depth(),
            attributes: AttributeDecoder::new(config.unknown_attributes),
            stats: DecodeStats::default(),
        }
    }

    /// Decode the whole buffer
    ///
    /// # Errors
    /// - `UnknownFormat` if the identifier is not zero or "OTBM"; nothing
    ///   else is parsed in that case
    /// - `MissingNodeStart` if the root node does not follow the identifier
    /// - `UnexpectedEof`, `TruncatedEscape`, `MaxDepthExceeded` for broken framing
    /// - `UnknownNodeKind` for an unknown kind under [`UnknownNodePolicy::Abort`],
    ///   or for an unknown root kind under any policy
    pub fn decode(mut self) -> Result<MapDocument> {
        let identifier = self.read_identifier()?;

        match self.next_byte()? {
            NODE_START => {}
            other => return Err(OtbmError::MissingNodeStart(other)),
        }

        let root = match self.read_node(1)? {
            Decoded::Node(node) => node,
            Decoded::Skipped(tag) => return Err(OtbmError::UnknownNodeKind(tag)),
        };

        if root.kind() != NodeKind::MapHeader {
            tracing::warn!(kind = ?root.kind(), "map root is not a map header");
        }
        if self.pos < self.data.len() {
            tracing::debug!(
                trailing = self.data.len() - self.pos,
                "ignoring bytes after the root node"
            );
        }

        self.stats.unknown_attributes = self.attributes.unknown_seen();
        tracing::debug!(
            nodes = self.stats.nodes_visited,
            skipped = self.stats.nodes_skipped,
            depth = self.stats.max_depth,
            "decoded map"
        );

        Ok(MapDocument {
            identifier,
            root,
            stats: self.stats,
        })
    }

    fn read_identifier(&mut self) -> Result<FormatIdentifier> {
        let mut header = self.data;
        let value = read_u32(&mut header)?;
        self.pos = 4;
        FormatIdentifier::from_u32(value).ok_or(OtbmError::UnknownFormat(value))
    }

    #[inline]
    fn next_byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| OtbmError::eof(1, 0))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read a node whose `0xFE` has just been consumed
    fn read_node(&mut self, depth: usize) -> Result<Decoded> {
        if depth > self.max_depth {
            return Err(OtbmError::MaxDepthExceeded(self.max_depth));
        }
        self.stats.nodes_visited += 1;
        self.stats.max_depth = self.stats.max_depth.max(depth);

        let start = self.pos;
        self.skip_payload()?;
        let payload = unescape(&self.data[start..self.pos])?;

        let mut children = Vec::new();
        loop {
            match self.next_byte()? {
                NODE_START => match self.read_node(depth + 1)? {
                    Decoded::Node(child) => children.push(child),
                    Decoded::Skipped(_) => {}
                },
                NODE_END => break,
                ESCAPE_CHAR => {
                    self.next_byte().map_err(|_| OtbmError::TruncatedEscape)?;
                }
                byte => {
                    tracing::trace!(byte, offset = self.pos - 1, "stray byte between child nodes");
                }
            }
        }

        self.build_node(&payload, children)
    }

    /// Advance to the first unescaped marker after the current position
    fn skip_payload(&mut self) -> Result<()> {
        loop {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or_else(|| OtbmError::eof(1, 0))?;

            match byte {
                ESCAPE_CHAR => {
                    if self.pos + 1 >= self.data.len() {
                        return Err(OtbmError::TruncatedEscape);
                    }
                    self.pos += 2;
                }
                NODE_START | NODE_END => return Ok(()),
                _ => self.pos += 1,
            }
        }
    }

    /// Decode the fixed fields and attributes of one unescaped payload
    fn build_node(&mut self, payload: &[u8], children: Vec<Node>) -> Result<Decoded> {
        let mut buf = payload;
        let tag = read_u8(&mut buf)?;

        let Some(kind) = NodeKind::from_u8(tag) else {
            return match self.config.unknown_nodes {
                UnknownNodePolicy::Abort => Err(OtbmError::UnknownNodeKind(tag)),
                UnknownNodePolicy::Skip => {
                    tracing::warn!(tag, children = children.len(), "skipping node of unknown kind");
                    self.stats.nodes_skipped += 1;
                    Ok(Decoded::Skipped(tag))
                }
            };
        };

        ensure_remaining(&buf, kind.min_header_len() - 1)?;

        let node = match kind {
            NodeKind::MapHeader => {
                let version = read_u32(&mut buf)?;
                let width = read_u16(&mut buf)?;
                let height = read_u16(&mut buf)?;
                let items_major_version = read_u32(&mut buf)?;
                let items_minor_version = read_u32(&mut buf)?;
                Node::MapHeader(MapHeader {
                    version,
                    width,
                    height,
                    items_major_version,
                    items_minor_version,
                    nodes: children,
                })
            }
            NodeKind::MapData => Node::MapData(MapData {
                attributes: self.attributes.decode(buf)?,
                features: children,
            }),
            NodeKind::TileArea => {
                let x = read_u16(&mut buf)?;
                let y = read_u16(&mut buf)?;
                let z = read_u8(&mut buf)?;
                Node::TileArea(TileArea { x, y, z, tiles: children })
            }
            NodeKind::Tile => {
                let x = read_u8(&mut buf)?;
                let y = read_u8(&mut buf)?;
                Node::Tile(Tile {
                    x,
                    y,
                    attributes: self.attributes.decode(buf)?,
                    items: children,
                })
            }
            NodeKind::HouseTile => {
                let x = read_u8(&mut buf)?;
                let y = read_u8(&mut buf)?;
                let house_id = read_u32(&mut buf)?;
                Node::HouseTile(HouseTile {
                    x,
                    y,
                    house_id,
                    attributes: self.attributes.decode(buf)?,
                    items: children,
                })
            }
            NodeKind::Item => {
                let id = read_u16(&mut buf)?;
                Node::Item(Item {
                    id,
                    attributes: self.attributes.decode(buf)?,
                    content: children,
                })
            }
            NodeKind::Towns => Node::Towns(Towns { towns: children }),
            NodeKind::Town => {
                let town_id = read_u32(&mut buf)?;
                let name = read_string(&mut buf)?;
                let x = read_u16(&mut buf)?;
                let y = read_u16(&mut buf)?;
                let z = read_u8(&mut buf)?;
                Node::Town(Town {
                    town_id,
                    name,
                    x,
                    y,
                    z,
                    nodes: children,
                })
            }
            NodeKind::Waypoints => Node::Waypoints(Waypoints { nodes: children }),
            NodeKind::Waypoint => {
                let name = read_string(&mut buf)?;
                let x = read_u16(&mut buf)?;
                let y = read_u16(&mut buf)?;
                let z = read_u8(&mut buf)?;
                Node::Waypoint(Waypoint {
                    name,
                    x,
                    y,
                    z,
                    nodes: children,
                })
            }
        };

        if !kind.accepts_attributes() && buf.has_remaining() {
            tracing::trace!(?kind, extra = buf.remaining(), "ignoring extra header bytes");
        }

        Ok(Decoded::Node(node))
    }
}

/// Decode a map buffer with the given settings
pub fn decode(data: &[u8], config: &CodecConfig) -> Result<MapDocument> {
    NodeReader::new(data, config).decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use otbm_config::MAX_SUPPORTED_DEPTH;
    use otbm_core::UnknownAttributePolicy;

    fn framed(nodes: &[u8]) -> Vec<u8> {
        let mut data = vec![0, 0, 0, 0];
        data.extend_from_slice(nodes);
        data
    }

    const HEADER_PAYLOAD: [u8; 17] = [
        0x00, // map header
        2, 0, 0, 0, // version
        100, 0, 100, 0, // width, height
        3, 0, 0, 0, // items major
        57, 0, 0, 0, // items minor
    ];

    #[test]
    fn test_decode_header_only() {
        let mut nodes = vec![0xFE];
        nodes.extend_from_slice(&HEADER_PAYLOAD);
        nodes.push(0xFF);

        let doc = decode(&framed(&nodes), &CodecConfig::default()).unwrap();
        assert_eq!(doc.identifier, FormatIdentifier::Zero);
        match doc.root {
            Node::MapHeader(header) => {
                assert_eq!(header.version, 2);
                assert_eq!(header.width, 100);
                assert_eq!(header.height, 100);
                assert_eq!(header.items_major_version, 3);
                assert_eq!(header.items_minor_version, 57);
                assert!(header.nodes.is_empty());
            }
            other => panic!("unexpected root: {:?}", other),
        }
        assert_eq!(doc.stats.nodes_visited, 1);
    }

    #[test]
    fn test_otbm_magic_accepted() {
        let mut data = b"OTBM".to_vec();
        data.push(0xFE);
        data.extend_from_slice(&HEADER_PAYLOAD);
        data.push(0xFF);

        let doc = decode(&data, &CodecConfig::default()).unwrap();
        assert_eq!(doc.identifier, FormatIdentifier::Otbm);
    }

    #[test]
    fn test_unknown_format() {
        let data = [0x01, 0x02, 0x03, 0x04, 0xFE, 0x00];
        match decode(&data, &CodecConfig::default()) {
            Err(OtbmError::UnknownFormat(value)) => assert_eq!(value, 0x0403_0201),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_root_start() {
        let data = framed(&[0x00, 0xFF]);
        assert!(matches!(
            decode(&data, &CodecConfig::default()),
            Err(OtbmError::MissingNodeStart(0x00))
        ));
    }

    #[test]
    fn test_escaped_markers_inside_payload() {
        // Tile at (0xFE, 0xFD) with an item whose id is 0xFFFF
        let nodes = [
            0xFE, 0x05, 0xFD, 0xFE, 0xFD, 0xFD, // tile
            0xFE, 0x06, 0xFD, 0xFF, 0xFD, 0xFF, 0xFF, // item
            0xFF,
        ];
        let doc = decode(&framed(&nodes), &CodecConfig::default()).unwrap();
        match doc.root {
            Node::Tile(tile) => {
                assert_eq!((tile.x, tile.y), (0xFE, 0xFD));
                match &tile.items[0] {
                    Node::Item(item) => assert_eq!(item.id, 0xFFFF),
                    other => panic!("unexpected child: {:?}", other),
                }
            }
            other => panic!("unexpected root: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_fixed_fields() {
        // Tile area needs 5 bytes after the kind tag
        let nodes = [0xFE, 0x04, 0xE8, 0x03, 0xFF];
        assert!(matches!(
            decode(&framed(&nodes), &CodecConfig::default()),
            Err(OtbmError::UnexpectedEof { needed: 5, remaining: 2 })
        ));
    }

    #[test]
    fn test_empty_payload() {
        let nodes = [0xFE, 0xFF];
        assert!(matches!(
            decode(&framed(&nodes), &CodecConfig::default()),
            Err(OtbmError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_unclosed_node() {
        let nodes = [0xFE, 0x0C];
        assert!(matches!(
            decode(&framed(&nodes), &CodecConfig::default()),
            Err(OtbmError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_truncated_escape() {
        let nodes = [0xFE, 0x06, 0x01, 0xFD];
        let err = decode(&framed(&nodes), &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, OtbmError::TruncatedEscape));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_depth_guard() {
        let mut nodes = vec![0xFE; 10_000];
        nodes.insert(0, 0xFE);
        match decode(&framed(&nodes), &CodecConfig::default()) {
            Err(OtbmError::MaxDepthExceeded(limit)) => assert_eq!(limit, 64),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    fn nested_items(depth: usize) -> Node {
        let mut node = Node::from(Item::new(1));
        for _ in 1..depth {
            node = Node::from(Item::new(1)).with_child(node);
        }
        node
    }

    #[test]
    fn test_depth_limit_boundary() {
        let config = CodecConfig {
            max_depth: 5,
            ..CodecConfig::default()
        };

        let at_limit = crate::writer::encode(&nested_items(5), &CodecConfig::default()).unwrap();
        let doc = decode(&at_limit, &config).unwrap();
        assert_eq!(doc.stats.max_depth, 5);
        assert_eq!(doc.root.count_nodes(), 5);

        let past_limit = crate::writer::encode(&nested_items(6), &CodecConfig::default()).unwrap();
        assert!(matches!(
            decode(&past_limit, &config),
            Err(OtbmError::MaxDepthExceeded(5))
        ));
    }

    #[test]
    fn test_configured_depth_is_capped() {
        let config = CodecConfig {
            max_depth: 1_000_000,
            ..CodecConfig::default()
        };
        let mut data = vec![0, 0, 0, 0];
        data.resize(4 + 200_000, 0xFE);

        match decode(&data, &config) {
            Err(OtbmError::MaxDepthExceeded(limit)) => assert_eq!(limit, MAX_SUPPORTED_DEPTH),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_aborts_by_default() {
        // Towns containing a node of kind 0x42
        let nodes = [0xFE, 0x0C, 0xFE, 0x42, 0x01, 0xFF, 0xFF];
        let err = decode(&framed(&nodes), &CodecConfig::default()).unwrap_err();
        assert!(matches!(err, OtbmError::UnknownNodeKind(0x42)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_unknown_kind_skipped() {
        let nodes = [
            0xFE, 0x0C, // towns
            0xFE, 0x42, 0x01, 0xFE, 0x06, 0x01, 0x00, 0xFF, 0xFF, // unknown with a child
            0xFE, 0x0D, 7, 0, 0, 0, 1, 0, b'A', 1, 0, 2, 0, 3, 0xFF, // town
            0xFF,
        ];
        let config = CodecConfig {
            unknown_nodes: UnknownNodePolicy::Skip,
            ..CodecConfig::default()
        };
        let doc = decode(&framed(&nodes), &config).unwrap();
        assert_eq!(doc.stats.nodes_skipped, 1);
        assert_eq!(doc.stats.nodes_visited, 4);

        match doc.root {
            Node::Towns(towns) => {
                assert_eq!(towns.towns.len(), 1);
                match &towns.towns[0] {
                    Node::Town(town) => {
                        assert_eq!(town.town_id, 7);
                        assert_eq!(town.name, "A");
                        assert_eq!((town.x, town.y, town.z), (1, 2, 3));
                    }
                    other => panic!("unexpected child: {:?}", other),
                }
            }
            other => panic!("unexpected root: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_attribute_counted() {
        let nodes = [0xFE, 0x06, 0x64, 0x00, 0x11, 1, 2, 3, 4, 0xFF];
        let config = CodecConfig {
            unknown_attributes: UnknownAttributePolicy::Discard,
            ..CodecConfig::default()
        };
        let doc = decode(&framed(&nodes), &config).unwrap();
        assert_eq!(doc.stats.unknown_attributes, 1);
        assert!(doc.root.attributes().unwrap().is_empty());
    }
}
