//! Core type definitions

use serde::{Deserialize, Serialize};

/// Node kind tag (first byte of every unescaped node payload)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeKind {
    MapHeader = 0x00,
    MapData = 0x02,
    TileArea = 0x04,
    Tile = 0x05,
    Item = 0x06,
    Towns = 0x0C,
    Town = 0x0D,
    HouseTile = 0x0E,
    Waypoints = 0x0F,
    Waypoint = 0x10,
}

/// Wire width of one fixed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    U8,
    U16,
    U32,
    /// u16 length prefix followed by that many bytes
    String,
}

impl FieldWidth {
    /// Bytes taken on the wire, not counting string contents
    pub const fn fixed_size(self) -> usize {
        match self {
            FieldWidth::U8 => 1,
            FieldWidth::U16 | FieldWidth::String => 2,
            FieldWidth::U32 => 4,
        }
    }
}

/// One entry of a kind's fixed-field layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub width: FieldWidth,
}

const fn field(name: &'static str, width: FieldWidth) -> FieldSpec {
    FieldSpec { name, width }
}

const MAP_HEADER_LAYOUT: &[FieldSpec] = &[
    field("version", FieldWidth::U32),
    field("width", FieldWidth::U16),
    field("height", FieldWidth::U16),
    field("items_major_version", FieldWidth::U32),
    field("items_minor_version", FieldWidth::U32),
];
const TILE_AREA_LAYOUT: &[FieldSpec] = &[
    field("x", FieldWidth::U16),
    field("y", FieldWidth::U16),
    field("z", FieldWidth::U8),
];
const TILE_LAYOUT: &[FieldSpec] = &[field("x", FieldWidth::U8), field("y", FieldWidth::U8)];
const HOUSE_TILE_LAYOUT: &[FieldSpec] = &[
    field("x", FieldWidth::U8),
    field("y", FieldWidth::U8),
    field("house_id", FieldWidth::U32),
];
const ITEM_LAYOUT: &[FieldSpec] = &[field("id", FieldWidth::U16)];
const TOWN_LAYOUT: &[FieldSpec] = &[
    field("town_id", FieldWidth::U32),
    field("name", FieldWidth::String),
    field("x", FieldWidth::U16),
    field("y", FieldWidth::U16),
    field("z", FieldWidth::U8),
];
const WAYPOINT_LAYOUT: &[FieldSpec] = &[
    field("name", FieldWidth::String),
    field("x", FieldWidth::U16),
    field("y", FieldWidth::U16),
    field("z", FieldWidth::U8),
];

impl NodeKind {
    pub const ALL: [NodeKind; 10] = [
        NodeKind::MapHeader,
        NodeKind::MapData,
        NodeKind::TileArea,
        NodeKind::Tile,
        NodeKind::Item,
        NodeKind::Towns,
        NodeKind::Town,
        NodeKind::HouseTile,
        NodeKind::Waypoints,
        NodeKind::Waypoint,
    ];

    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_u8() == tag)
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Name under which a node of this kind exposes its children
    pub const fn children_slot(self) -> &'static str {
        match self {
            NodeKind::TileArea => "tiles",
            NodeKind::Tile | NodeKind::HouseTile => "items",
            NodeKind::Towns => "towns",
            NodeKind::Item => "content",
            NodeKind::MapData => "features",
            _ => "nodes",
        }
    }

    /// Whether an attribute list may follow the fixed fields
    pub const fn accepts_attributes(self) -> bool {
        matches!(
            self,
            NodeKind::MapData | NodeKind::Tile | NodeKind::HouseTile | NodeKind::Item
        )
    }

    /// Fixed fields that follow the kind tag, in wire order
    pub const fn layout(self) -> &'static [FieldSpec] {
        match self {
            NodeKind::MapHeader => MAP_HEADER_LAYOUT,
            NodeKind::TileArea => TILE_AREA_LAYOUT,
            NodeKind::Tile => TILE_LAYOUT,
            NodeKind::HouseTile => HOUSE_TILE_LAYOUT,
            NodeKind::Item => ITEM_LAYOUT,
            NodeKind::Town => TOWN_LAYOUT,
            NodeKind::Waypoint => WAYPOINT_LAYOUT,
            NodeKind::MapData | NodeKind::Towns | NodeKind::Waypoints => &[],
        }
    }

    /// Smallest header (kind tag included) a node of this kind can have
    pub fn min_header_len(self) -> usize {
        1 + self
            .layout()
            .iter()
            .map(|entry| entry.width.fixed_size())
            .sum::<usize>()
    }
}

/// Leading 4-byte identifier of a map file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatIdentifier {
    /// All-zero version field (what the writer emits)
    Zero,
    /// ASCII "OTBM"
    Otbm,
}

impl FormatIdentifier {
    pub const OTBM_MAGIC: u32 = 0x4D42_544F;

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(FormatIdentifier::Zero),
            Self::OTBM_MAGIC => Some(FormatIdentifier::Otbm),
            _ => None,
        }
    }

    pub const fn as_u32(self) -> u32 {
        match self {
            FormatIdentifier::Zero => 0,
            FormatIdentifier::Otbm => Self::OTBM_MAGIC,
        }
    }
}

/// What the reader does with a node whose kind tag it does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownNodePolicy {
    /// Fail the decode with `UnknownNodeKind`
    #[default]
    Abort,
    /// Drop the node and its subtree
    Skip,
}

/// What the attribute decoder does with tags outside the known set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownAttributePolicy {
    /// Keep the tag and its skipped bytes for the writer to re-emit
    #[default]
    Preserve,
    /// Drop them
    Discard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_tags() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(NodeKind::from_u8(0x01), None);
        assert_eq!(NodeKind::from_u8(0x11), None);
        assert_eq!(NodeKind::Waypoint.as_u8(), 0x10);
    }

    #[test]
    fn test_children_slots() {
        assert_eq!(NodeKind::TileArea.children_slot(), "tiles");
        assert_eq!(NodeKind::Tile.children_slot(), "items");
        assert_eq!(NodeKind::HouseTile.children_slot(), "items");
        assert_eq!(NodeKind::Towns.children_slot(), "towns");
        assert_eq!(NodeKind::Item.children_slot(), "content");
        assert_eq!(NodeKind::MapData.children_slot(), "features");
        assert_eq!(NodeKind::MapHeader.children_slot(), "nodes");
        assert_eq!(NodeKind::Waypoints.children_slot(), "nodes");
    }

    #[test]
    fn test_header_lengths() {
        assert_eq!(NodeKind::MapHeader.min_header_len(), 17);
        assert_eq!(NodeKind::MapData.min_header_len(), 1);
        assert_eq!(NodeKind::TileArea.min_header_len(), 6);
        assert_eq!(NodeKind::Tile.min_header_len(), 3);
        assert_eq!(NodeKind::HouseTile.min_header_len(), 7);
        assert_eq!(NodeKind::Item.min_header_len(), 3);
        assert_eq!(NodeKind::Town.min_header_len(), 12);
        assert_eq!(NodeKind::Waypoint.min_header_len(), 8);
    }

    #[test]
    fn test_format_identifier() {
        assert_eq!(FormatIdentifier::from_u32(0), Some(FormatIdentifier::Zero));
        assert_eq!(
            FormatIdentifier::from_u32(u32::from_le_bytes(*b"OTBM")),
            Some(FormatIdentifier::Otbm)
        );
        assert_eq!(FormatIdentifier::from_u32(0xDEADBEEF), None);
    }
}
