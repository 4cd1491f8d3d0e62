//! Map node tree
//!
//! Each node kind is its own struct with its children under the slot name
//! the format uses for that kind (`tiles`, `items`, `towns`, `content`,
//! `features` or `nodes`). [`Node`] wraps them for uniform traversal.

use otbm_core::{NodeKind, Position};
use otbm_protocol::AttributeMap;
use serde::{Deserialize, Serialize};

/// Root node: map dimensions and item format versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapHeader {
    pub version: u32,
    pub width: u16,
    pub height: u16,
    pub items_major_version: u32,
    pub items_minor_version: u32,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// Map-wide attributes (description, spawn and house files) and features
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapData {
    #[serde(default, skip_serializing_if = "AttributeMap::is_empty")]
    pub attributes: AttributeMap,
    #[serde(default)]
    pub features: Vec<Node>,
}

/// Block of tiles anchored at an absolute position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileArea {
    pub x: u16,
    pub y: u16,
    pub z: u8,
    #[serde(default)]
    pub tiles: Vec<Node>,
}

/// Tile at an offset from its tile area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub x: u8,
    pub y: u8,
    #[serde(default, skip_serializing_if = "AttributeMap::is_empty")]
    pub attributes: AttributeMap,
    #[serde(default)]
    pub items: Vec<Node>,
}

/// Tile that belongs to a house
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseTile {
    pub x: u8,
    pub y: u8,
    pub house_id: u32,
    #[serde(default, skip_serializing_if = "AttributeMap::is_empty")]
    pub attributes: AttributeMap,
    #[serde(default)]
    pub items: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u16,
    #[serde(default, skip_serializing_if = "AttributeMap::is_empty")]
    pub attributes: AttributeMap,
    /// Items inside a container
    #[serde(default)]
    pub content: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Towns {
    #[serde(default)]
    pub towns: Vec<Node>,
}

/// Town with its temple position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Town {
    pub town_id: u32,
    pub name: String,
    pub x: u16,
    pub y: u16,
    pub z: u8,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoints {
    #[serde(default)]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    pub x: u16,
    pub y: u16,
    pub z: u8,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// One node of a decoded map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    MapHeader(MapHeader),
    MapData(MapData),
    TileArea(TileArea),
    Tile(Tile),
    Item(Item),
    Towns(Towns),
    Town(Town),
    HouseTile(HouseTile),
    Waypoints(Waypoints),
    Waypoint(Waypoint),
}

macro_rules! node_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Node {
                fn from(node: $variant) -> Self {
                    Node::$variant(node)
                }
            }
        )*
    };
}

node_from!(
    MapHeader, MapData, TileArea, Tile, Item, Towns, Town, HouseTile, Waypoints, Waypoint,
);

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::MapHeader(_) => NodeKind::MapHeader,
            Node::MapData(_) => NodeKind::MapData,
            Node::TileArea(_) => NodeKind::TileArea,
            Node::Tile(_) => NodeKind::Tile,
            Node::Item(_) => NodeKind::Item,
            Node::Towns(_) => NodeKind::Towns,
            Node::Town(_) => NodeKind::Town,
            Node::HouseTile(_) => NodeKind::HouseTile,
            Node::Waypoints(_) => NodeKind::Waypoints,
            Node::Waypoint(_) => NodeKind::Waypoint,
        }
    }

    /// Name of the slot holding this node's children
    pub fn children_slot(&self) -> &'static str {
        self.kind().children_slot()
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::MapHeader(n) => &n.nodes,
            Node::MapData(n) => &n.features,
            Node::TileArea(n) => &n.tiles,
            Node::Tile(n) => &n.items,
            Node::Item(n) => &n.content,
            Node::Towns(n) => &n.towns,
            Node::Town(n) => &n.nodes,
            Node::HouseTile(n) => &n.items,
            Node::Waypoints(n) => &n.nodes,
            Node::Waypoint(n) => &n.nodes,
        }
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        match self {
            Node::MapHeader(n) => &mut n.nodes,
            Node::MapData(n) => &mut n.features,
            Node::TileArea(n) => &mut n.tiles,
            Node::Tile(n) => &mut n.items,
            Node::Item(n) => &mut n.content,
            Node::Towns(n) => &mut n.towns,
            Node::Town(n) => &mut n.nodes,
            Node::HouseTile(n) => &mut n.items,
            Node::Waypoints(n) => &mut n.nodes,
            Node::Waypoint(n) => &mut n.nodes,
        }
    }

    /// Attributes, for the kinds that carry them
    pub fn attributes(&self) -> Option<&AttributeMap> {
        match self {
            Node::MapData(n) => Some(&n.attributes),
            Node::Tile(n) => Some(&n.attributes),
            Node::HouseTile(n) => Some(&n.attributes),
            Node::Item(n) => Some(&n.attributes),
            _ => None,
        }
    }

    pub fn attributes_mut(&mut self) -> Option<&mut AttributeMap> {
        match self {
            Node::MapData(n) => Some(&mut n.attributes),
            Node::Tile(n) => Some(&mut n.attributes),
            Node::HouseTile(n) => Some(&mut n.attributes),
            Node::Item(n) => Some(&mut n.attributes),
            _ => None,
        }
    }

    /// Append a child and return `self` for chaining
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children_mut().push(child.into());
        self
    }

    /// Total nodes in this subtree, this one included
    pub fn count_nodes(&self) -> usize {
        1 + self.children().iter().map(Node::count_nodes).sum::<usize>()
    }

    /// Visit this subtree depth-first, parents before children
    ///
    /// The callback receives each node with its depth (this node is 0).
    pub fn walk<F: FnMut(&Node, usize)>(&self, f: &mut F) {
        self.walk_at(0, f);
    }

    fn walk_at<F: FnMut(&Node, usize)>(&self, depth: usize, f: &mut F) {
        f(self, depth);
        for child in self.children() {
            child.walk_at(depth + 1, f);
        }
    }
}

impl MapHeader {
    pub fn new(
        version: u32,
        width: u16,
        height: u16,
        items_major_version: u32,
        items_minor_version: u32,
    ) -> Self {
        Self {
            version,
            width,
            height,
            items_major_version,
            items_minor_version,
            nodes: Vec::new(),
        }
    }
}

impl TileArea {
    pub fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z, tiles: Vec::new() }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }

    /// Absolute position of a tile of this area
    pub fn tile_position(&self, tile_x: u8, tile_y: u8) -> Option<Position> {
        self.position().offset(tile_x, tile_y)
    }
}

impl Tile {
    pub fn new(x: u8, y: u8) -> Self {
        Self {
            x,
            y,
            attributes: AttributeMap::new(),
            items: Vec::new(),
        }
    }
}

impl HouseTile {
    pub fn new(x: u8, y: u8, house_id: u32) -> Self {
        Self {
            x,
            y,
            house_id,
            attributes: AttributeMap::new(),
            items: Vec::new(),
        }
    }
}

impl Item {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            attributes: AttributeMap::new(),
            content: Vec::new(),
        }
    }

    /// Stackable item with a count attribute
    pub fn with_count(id: u16, count: u8) -> Self {
        let mut item = Self::new(id);
        item.attributes.set_count(count);
        item
    }
}

impl Town {
    pub fn new(town_id: u32, name: impl Into<String>, temple: Position) -> Self {
        Self {
            town_id,
            name: name.into(),
            x: temple.x,
            y: temple.y,
            z: temple.z,
            nodes: Vec::new(),
        }
    }

    pub fn temple_position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }
}

impl Waypoint {
    pub fn new(name: impl Into<String>, pos: Position) -> Self {
        Self {
            name: name.into(),
            x: pos.x,
            y: pos.y,
            z: pos.z,
            nodes: Vec::new(),
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }
}
