//! Attribute codec
//!
//! # Format
//! ```text
//! {u8 tag}{value}{u8 tag}{value}...
//! ```
//! The value shape is fixed by the tag: u8, u16, u32, a position triple
//! (`x u16, y u16, z u8`) or a u16-length-prefixed string. Decoding stops
//! once fewer than two bytes are left.
//!
//! Tags outside the known set are delimited with a best-effort heuristic (see
//! [`unknown_span`]) and, depending on [`UnknownAttributePolicy`], kept
//! verbatim as [`RawAttribute`]s or dropped.

use bytes::{Buf, BufMut, BytesMut};
use otbm_core::{OtbmError, Position, Result, UnknownAttributePolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::codecs::*;

/// Known attribute tags
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum AttributeKind {
    Description = 0x01,
    ExtFile = 0x02,
    TileFlags = 0x03,
    ActionId = 0x04,
    UniqueId = 0x05,
    Text = 0x06,
    Desc = 0x07,
    TeleDest = 0x08,
    Item = 0x09,
    DepotId = 0x0A,
    ExtSpawnFile = 0x0B,
    ExtHouseFile = 0x0D,
    HouseDoorId = 0x0E,
    Count = 0x0F,
    RuneCharges = 0x16,
    Rotation = 0x32,
    BigObjectRef = 0x33,
    Tags = 0x34,
}

/// Wire shape of an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeShape {
    U8,
    U16,
    U32,
    Position,
    String,
}

impl AttributeShape {
    pub const fn name(self) -> &'static str {
        match self {
            AttributeShape::U8 => "u8",
            AttributeShape::U16 => "u16",
            AttributeShape::U32 => "u32",
            AttributeShape::Position => "position",
            AttributeShape::String => "string",
        }
    }
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 18] = [
        AttributeKind::Description,
        AttributeKind::ExtFile,
        AttributeKind::TileFlags,
        AttributeKind::ActionId,
        AttributeKind::UniqueId,
        AttributeKind::Text,
        AttributeKind::Desc,
        AttributeKind::TeleDest,
        AttributeKind::Item,
        AttributeKind::DepotId,
        AttributeKind::ExtSpawnFile,
        AttributeKind::ExtHouseFile,
        AttributeKind::HouseDoorId,
        AttributeKind::Count,
        AttributeKind::RuneCharges,
        AttributeKind::Rotation,
        AttributeKind::BigObjectRef,
        AttributeKind::Tags,
    ];

    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_u8() == tag)
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn shape(self) -> AttributeShape {
        match self {
            AttributeKind::HouseDoorId | AttributeKind::Count => AttributeShape::U8,
            AttributeKind::ActionId
            | AttributeKind::UniqueId
            | AttributeKind::Item
            | AttributeKind::DepotId
            | AttributeKind::RuneCharges
            | AttributeKind::Rotation => AttributeShape::U16,
            AttributeKind::TileFlags => AttributeShape::U32,
            AttributeKind::TeleDest | AttributeKind::BigObjectRef => AttributeShape::Position,
            AttributeKind::Description
            | AttributeKind::ExtFile
            | AttributeKind::Text
            | AttributeKind::Desc
            | AttributeKind::ExtSpawnFile
            | AttributeKind::ExtHouseFile
            | AttributeKind::Tags => AttributeShape::String,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            AttributeKind::Description => "description",
            AttributeKind::ExtFile => "extfile",
            AttributeKind::TileFlags => "tileflags",
            AttributeKind::ActionId => "aid",
            AttributeKind::UniqueId => "uid",
            AttributeKind::Text => "text",
            AttributeKind::Desc => "desc",
            AttributeKind::TeleDest => "destination",
            AttributeKind::Item => "tileid",
            AttributeKind::DepotId => "depotid",
            AttributeKind::ExtSpawnFile => "spawnfile",
            AttributeKind::ExtHouseFile => "housefile",
            AttributeKind::HouseDoorId => "housedoorid",
            AttributeKind::Count => "count",
            AttributeKind::RuneCharges => "runecharges",
            AttributeKind::Rotation => "rotation",
            AttributeKind::BigObjectRef => "bigobjectref",
            AttributeKind::Tags => "tags",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeValue {
    U8(u8),
    U16(u16),
    U32(u32),
    Position(Position),
    String(String),
}

impl AttributeValue {
    pub fn shape(&self) -> AttributeShape {
        match self {
            AttributeValue::U8(_) => AttributeShape::U8,
            AttributeValue::U16(_) => AttributeShape::U16,
            AttributeValue::U32(_) => AttributeShape::U32,
            AttributeValue::Position(_) => AttributeShape::Position,
            AttributeValue::String(_) => AttributeShape::String,
        }
    }

    fn read<B: Buf>(shape: AttributeShape, buf: &mut B) -> Result<Self> {
        Ok(match shape {
            AttributeShape::U8 => AttributeValue::U8(read_u8(buf)?),
            AttributeShape::U16 => AttributeValue::U16(read_u16(buf)?),
            AttributeShape::U32 => AttributeValue::U32(read_u32(buf)?),
            AttributeShape::Position => AttributeValue::Position(read_position(buf)?),
            AttributeShape::String => AttributeValue::String(read_string(buf)?),
        })
    }

    fn write(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            AttributeValue::U8(v) => write_u8(buf, *v),
            AttributeValue::U16(v) => write_u16(buf, *v),
            AttributeValue::U32(v) => write_u32(buf, *v),
            AttributeValue::Position(pos) => write_position(buf, *pos),
            AttributeValue::String(text) => write_string(buf, text)?,
        }
        Ok(())
    }

    fn wire_len(&self) -> usize {
        match self {
            AttributeValue::U8(_) => 1,
            AttributeValue::U16(_) => 2,
            AttributeValue::U32(_) => 4,
            AttributeValue::Position(_) => 5,
            AttributeValue::String(text) => string_wire_len(text),
        }
    }
}

/// Tile state bitset stored under `TileFlags`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileFlags(pub u32);

impl TileFlags {
    pub const NONE: TileFlags = TileFlags(0x0000);
    pub const PROTECTION_ZONE: TileFlags = TileFlags(0x0001);
    pub const DEPRECATED: TileFlags = TileFlags(0x0002);
    pub const NO_PVP: TileFlags = TileFlags(0x0004);
    pub const NO_LOGOUT: TileFlags = TileFlags(0x0008);
    pub const PVP_ZONE: TileFlags = TileFlags(0x0010);
    pub const REFRESH: TileFlags = TileFlags(0x0020);

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: TileFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: TileFlags) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: TileFlags) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for TileFlags {
    type Output = TileFlags;

    fn bitor(self, rhs: TileFlags) -> TileFlags {
        TileFlags(self.0 | rhs.0)
    }
}

/// An attribute whose tag is not in the known set, kept byte-for-byte
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttribute {
    pub tag: u8,
    pub data: Vec<u8>,
}

/// Sparse set of typed attributes attached to one node
///
/// Known attributes are kept in tag order; unknown ones keep their decode
/// order and are written after the known ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMap {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<AttributeKind, AttributeValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    raw: Vec<RawAttribute>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.raw.is_empty()
    }

    /// Number of attributes, unknown ones included
    pub fn len(&self) -> usize {
        self.values.len() + self.raw.len()
    }

    pub fn get(&self, kind: AttributeKind) -> Option<&AttributeValue> {
        self.values.get(&kind)
    }

    pub fn contains(&self, kind: AttributeKind) -> bool {
        self.values.contains_key(&kind)
    }

    /// Store a value, replacing any previous one
    ///
    /// # Errors
    /// `AttributeShape` when the value does not have the tag's wire shape.
    pub fn insert(
        &mut self,
        kind: AttributeKind,
        value: AttributeValue,
    ) -> Result<Option<AttributeValue>> {
        check_shape(kind, &value)?;
        Ok(self.values.insert(kind, value))
    }

    pub fn remove(&mut self, kind: AttributeKind) -> Option<AttributeValue> {
        self.values.remove(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttributeKind, &AttributeValue)> {
        self.values.iter().map(|(kind, value)| (*kind, value))
    }

    pub fn raw(&self) -> &[RawAttribute] {
        &self.raw
    }

    pub fn push_raw(&mut self, raw: RawAttribute) {
        self.raw.push(raw);
    }

    pub fn clear_raw(&mut self) {
        self.raw.clear();
    }

    fn u8_of(&self, kind: AttributeKind) -> Option<u8> {
        match self.values.get(&kind) {
            Some(AttributeValue::U8(v)) => Some(*v),
            _ => None,
        }
    }

    fn u16_of(&self, kind: AttributeKind) -> Option<u16> {
        match self.values.get(&kind) {
            Some(AttributeValue::U16(v)) => Some(*v),
            _ => None,
        }
    }

    fn str_of(&self, kind: AttributeKind) -> Option<&str> {
        match self.values.get(&kind) {
            Some(AttributeValue::String(text)) => Some(text),
            _ => None,
        }
    }

    fn position_of(&self, kind: AttributeKind) -> Option<Position> {
        match self.values.get(&kind) {
            Some(AttributeValue::Position(pos)) => Some(*pos),
            _ => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.str_of(AttributeKind::Description)
    }

    pub fn set_description(&mut self, text: impl Into<String>) {
        self.values
            .insert(AttributeKind::Description, AttributeValue::String(text.into()));
    }

    /// Add to the description, joining with a single space if one is set
    pub fn append_description(&mut self, text: &str) {
        match self.values.get_mut(&AttributeKind::Description) {
            Some(AttributeValue::String(existing)) => {
                existing.push(' ');
                existing.push_str(text);
            }
            _ => self.set_description(text),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.str_of(AttributeKind::Text)
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.values
            .insert(AttributeKind::Text, AttributeValue::String(text.into()));
    }

    pub fn spawn_file(&self) -> Option<&str> {
        self.str_of(AttributeKind::ExtSpawnFile)
    }

    pub fn house_file(&self) -> Option<&str> {
        self.str_of(AttributeKind::ExtHouseFile)
    }

    pub fn count(&self) -> Option<u8> {
        self.u8_of(AttributeKind::Count)
    }

    pub fn set_count(&mut self, count: u8) {
        self.values.insert(AttributeKind::Count, AttributeValue::U8(count));
    }

    pub fn action_id(&self) -> Option<u16> {
        self.u16_of(AttributeKind::ActionId)
    }

    pub fn set_action_id(&mut self, id: u16) {
        self.values.insert(AttributeKind::ActionId, AttributeValue::U16(id));
    }

    pub fn unique_id(&self) -> Option<u16> {
        self.u16_of(AttributeKind::UniqueId)
    }

    pub fn set_unique_id(&mut self, id: u16) {
        self.values.insert(AttributeKind::UniqueId, AttributeValue::U16(id));
    }

    pub fn house_door_id(&self) -> Option<u8> {
        self.u8_of(AttributeKind::HouseDoorId)
    }

    /// Item id stored inline on a tile
    pub fn tile_item(&self) -> Option<u16> {
        self.u16_of(AttributeKind::Item)
    }

    pub fn set_tile_item(&mut self, id: u16) {
        self.values.insert(AttributeKind::Item, AttributeValue::U16(id));
    }

    pub fn tile_flags(&self) -> Option<TileFlags> {
        match self.values.get(&AttributeKind::TileFlags) {
            Some(AttributeValue::U32(bits)) => Some(TileFlags(*bits)),
            _ => None,
        }
    }

    pub fn set_tile_flags(&mut self, flags: TileFlags) {
        self.values
            .insert(AttributeKind::TileFlags, AttributeValue::U32(flags.bits()));
    }

    pub fn teleport_destination(&self) -> Option<Position> {
        self.position_of(AttributeKind::TeleDest)
    }

    pub fn set_teleport_destination(&mut self, pos: Position) {
        self.values
            .insert(AttributeKind::TeleDest, AttributeValue::Position(pos));
    }

    /// Bytes [`encode_attributes`] will produce for this map
    pub fn encoded_len(&self) -> usize {
        let known: usize = self.values.values().map(|v| 1 + v.wire_len()).sum();
        let raw: usize = self.raw.iter().map(|r| 1 + r.data.len()).sum();
        known + raw
    }
}

fn check_shape(kind: AttributeKind, value: &AttributeValue) -> Result<()> {
    if value.shape() != kind.shape() {
        return Err(OtbmError::AttributeShape {
            attribute: kind.name(),
            expected: kind.shape().name(),
        });
    }
    Ok(())
}

/// Bytes to skip after an unknown tag, or `None` to stop decoding attributes
///
/// Tried in order:
/// 1. a plausible length prefix (1-999) with that many bytes left: a string
/// 2. tag below 0x20: 4 bytes, else 2, else 1
/// 3. otherwise 2 bytes
pub fn unknown_span(tag: u8, rest: &[u8]) -> Option<usize> {
    if rest.len() >= 2 {
        let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
        if (1..=999).contains(&len) && rest.len() - 2 >= len {
            return Some(2 + len);
        }
    }

    if tag < 0x20 {
        [4, 2, 1].into_iter().find(|&n| rest.len() >= n)
    } else if rest.len() >= 2 {
        Some(2)
    } else {
        None
    }
}

/// Attribute list decoder
///
/// Keeps a count of unknown tags seen so callers can report it.
#[derive(Debug, Clone)]
pub struct AttributeDecoder {
    policy: UnknownAttributePolicy,
    unknown_seen: usize,
}

impl AttributeDecoder {
    pub fn new(policy: UnknownAttributePolicy) -> Self {
        Self {
            policy,
            unknown_seen: 0,
        }
    }

    /// Unknown tags met so far, kept or not
    pub fn unknown_seen(&self) -> usize {
        self.unknown_seen
    }

    /// Decode an attribute list
    ///
    /// A repeated `Description` is appended to the earlier one with a single
    /// space; any other repeated tag replaces the earlier value.
    ///
    /// # Errors
    /// `UnexpectedEof` when a known tag's value is cut short.
    pub fn decode(&mut self, data: &[u8]) -> Result<AttributeMap> {
        let mut map = AttributeMap::new();
        let mut buf = data;

        while buf.remaining() >= 2 {
            let tag = buf.get_u8();

            let Some(kind) = AttributeKind::from_u8(tag) else {
                self.unknown_seen += 1;
                let span = unknown_span(tag, buf);
                let len = span.unwrap_or(buf.len());
                tracing::trace!(tag, len, "unknown attribute");

                if self.policy == UnknownAttributePolicy::Preserve {
                    map.push_raw(RawAttribute {
                        tag,
                        data: buf[..len].to_vec(),
                    });
                }
                buf.advance(len);

                if span.is_none() {
                    break;
                }
                continue;
            };

            let value = AttributeValue::read(kind.shape(), &mut buf)?;
            match (kind, value) {
                (AttributeKind::Description, AttributeValue::String(text)) => {
                    map.append_description(&text);
                }
                (kind, value) => {
                    map.values.insert(kind, value);
                }
            }
        }

        if buf.has_remaining() {
            tracing::trace!(remaining = buf.remaining(), "ignoring trailing attribute bytes");
        }

        Ok(map)
    }
}

/// Decode an attribute list with the default policy
pub fn decode_attributes(data: &[u8]) -> Result<AttributeMap> {
    AttributeDecoder::new(UnknownAttributePolicy::default()).decode(data)
}

/// Encode an attribute list: known attributes in tag order, then raw ones
///
/// # Errors
/// - `AttributeShape` for a value stored with the wrong shape
/// - string errors from [`write_string`]
pub fn encode_attributes(map: &AttributeMap, buf: &mut BytesMut) -> Result<()> {
    buf.reserve(map.encoded_len());

    for (kind, value) in map.iter() {
        check_shape(kind, value)?;
        buf.put_u8(kind.as_u8());
        value.write(buf)?;
    }

    for raw in map.raw() {
        buf.put_u8(raw.tag);
        buf.put_slice(&raw.data);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(map: &AttributeMap) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_attributes(map, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn test_attribute_tags() {
        for kind in AttributeKind::ALL {
            assert_eq!(AttributeKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(AttributeKind::Description.as_u8(), 0x01);
        assert_eq!(AttributeKind::BigObjectRef.as_u8(), 0x33);
        assert_eq!(AttributeKind::from_u8(0x0C), None);
    }

    #[test]
    fn test_text_attribute_wire_format() {
        let mut map = AttributeMap::new();
        map.set_text("hello world");

        let bytes = encode(&map);
        assert_eq!(bytes[0], 0x06);
        assert_eq!(&bytes[1..3], &[11, 0]);
        assert_eq!(&bytes[3..], b"hello world");

        let decoded = decode_attributes(&bytes).unwrap();
        assert_eq!(decoded.text(), Some("hello world"));
        assert_eq!(decoded, map);
    }

    #[test]
    fn test_description_concatenation() {
        let data = [
            0x01, 5, 0, b'f', b'i', b'r', b's', b't', //
            0x01, 6, 0, b's', b'e', b'c', b'o', b'n', b'd',
        ];
        let map = decode_attributes(&data).unwrap();
        assert_eq!(map.description(), Some("first second"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_repeated_fixed_attribute_overwrites() {
        let data = [0x0F, 1, 0x0F, 9];
        let map = decode_attributes(&data).unwrap();
        assert_eq!(map.count(), Some(9));
    }

    #[test]
    fn test_fixed_shapes() {
        let data = [
            0x0F, 5, // count
            0x04, 0xE8, 0x03, // action id 1000
            0x03, 0x05, 0x00, 0x00, 0x00, // flags
            0x08, 0x64, 0x00, 0xC8, 0x00, 0x07, // teleport destination
            0x0E, 3, // house door
        ];
        let map = decode_attributes(&data).unwrap();
        assert_eq!(map.count(), Some(5));
        assert_eq!(map.action_id(), Some(1000));
        assert_eq!(map.house_door_id(), Some(3));
        assert_eq!(map.teleport_destination(), Some(Position::new(100, 200, 7)));

        let flags = map.tile_flags().unwrap();
        assert!(flags.contains(TileFlags::PROTECTION_ZONE));
        assert!(flags.contains(TileFlags::NO_PVP));
        assert!(!flags.contains(TileFlags::NO_LOGOUT));
    }

    #[test]
    fn test_stops_with_one_byte_left() {
        let data = [0x0F, 2, 0x0F];
        let map = decode_attributes(&data).unwrap();
        assert_eq!(map.count(), Some(2));
    }

    #[test]
    fn test_truncated_known_value_is_error() {
        let data = [0x04, 0x01];
        assert!(matches!(
            decode_attributes(&data),
            Err(OtbmError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_unknown_span_heuristic() {
        // Plausible string
        assert_eq!(unknown_span(0x40, &[3, 0, b'a', b'b', b'c']), Some(5));
        // Length prefix too large for what is left: low tag takes 4
        assert_eq!(unknown_span(0x11, &[9, 0, 1, 2]), Some(4));
        assert_eq!(unknown_span(0x11, &[0, 0, 1]), Some(2));
        assert_eq!(unknown_span(0x11, &[7]), Some(1));
        assert_eq!(unknown_span(0x11, &[]), None);
        // High tag takes 2
        assert_eq!(unknown_span(0x40, &[0, 0, 1, 2, 3]), Some(2));
        assert_eq!(unknown_span(0x40, &[1]), None);
        // 1000 is not a plausible length
        let mut long = vec![0xE8, 0x03];
        long.extend(std::iter::repeat(0u8).take(1000));
        assert_eq!(unknown_span(0x40, &long), Some(2));
    }

    #[test]
    fn test_unknown_attribute_preserved() {
        let data = [0x0F, 4, 0x11, 0xAA, 0xBB, 0xCC, 0xDD, 0x06, 1, 0, b'x'];
        let mut decoder = AttributeDecoder::new(UnknownAttributePolicy::Preserve);
        let map = decoder.decode(&data).unwrap();

        assert_eq!(decoder.unknown_seen(), 1);
        assert_eq!(map.count(), Some(4));
        assert_eq!(map.text(), Some("x"));
        assert_eq!(
            map.raw(),
            &[RawAttribute {
                tag: 0x11,
                data: vec![0xAA, 0xBB, 0xCC, 0xDD]
            }]
        );

        // Known ones first, then the raw bytes unchanged
        assert_eq!(
            encode(&map),
            vec![0x06, 1, 0, b'x', 0x0F, 4, 0x11, 0xAA, 0xBB, 0xCC, 0xDD]
        );
    }

    #[test]
    fn test_unknown_attribute_discarded() {
        let data = [0x11, 0xAA, 0xBB, 0xCC, 0xDD, 0x0F, 4];
        let mut decoder = AttributeDecoder::new(UnknownAttributePolicy::Discard);
        let map = decoder.decode(&data).unwrap();

        assert_eq!(decoder.unknown_seen(), 1);
        assert!(map.raw().is_empty());
        assert_eq!(map.count(), Some(4));
    }

    #[test]
    fn test_insert_checks_shape() {
        let mut map = AttributeMap::new();
        assert!(map
            .insert(AttributeKind::ActionId, AttributeValue::U16(100))
            .is_ok());
        assert!(matches!(
            map.insert(AttributeKind::Count, AttributeValue::U16(100)),
            Err(OtbmError::AttributeShape { attribute: "count", expected: "u8" })
        ));
    }

    #[test]
    fn test_encoded_len_matches_output() {
        let mut map = AttributeMap::new();
        map.set_description("a house");
        map.set_tile_flags(TileFlags::PROTECTION_ZONE | TileFlags::REFRESH);
        map.set_teleport_destination(Position::new(1, 2, 3));
        map.push_raw(RawAttribute { tag: 0x40, data: vec![1, 2] });

        assert_eq!(encode(&map).len(), map.encoded_len());
    }
}
