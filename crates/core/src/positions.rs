//! Map position types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute map position (x/y in squares, z is the floor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

impl Position {
    pub const fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Position of a tile given as an offset inside a tile area
    ///
    /// Returns `None` when the offset would leave the u16 coordinate range.
    pub fn offset(self, dx: u8, dy: u8) -> Option<Position> {
        Some(Position {
            x: self.x.checked_add(dx as u16)?,
            y: self.y.checked_add(dy as u16)?,
            z: self.z,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        let area = Position::new(1000, 1000, 7);
        assert_eq!(area.offset(5, 5), Some(Position::new(1005, 1005, 7)));
        assert_eq!(Position::new(u16::MAX, 0, 0).offset(1, 0), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Position::new(32, 48, 7).to_string(), "(32, 48, 7)");
    }
}
