use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for a spatial cell ("landblock"), derived from world grid
/// coordinates. The world is a 256x256 grid of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId {
    /// East-west grid coordinate.
    pub x: u8,
    /// North-south grid coordinate.
    pub y: u8,
}

impl CellId {
    /// Create a cell id from grid coordinates.
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// The packed integer form, `x` in the high byte.
    pub fn raw(self) -> u16 {
        (u16::from(self.x) << 8) | u16::from(self.y)
    }

    /// Unpack a cell id from its raw form.
    pub fn from_raw(raw: u16) -> Self {
        Self {
            x: (raw >> 8) as u8,
            y: (raw & 0xFF) as u8,
        }
    }

    /// The up-to-eight grid neighbors of this cell. Cells on the world edge
    /// have fewer.
    pub fn neighbors(self) -> Vec<CellId> {
        let mut out = Vec::with_capacity(8);
        for dx in -1i16..=1 {
            for dy in -1i16..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = i16::from(self.x) + dx;
                let ny = i16::from(self.y) + dy;
                if (0..=255).contains(&nx) && (0..=255).contains(&ny) {
                    out.push(CellId::new(nx as u8, ny as u8));
                }
            }
        }
        out
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.raw())
    }
}

/// A cell-qualified world position: local coordinates within a cell plus a
/// heading in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// The cell this position lies in.
    pub cell: CellId,
    /// Local east-west coordinate within the cell, 0..=192.
    pub x: f32,
    /// Local north-south coordinate within the cell, 0..=192.
    pub y: f32,
    /// Height.
    pub z: f32,
    /// Facing, degrees clockwise from north.
    pub heading: f32,
}

/// The local coordinate extent of a cell.
pub const CELL_EXTENT: f32 = 192.0;

impl Position {
    /// Create a position at the given local coordinates with zero heading.
    pub fn new(cell: CellId, x: f32, y: f32, z: f32) -> Self {
        Self {
            cell,
            x,
            y,
            z,
            heading: 0.0,
        }
    }

    /// A copy of this position translated by a local offset, staying in the
    /// same cell. Coordinates are clamped to the cell interior.
    pub fn offset(&self, dx: f32, dy: f32, dz: f32) -> Self {
        Self {
            cell: self.cell,
            x: (self.x + dx).clamp(0.0, CELL_EXTENT),
            y: (self.y + dy).clamp(0.0, CELL_EXTENT),
            z: self.z + dz,
            heading: self.heading,
        }
    }

    /// Whether the local coordinates fall inside the cell extent.
    pub fn in_bounds(&self) -> bool {
        (0.0..=CELL_EXTENT).contains(&self.x) && (0.0..=CELL_EXTENT).contains(&self.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:.1} {:.1} {:.1}]",
            self.cell, self.x, self.y, self.z
        )
    }
}
