//! Chunk coordinates and world <-> chunk-local conversion.
//!
//! A chunk covers 16x16 blocks horizontally. All conversions use arithmetic
//! shifts and masks, so negative coordinates round toward negative infinity:
//! block x = -1 lives in chunk x = -1 at local x = 15.

use std::fmt;

/// Horizontal size of a chunk in blocks.
pub const CHUNK_WIDTH: usize = 16;

/// Bits to shift a block coordinate by to get its chunk coordinate.
pub const CHUNK_SHIFT: u32 = 4;

/// Mask to apply to a block coordinate to get its chunk-local coordinate.
pub const LOCAL_MASK: i32 = 0xF;

/// Coordinates for a chunk in the world.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the block at integer world coordinates.
    #[inline]
    pub const fn from_world(x: i32, z: i32) -> Self {
        Self {
            x: x >> CHUNK_SHIFT,
            z: z >> CHUNK_SHIFT,
        }
    }

    /// Chunk containing a (possibly fractional) world position.
    #[inline]
    pub fn from_world_f64(x: f64, z: f64) -> Self {
        Self::from_world(x.floor() as i32, z.floor() as i32)
    }

    /// World coordinates of the chunk's (0, 0) local corner.
    #[inline]
    pub const fn world_origin(&self) -> (i32, i32) {
        (self.x << CHUNK_SHIFT, self.z << CHUNK_SHIFT)
    }

    /// Convert local coordinates back to world coordinates.
    #[inline]
    pub const fn local_to_world(&self, local_x: usize, local_z: usize) -> (i32, i32) {
        let (ox, oz) = self.world_origin();
        (ox + local_x as i32, oz + local_z as i32)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Convert a world block coordinate to its chunk-local coordinate (0-15).
#[inline]
pub const fn local_coord(coord: i32) -> usize {
    (coord & LOCAL_MASK) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_one_maps_to_last_local() {
        assert_eq!(ChunkPos::from_world(-1, -1), ChunkPos::new(-1, -1));
        assert_eq!(local_coord(-1), 15);
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(ChunkPos::from_world(15, 16), ChunkPos::new(0, 1));
        assert_eq!(ChunkPos::from_world(-16, -17), ChunkPos::new(-1, -2));
        assert_eq!(local_coord(16), 0);
        assert_eq!(local_coord(-16), 0);
        assert_eq!(local_coord(-17), 15);
    }

    #[test]
    fn test_fractional_positions_floor() {
        assert_eq!(ChunkPos::from_world_f64(-0.5, 0.5), ChunkPos::new(-1, 0));
        assert_eq!(ChunkPos::from_world_f64(31.99, -15.99), ChunkPos::new(1, -1));
        assert_eq!(ChunkPos::from_world_f64(-16.0, 16.0), ChunkPos::new(-1, 1));
    }

    #[test]
    fn test_round_trip() {
        // Every block in a spread of chunks must reconstruct from (chunk, local).
        for x in -70..70 {
            for z in [-1_000_003, -33, -1, 0, 17, 999_999] {
                let pos = ChunkPos::from_world(x, z);
                let (wx, wz) = pos.local_to_world(local_coord(x), local_coord(z));
                assert_eq!((wx, wz), (x, z), "Mismatch for ({}, {})", x, z);
            }
        }
    }

    #[test]
    fn test_extremes() {
        for v in [i32::MIN, i32::MIN + 15, i32::MAX - 15, i32::MAX] {
            let pos = ChunkPos::from_world(v, v);
            assert_eq!(pos.local_to_world(local_coord(v), local_coord(v)), (v, v));
        }
    }
}
