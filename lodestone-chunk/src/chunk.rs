//! In-memory chunk storage.
//!
//! A chunk is a 16-wide column of 16x16x16 sections stacked vertically.
//! Only sections containing at least one non-air block are kept, so the
//! vertical axis is unbounded in both directions.

use std::collections::BTreeMap;

use crate::pos::{CHUNK_SHIFT, CHUNK_WIDTH, ChunkPos, LOCAL_MASK};

/// Runtime id reserved for air.
pub const AIR: u32 = 0;

/// Number of blocks in one section (16 * 16 * 16).
pub const SECTION_VOLUME: usize = 4096;

/// A 16x16x16 cube of block runtime ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    blocks: Box<[u32; SECTION_VOLUME]>,
    non_air: u16,
}

impl Section {
    pub fn new() -> Self {
        Self {
            blocks: Box::new([AIR; SECTION_VOLUME]),
            non_air: 0,
        }
    }

    /// Build a section from a flat array in `y, z, x` order.
    /// Returns None if the slice is not exactly one section long.
    pub fn from_ids(ids: &[u32]) -> Option<Self> {
        let blocks: Box<[u32; SECTION_VOLUME]> = ids.to_vec().into_boxed_slice().try_into().ok()?;
        let non_air = blocks.iter().filter(|&&id| id != AIR).count() as u16;
        Some(Self { blocks, non_air })
    }

    #[inline]
    fn index(x: usize, y: usize, z: usize) -> usize {
        (y << 8) | (z << 4) | x
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> u32 {
        self.blocks[Self::index(x, y, z)]
    }

    /// Returns the id previously stored at the position.
    pub fn set(&mut self, x: usize, y: usize, z: usize, id: u32) -> u32 {
        let slot = &mut self.blocks[Self::index(x, y, z)];
        let old = std::mem::replace(slot, id);
        match (old == AIR, id == AIR) {
            (true, false) => self.non_air += 1,
            (false, true) => self.non_air -= 1,
            _ => {}
        }
        old
    }

    pub fn is_empty(&self) -> bool {
        self.non_air == 0
    }

    /// Raw ids in `y, z, x` order.
    pub fn ids(&self) -> &[u32] {
        &self.blocks[..]
    }

    /// Highest local y with a non-air block in the given column.
    fn highest_in_column(&self, x: usize, z: usize) -> Option<usize> {
        (0..16).rev().find(|&y| self.get(x, y, z) != AIR)
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::new()
    }
}

/// A vertical column of block data identified by its [`ChunkPos`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pos: ChunkPos,
    sections: BTreeMap<i32, Section>,
}

#[inline]
fn check_local(x: usize, z: usize) {
    assert!(
        x < CHUNK_WIDTH && z < CHUNK_WIDTH,
        "local chunk coordinates out of range: ({}, {})",
        x,
        z
    );
}

#[inline]
fn split_y(y: i32) -> (i32, usize) {
    (y >> CHUNK_SHIFT, (y & LOCAL_MASK) as usize)
}

impl Chunk {
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            sections: BTreeMap::new(),
        }
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Runtime id at chunk-local `x`/`z` (0-15) and world `y`.
    pub fn get_block_runtime_id(&self, x: usize, y: i32, z: usize) -> u32 {
        check_local(x, z);
        let (section_y, local_y) = split_y(y);
        self.sections
            .get(&section_y)
            .map_or(AIR, |section| section.get(x, local_y, z))
    }

    /// Write a runtime id, returning the previous one.
    pub fn set_block_runtime_id(&mut self, x: usize, y: i32, z: usize, id: u32) -> u32 {
        check_local(x, z);
        let (section_y, local_y) = split_y(y);

        if id == AIR {
            let Some(section) = self.sections.get_mut(&section_y) else {
                return AIR;
            };
            let old = section.set(x, local_y, z, AIR);
            if section.is_empty() {
                self.sections.remove(&section_y);
            }
            return old;
        }

        self.sections
            .entry(section_y)
            .or_default()
            .set(x, local_y, z, id)
    }

    /// World y of the highest non-air block in the column, or None if the
    /// column is entirely air.
    pub fn get_highest_block_at(&self, x: usize, z: usize) -> Option<i32> {
        check_local(x, z);
        self.sections.iter().rev().find_map(|(&section_y, section)| {
            section
                .highest_in_column(x, z)
                .map(|local_y| (section_y << CHUNK_SHIFT) + local_y as i32)
        })
    }

    /// Non-empty sections, bottom to top.
    pub fn sections(&self) -> impl Iterator<Item = (i32, &Section)> {
        self.sections.iter().map(|(&y, s)| (y, s))
    }

    /// Replace a whole section. Empty sections are dropped.
    pub fn insert_section(&mut self, section_y: i32, section: Section) {
        if section.is_empty() {
            self.sections.remove(&section_y);
        } else {
            self.sections.insert(section_y, section);
        }
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
