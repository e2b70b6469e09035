//! Chunk serialization.
//!
//! Chunks are stored as an NBT compound, optionally wrapped in a compressed
//! blob with the layout `[length: 4 BE][compression: 1][data...]` where
//! `length` counts the compression byte plus the data.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use fastnbt::IntArray;
use flate2::Compression as ZlibCompression;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, SECTION_VOLUME, Section};
use crate::pos::ChunkPos;

/// Version written into every encoded chunk. Newer versions are rejected on decode.
pub const FORMAT_VERSION: i32 = 1;

/// Compression types for wrapped chunk blobs.
pub mod compression {
    pub const GZIP: u8 = 1;
    pub const ZLIB: u8 = 2;
    pub const NONE: u8 = 3;
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkNbt {
    #[serde(rename = "DataVersion")]
    data_version: i32,

    #[serde(rename = "xPos")]
    x_pos: i32,
    #[serde(rename = "zPos")]
    z_pos: i32,

    // Only non-empty sections are written
    #[serde(rename = "Sections", default)]
    sections: Vec<SectionNbt>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionNbt {
    #[serde(rename = "Y")]
    y: i32,

    // 4096 runtime ids in y, z, x order
    #[serde(rename = "Blocks")]
    blocks: IntArray,
}

/// Serialize a chunk to raw (uncompressed) NBT.
pub fn encode_chunk(chunk: &Chunk) -> Result<Vec<u8>> {
    let sections = chunk
        .sections()
        .map(|(y, section)| SectionNbt {
            y,
            blocks: IntArray::new(section.ids().iter().map(|&id| id as i32).collect()),
        })
        .collect();

    let pos = chunk.pos();
    let nbt = ChunkNbt {
        data_version: FORMAT_VERSION,
        x_pos: pos.x,
        z_pos: pos.z,
        sections,
    };

    fastnbt::to_bytes(&nbt).with_context(|| format!("Failed to encode chunk {}", pos))
}

/// Parse raw NBT back into a chunk.
pub fn decode_chunk(nbt_data: &[u8]) -> Result<Chunk> {
    let nbt: ChunkNbt = fastnbt::from_bytes(nbt_data).context("Failed to parse chunk NBT")?;

    if nbt.data_version > FORMAT_VERSION {
        anyhow::bail!(
            "Chunk ({}, {}) has format version {}, newest supported is {}",
            nbt.x_pos,
            nbt.z_pos,
            nbt.data_version,
            FORMAT_VERSION
        );
    }

    let mut chunk = Chunk::new(ChunkPos::new(nbt.x_pos, nbt.z_pos));
    for section in nbt.sections {
        let ids: Vec<u32> = section.blocks.iter().map(|&id| id as u32).collect();
        if ids.len() != SECTION_VOLUME {
            anyhow::bail!(
                "Section Y={} of chunk ({}, {}) has {} blocks, expected {}",
                section.y,
                nbt.x_pos,
                nbt.z_pos,
                ids.len(),
                SECTION_VOLUME
            );
        }
        if let Some(decoded) = Section::from_ids(&ids) {
            chunk.insert_section(section.y, decoded);
        }
    }

    Ok(chunk)
}

pub fn compress_and_wrap_chunk(nbt_data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), ZlibCompression::default());
    encoder.write_all(nbt_data)?;
    let compressed = encoder.finish()?;

    let total_len = (compressed.len() + 1) as u32; // +1 byte for the type
    let mut chunk_blob = Vec::with_capacity(5 + compressed.len());
    chunk_blob.extend_from_slice(&total_len.to_be_bytes());
    chunk_blob.push(compression::ZLIB);
    chunk_blob.extend_from_slice(&compressed);
    Ok(chunk_blob)
}

/// Unwrap and decompress a chunk blob.
/// Supports GZip (1), ZLib (2) and None (3).
pub fn unwrap_and_decompress_chunk(chunk_blob: &[u8]) -> Result<Vec<u8>> {
    if chunk_blob.len() < 5 {
        anyhow::bail!("Chunk blob too short");
    }

    let declared = u32::from_be_bytes([chunk_blob[0], chunk_blob[1], chunk_blob[2], chunk_blob[3]]) as usize;
    let compression_type = chunk_blob[4];
    let available = chunk_blob.len() - 4;
    if declared == 0 || declared > available {
        anyhow::bail!(
            "Chunk blob declares {} bytes but only {} are present",
            declared,
            available
        );
    }
    let compressed_data = &chunk_blob[5..4 + declared];

    match compression_type {
        compression::ZLIB => {
            let mut decoder = flate2::read::ZlibDecoder::new(compressed_data);
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed)?;
            Ok(decompressed)
        }
        compression::GZIP => {
            let mut decoder = flate2::read::GzDecoder::new(compressed_data);
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed)?;
            Ok(decompressed)
        }
        compression::NONE => Ok(compressed_data.to_vec()),
        _ => anyhow::bail!("Unknown compression type: {}", compression_type),
    }
}

/// Check that an NBT document belongs to the expected chunk.
pub fn verify_chunk_coords(nbt_data: &[u8], expected: ChunkPos) -> Result<()> {
    let nbt: fastnbt::Value = fastnbt::from_bytes(nbt_data)?;

    let fastnbt::Value::Compound(root) = nbt else {
        anyhow::bail!("NBT Root is not a Compound");
    };

    let (Some(x_tag), Some(z_tag)) = (root.get("xPos"), root.get("zPos")) else {
        anyhow::bail!("Could not find xPos/zPos in NBT root. Keys: {:?}", root.keys());
    };

    let x = x_tag.as_i64().ok_or_else(|| anyhow::anyhow!("xPos is not an int"))? as i32;
    let z = z_tag.as_i64().ok_or_else(|| anyhow::anyhow!("zPos is not an int"))? as i32;

    if x != expected.x || z != expected.z {
        anyhow::bail!(
            "NBT Coords mismatch! Expected {}, Found ({}, {})",
            expected,
            x,
            z
        );
    }
    Ok(())
}

/// Encode, compress and wrap in one step.
pub fn chunk_to_blob(chunk: &Chunk) -> Result<Vec<u8>> {
    compress_and_wrap_chunk(&encode_chunk(chunk)?)
}

/// Unwrap a blob and decode it, checking it belongs to `expected`.
pub fn blob_to_chunk(blob: &[u8], expected: ChunkPos) -> Result<Chunk> {
    let nbt = unwrap_and_decompress_chunk(blob)?;
    verify_chunk_coords(&nbt, expected)?;
    decode_chunk(&nbt)
}
