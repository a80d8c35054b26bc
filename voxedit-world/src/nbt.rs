//! NBT (Named Binary Tag) encoding of chunks for the storage backends.
//!
//! Layout follows the pre-flattening anvil chunk: each section keeps the low
//! byte of its block ids in `Blocks`, the high byte in `Add` (omitted when
//! zero) and nibble-packed `Data`, `BlockLight` and `SkyLight`. The blob is
//! zlib-compressed NBT.

use std::collections::HashMap;
use std::io::{Read, Write};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, Entity, TileEntity};
use crate::geometry::Vector;
use crate::section::{MAX_LIGHT, SECTION_VOLUME, Section, pack_nibbles, unpack_nibbles};

#[derive(Debug, Serialize, Deserialize)]
struct ChunkRoot {
    #[serde(rename = "Level")]
    level: Level,
}

#[derive(Debug, Serialize, Deserialize)]
struct Level {
    #[serde(rename = "xPos")]
    x_pos: i32,
    #[serde(rename = "zPos")]
    z_pos: i32,

    #[serde(rename = "Biomes")]
    biomes: fastnbt::ByteArray,

    #[serde(rename = "HeightMap")]
    height_map: fastnbt::IntArray,

    // Vertical slices of the chunk (16 blocks high each)
    #[serde(rename = "Sections")]
    sections: Vec<SectionTag>,

    #[serde(rename = "Entities", default)]
    entities: Vec<EntityTag>,

    #[serde(rename = "TileEntities", default)]
    tile_entities: Vec<TileEntityTag>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionTag {
    #[serde(rename = "Y")]
    y: i32,
    #[serde(rename = "Blocks")]
    blocks: fastnbt::ByteArray,
    // High byte of extended ids, only present when some id is above 255
    #[serde(rename = "Add", default, skip_serializing_if = "Option::is_none")]
    add: Option<fastnbt::ByteArray>,
    #[serde(rename = "Data")]
    data: fastnbt::ByteArray,
    #[serde(rename = "BlockLight")]
    block_light: fastnbt::ByteArray,
    #[serde(rename = "SkyLight")]
    sky_light: fastnbt::ByteArray,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntityTag {
    id: String,
    #[serde(rename = "Pos")]
    pos: Vec<f64>,
    #[serde(rename = "Tags", default)]
    tags: HashMap<String, fastnbt::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TileEntityTag {
    id: String,
    x: i32,
    y: i32,
    z: i32,
    #[serde(rename = "Tags", default)]
    tags: HashMap<String, fastnbt::Value>,
}

fn encode_section(section: &Section) -> SectionTag {
    let low: Vec<i8> = section.blocks.iter().map(|&b| (b & 0xff) as u8 as i8).collect();
    let add = if section.blocks.iter().any(|&b| b > 0xff) {
        Some(fastnbt::ByteArray::new(section.blocks.iter().map(|&b| (b >> 8) as u8 as i8).collect()))
    } else {
        None
    };
    SectionTag {
        y: section.y,
        blocks: fastnbt::ByteArray::new(low),
        add,
        data: fastnbt::ByteArray::new(pack_nibbles(&section.data)),
        block_light: fastnbt::ByteArray::new(pack_nibbles(&section.block_light)),
        sky_light: fastnbt::ByteArray::new(pack_nibbles(&section.sky_light)),
    }
}

fn decode_section(tag: SectionTag) -> Result<Section> {
    anyhow::ensure!(
        tag.blocks.len() == SECTION_VOLUME,
        "section {} has {} blocks, expected {}",
        tag.y,
        tag.blocks.len(),
        SECTION_VOLUME
    );
    let mut blocks: Vec<u16> = tag.blocks.iter().map(|&b| b as u8 as u16).collect();
    if let Some(add) = &tag.add {
        anyhow::ensure!(add.len() == SECTION_VOLUME, "section {} has a truncated Add array", tag.y);
        for (b, &hi) in blocks.iter_mut().zip(add.iter()) {
            *b |= (hi as u8 as u16) << 8;
        }
    }
    Ok(Section::from_arrays(
        tag.y,
        blocks,
        unpack_nibbles(&tag.data, SECTION_VOLUME),
        unpack_nibbles(&tag.block_light, SECTION_VOLUME),
        unpack_nibbles(&tag.sky_light, SECTION_VOLUME),
    ))
}

/// Air with full sky light and no block light reads back the same when absent.
fn is_implicit(section: &Section) -> bool {
    section.is_air()
        && section.block_light.iter().all(|&l| l == 0)
        && section.sky_light.iter().all(|&l| l == MAX_LIGHT)
}

/// Serialize and zlib-compress a chunk.
pub fn encode_chunk(chunk: &Chunk) -> Result<Vec<u8>> {
    let root = ChunkRoot {
        level: Level {
            x_pos: chunk.cx,
            z_pos: chunk.cz,
            biomes: fastnbt::ByteArray::new(chunk.biomes.iter().map(|&b| b as i8).collect()),
            height_map: fastnbt::IntArray::new(chunk.height_map().to_vec()),
            sections: chunk.sections().filter(|s| !is_implicit(s)).map(encode_section).collect(),
            entities: chunk
                .entities
                .iter()
                .map(|e| EntityTag {
                    id: e.id.clone(),
                    pos: vec![e.position.x, e.position.y, e.position.z],
                    tags: e.tags.clone(),
                })
                .collect(),
            tile_entities: chunk
                .tile_entities
                .iter()
                .map(|t| TileEntityTag {
                    id: t.id.clone(),
                    x: t.position.x,
                    y: t.position.y,
                    z: t.position.z,
                    tags: t.tags.clone(),
                })
                .collect(),
        },
    };

    let nbt_data = fastnbt::to_bytes(&root).context("Failed to serialize chunk NBT")?;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&nbt_data).context("Failed to compress chunk")?;
    encoder.finish().context("Failed to finish compression")
}

/// Inverse of [`encode_chunk`].
pub fn decode_chunk(bytes: &[u8], min_y: i32) -> Result<Chunk> {
    let mut nbt_data = Vec::new();
    ZlibDecoder::new(bytes)
        .read_to_end(&mut nbt_data)
        .context("Failed to decompress chunk")?;
    let root: ChunkRoot = fastnbt::from_bytes(&nbt_data).context("Failed to parse chunk NBT")?;
    let level = root.level;

    let sections = level.sections.into_iter().map(decode_section).collect::<Result<Vec<_>>>()?;
    let entities = level
        .entities
        .into_iter()
        .filter_map(|e| match e.pos.as_slice() {
            [x, y, z] => Some(Entity { id: e.id, position: Vector::new(*x, *y, *z), tags: e.tags }),
            _ => {
                log::warn!("Dropping entity {} with malformed position {:?}", e.id, e.pos);
                None
            }
        })
        .collect();
    let tile_entities = level
        .tile_entities
        .into_iter()
        .map(|t| TileEntity { id: t.id, position: Vector::new(t.x, t.y, t.z), tags: t.tags })
        .collect();

    Ok(Chunk::from_parts(
        level.x_pos,
        level.z_pos,
        min_y,
        sections,
        level.biomes.iter().map(|&b| b as u8).collect(),
        level.height_map.to_vec(),
        entities,
        tile_entities,
    ))
}
