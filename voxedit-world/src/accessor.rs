//! Batched reads and writes at arbitrary world coordinates.
//!
//! Requests are grouped by chunk and then by section so each section is
//! looked up once, and results are scattered back to the caller's order.

use std::collections::BTreeMap;

use crate::dimension::Dimension;
use crate::error::{Result, WorldError};
use crate::geometry::Vector;
use crate::lighting::{RelightReport, update_lights_by_coord};
use crate::section::{LightKind, MAX_LIGHT, SECTION_SHIFT, SectionCoord};

/// Per-cell arrays a request can read or write.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Blocks,
    Data,
    BlockLight,
    SkyLight,
    Biomes,
}

impl Channel {
    pub const ALL: [Channel; 5] = [Channel::Blocks, Channel::Data, Channel::BlockLight, Channel::SkyLight, Channel::Biomes];
}

/// Broadcast length of a set of arrays: each must have length 1 or the
/// common length.
fn broadcast_len(lengths: &[(&'static str, usize)]) -> Result<usize> {
    let n = if lengths.iter().any(|&(_, len)| len == 0) {
        0
    } else {
        lengths.iter().map(|&(_, len)| len).max().unwrap_or(0)
    };
    for &(what, len) in lengths {
        if len != n && len != 1 {
            return Err(WorldError::ShapeMismatch { what, expected: n, found: len });
        }
    }
    Ok(n)
}

fn at<T: Copy>(values: &[T], i: usize) -> T {
    if values.len() == 1 { values[0] } else { values[i] }
}

/// World coordinates after broadcasting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Coords {
    pub xs: Vec<i32>,
    pub ys: Vec<i32>,
    pub zs: Vec<i32>,
}

impl Coords {
    /// Broadcast x, y and z arrays to a common length. A length-1 array
    /// repeats; any other mismatch is an error.
    pub fn broadcast(xs: &[i32], ys: &[i32], zs: &[i32]) -> Result<Self> {
        let n = broadcast_len(&[("xs", xs.len()), ("ys", ys.len()), ("zs", zs.len())])?;
        Ok(Self {
            xs: (0..n).map(|i| at(xs, i)).collect(),
            ys: (0..n).map(|i| at(ys, i)).collect(),
            zs: (0..n).map(|i| at(zs, i)).collect(),
        })
    }

    pub fn from_points(points: &[Vector<i32>]) -> Self {
        Self {
            xs: points.iter().map(|p| p.x).collect(),
            ys: points.iter().map(|p| p.y).collect(),
            zs: points.iter().map(|p| p.z).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn get(&self, i: usize) -> Vector<i32> {
        Vector::new(self.xs[i], self.ys[i], self.zs[i])
    }

    /// Indices of in-bounds coordinates grouped by chunk, then by section y.
    fn group(&self, dim: &Dimension) -> BTreeMap<(i32, i32), BTreeMap<i32, Vec<usize>>> {
        let mut groups: BTreeMap<(i32, i32), BTreeMap<i32, Vec<usize>>> = BTreeMap::new();
        for i in 0..self.len() {
            let p = self.get(i);
            if !dim.in_bounds(p.x, p.y, p.z) {
                continue;
            }
            groups
                .entry((p.x >> SECTION_SHIFT, p.z >> SECTION_SHIFT))
                .or_default()
                .entry(p.y >> SECTION_SHIFT)
                .or_default()
                .push(i);
        }
        groups
    }
}

/// Result of [`get_blocks`]. Channels that were not requested are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockValues {
    pub blocks: Option<Vec<u16>>,
    pub data: Option<Vec<u8>>,
    pub block_light: Option<Vec<u8>>,
    pub sky_light: Option<Vec<u8>>,
    pub biomes: Option<Vec<u8>>,
    /// False where the coordinate was out of bounds or its chunk is absent.
    pub present: Vec<bool>,
}

/// Read the requested channels at every coordinate. Cells in absent chunks
/// or outside the dimension read as zero.
pub fn get_blocks(dim: &mut Dimension, coords: &Coords, want: &[Channel]) -> Result<BlockValues> {
    let n = coords.len();
    let wants = |c: Channel| want.contains(&c);
    let mut out = BlockValues {
        blocks: wants(Channel::Blocks).then(|| vec![0; n]),
        data: wants(Channel::Data).then(|| vec![0; n]),
        block_light: wants(Channel::BlockLight).then(|| vec![0; n]),
        sky_light: wants(Channel::SkyLight).then(|| vec![0; n]),
        biomes: wants(Channel::Biomes).then(|| vec![0; n]),
        present: vec![false; n],
    };

    for ((cx, cz), sections) in coords.group(dim) {
        let chunk = match dim.try_chunk(cx, cz) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => continue,
            Err(e) if e.is_recoverable() => {
                log::warn!("Reading as empty: {}", e);
                dim.metrics().record_chunk_failure();
                continue;
            }
            Err(e) => return Err(e),
        };
        for (cy, indices) in sections {
            let section = chunk.section(cy);
            for i in indices {
                let c = SectionCoord::from(coords.get(i));
                out.present[i] = true;
                if let Some(biomes) = out.biomes.as_mut() {
                    biomes[i] = chunk.biome(c.lx, c.lz);
                }
                match section {
                    Some(section) => {
                        let j = c.index();
                        if let Some(v) = out.blocks.as_mut() {
                            v[i] = section.blocks[j];
                        }
                        if let Some(v) = out.data.as_mut() {
                            v[i] = section.data[j];
                        }
                        if let Some(v) = out.block_light.as_mut() {
                            v[i] = section.block_light[j];
                        }
                        if let Some(v) = out.sky_light.as_mut() {
                            v[i] = section.sky_light[j];
                        }
                    }
                    None => {
                        if let Some(v) = out.sky_light.as_mut() {
                            v[i] = chunk.implicit_sky_light(c.lx, coords.ys[i], c.lz);
                        }
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Values to write. Each present array has length 1 (applied everywhere) or
/// the coordinate count.
#[derive(Clone, Debug, Default)]
pub struct BlockWrites {
    pub blocks: Option<Vec<u16>>,
    pub data: Option<Vec<u8>>,
    pub block_light: Option<Vec<u8>>,
    pub sky_light: Option<Vec<u8>>,
    pub biomes: Option<Vec<u8>>,
}

impl BlockWrites {
    pub fn block(id: u16, meta: u8) -> Self {
        Self { blocks: Some(vec![id]), data: Some(vec![meta]), ..Default::default() }
    }

    fn check(&self, n: usize) -> Result<()> {
        let mut lengths = vec![("coords", n)];
        for (what, len) in [
            ("Blocks", self.blocks.as_ref().map(Vec::len)),
            ("Data", self.data.as_ref().map(Vec::len)),
            ("BlockLight", self.block_light.as_ref().map(Vec::len)),
            ("SkyLight", self.sky_light.as_ref().map(Vec::len)),
            ("Biomes", self.biomes.as_ref().map(Vec::len)),
        ] {
            if let Some(len) = len {
                lengths.push((what, len));
            }
        }
        let m = broadcast_len(&lengths)?;
        if m != n {
            return Err(WorldError::ShapeMismatch { what: "coords", expected: m, found: n });
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SetOptions {
    pub update_lights: bool,
    /// Allocate missing chunks. Without it, writes to absent chunks are dropped.
    pub create: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self { update_lights: true, create: true }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SetReport {
    pub written: usize,
    pub dropped: usize,
    pub relight: Option<RelightReport>,
}

/// Write the given channels at every coordinate. Biomes use only x and z.
/// Relighting, when requested, runs once after all writes.
pub fn set_blocks(dim: &mut Dimension, coords: &Coords, writes: &BlockWrites, options: SetOptions) -> Result<SetReport> {
    writes.check(coords.len())?;
    let blocktypes = dim.blocktypes_arc();
    let mut report = SetReport::default();
    let mut relight = Vec::new();

    let groups = coords.group(dim);
    report.dropped = coords.len() - groups.values().flat_map(|s| s.values()).map(Vec::len).sum::<usize>();

    for ((cx, cz), sections) in groups {
        let chunk = match dim.get_chunk(cx, cz, options.create) {
            Ok(chunk) => chunk,
            Err(e) if e.is_recoverable() => {
                if !e.is_chunk_not_present() {
                    log::warn!("Skipping writes to chunk ({}, {}): {}", cx, cz, e);
                    dim.metrics().record_chunk_failure();
                }
                report.dropped += sections.values().map(Vec::len).sum::<usize>();
                continue;
            }
            Err(e) => return Err(e),
        };

        for (cy, indices) in sections {
            if let Some(biomes) = &writes.biomes {
                for &i in &indices {
                    let c = SectionCoord::from(coords.get(i));
                    chunk.set_biome(c.lx, c.lz, at(biomes, i));
                }
            }

            let touches_section = writes.blocks.is_some()
                || writes.data.is_some()
                || writes.block_light.is_some()
                || writes.sky_light.is_some();
            if !touches_section {
                report.written += indices.len();
                continue;
            }

            // skip allocating a section when every write matches what an
            // absent section already reads as
            if chunk.section(cy).is_none() {
                let all_implicit = indices.iter().all(|&i| {
                    let c = SectionCoord::from(coords.get(i));
                    writes.blocks.as_ref().is_none_or(|v| at(v, i) == 0)
                        && writes.data.as_ref().is_none_or(|v| at(v, i) == 0)
                        && writes.block_light.as_ref().is_none_or(|v| at(v, i) == 0)
                        && writes.sky_light.as_ref().is_none_or(|v| {
                            at(v, i) == chunk.implicit_sky_light(c.lx, coords.ys[i], c.lz)
                        })
                });
                if all_implicit {
                    report.written += indices.len();
                    continue;
                }
            }

            let section = chunk.get_or_create_section(cy);
            for &i in &indices {
                let c = SectionCoord::from(coords.get(i));
                let j = c.index();
                if let Some(blocks) = &writes.blocks {
                    let old = section.blocks[j];
                    let new = at(blocks, i);
                    section.blocks[j] = new;
                    if blocktypes.lighting_differs(old, new) {
                        relight.push(coords.get(i));
                    }
                }
                if let Some(data) = &writes.data {
                    section.data[j] = at(data, i);
                }
                if let Some(light) = &writes.block_light {
                    section.set_light(LightKind::Block, c.lx, c.ly, c.lz, at(light, i).min(MAX_LIGHT));
                }
                if let Some(light) = &writes.sky_light {
                    section.set_light(LightKind::Sky, c.lx, c.ly, c.lz, at(light, i).min(MAX_LIGHT));
                }
            }
            report.written += indices.len();
        }
    }

    if relight.is_empty() {
        return Ok(report);
    }
    if options.update_lights {
        report.relight = Some(update_lights_by_coord(dim, &relight)?);
    } else {
        dim.update_heights(relight.iter().map(|p| (p.x, p.z)))?;
    }
    Ok(report)
}
