//! Block type registry.
//!
//! A palette is loaded once from a JSON document and then answered from
//! flat lookup tables indexed by numeric block id.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorldError};
use crate::section::MAX_LIGHT;

pub const AIR_ID: u16 = 0;

/// Opacity and brightness of ids the palette does not define.
const UNDEFINED_OPACITY: u8 = MAX_LIGHT;
const UNDEFINED_BRIGHTNESS: u8 = 0;

const NAMESPACE: &str = "minecraft:";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockType {
    pub id: u16,
    #[serde(default)]
    pub meta: u8,
    pub internal_name: String,
    #[serde(default)]
    pub display_name: String,
    /// How much light is absorbed passing through, 0..=15.
    #[serde(default)]
    pub opacity: u8,
    /// Light emitted by the block itself, 0..=15.
    #[serde(default)]
    pub brightness: u8,
}

impl BlockType {
    pub fn air() -> Self {
        Self {
            id: AIR_ID,
            meta: 0,
            internal_name: format!("{}air", NAMESPACE),
            display_name: "Air".to_string(),
            opacity: 0,
            brightness: 0,
        }
    }

    pub fn is_air(&self) -> bool {
        self.id == AIR_ID
    }

    pub fn key(&self) -> (u16, u8) {
        (self.id, self.meta)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.display_name, self.id, self.meta)
    }
}

pub struct BlockTypeSet {
    name: String,
    types: Vec<BlockType>,
    by_key: HashMap<(u16, u8), usize>,
    by_name: HashMap<String, usize>,
    opacity: Vec<u8>,
    brightness: Vec<u8>,
}

impl BlockTypeSet {
    pub fn new(name: impl Into<String>, mut types: Vec<BlockType>) -> Result<Self> {
        if !types.iter().any(|t| t.key() == (AIR_ID, 0)) {
            types.insert(0, BlockType::air());
        }

        let id_limit = types.iter().map(|t| t.id as usize + 1).max().unwrap_or(1);
        let mut opacity = vec![UNDEFINED_OPACITY; id_limit];
        let mut brightness = vec![UNDEFINED_BRIGHTNESS; id_limit];
        let mut by_key = HashMap::with_capacity(types.len());
        let mut by_name = HashMap::with_capacity(types.len());
        // ids whose lighting row already came from their meta 0 entry
        let mut from_meta_zero = vec![false; id_limit];
        let mut seen_id = vec![false; id_limit];

        for (i, t) in types.iter().enumerate() {
            if t.opacity > MAX_LIGHT || t.brightness > MAX_LIGHT {
                return Err(WorldError::InvalidPalette(format!(
                    "{} has opacity {} / brightness {} outside 0..=15",
                    t.internal_name, t.opacity, t.brightness
                )));
            }
            if by_key.insert(t.key(), i).is_some() {
                return Err(WorldError::InvalidPalette(format!("duplicate block {}:{}", t.id, t.meta)));
            }
            if by_name.insert(t.internal_name.clone(), i).is_some() {
                return Err(WorldError::InvalidPalette(format!("duplicate internal name {}", t.internal_name)));
            }

            let id = t.id as usize;
            if !seen_id[id] || (t.meta == 0 && !from_meta_zero[id]) {
                opacity[id] = t.opacity;
                brightness[id] = t.brightness;
                seen_id[id] = true;
                from_meta_zero[id] = t.meta == 0;
            }
        }

        Ok(Self { name: name.into(), types, by_key, by_name, opacity, brightness })
    }

    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let types: Vec<BlockType> =
            serde_json::from_str(json).map_err(|e| WorldError::InvalidPalette(e.to_string()))?;
        Self::new(name, types)
    }

    /// The built-in pre-flattening palette.
    pub fn classic() -> Self {
        Self::from_json("classic", include_str!("../data/classic_blocks.json"))
            .unwrap_or_else(|e| panic!("built-in palette is broken: {}", e))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[BlockType] {
        &self.types
    }

    /// One past the largest defined id.
    pub fn id_limit(&self) -> usize {
        self.opacity.len()
    }

    pub fn opacity(&self, id: u16) -> u8 {
        self.opacity.get(id as usize).copied().unwrap_or(UNDEFINED_OPACITY)
    }

    /// Opacity as used by light propagation: never below 1.
    pub fn light_opacity(&self, id: u16) -> u8 {
        self.opacity(id).max(1)
    }

    pub fn brightness(&self, id: u16) -> u8 {
        self.brightness.get(id as usize).copied().unwrap_or(UNDEFINED_BRIGHTNESS)
    }

    /// Whether swapping `old` for `new` can change lighting.
    pub fn lighting_differs(&self, old: u16, new: u16) -> bool {
        self.opacity(old) != self.opacity(new) || self.brightness(old) != self.brightness(new)
    }

    pub fn get(&self, id: u16, meta: u8) -> Option<&BlockType> {
        self.by_key.get(&(id, meta)).map(|&i| &self.types[i])
    }

    /// Like [`get`](Self::get), falling back to the meta 0 variant.
    pub fn lookup(&self, id: u16, meta: u8) -> Option<&BlockType> {
        self.get(id, meta).or_else(|| self.get(id, 0))
    }

    pub fn by_name(&self, name: &str) -> Option<&BlockType> {
        let index = self
            .by_name
            .get(name)
            .or_else(|| self.by_name.get(&format!("{}{}", NAMESPACE, name)))?;
        Some(&self.types[*index])
    }

    pub fn internal_name(&self, id: u16) -> Option<&str> {
        self.lookup(id, 0).map(|t| t.internal_name.as_str())
    }

    pub fn id_for_internal_name(&self, name: &str) -> Option<u16> {
        self.by_name(name).map(|t| t.id)
    }

    pub fn air(&self) -> &BlockType {
        // air is inserted by the constructor when missing
        &self.types[self.by_key[&(AIR_ID, 0)]]
    }

    /// Resolve user input: `stone`, `minecraft:stone`, `1`, `1:2` or `wool:14`.
    pub fn parse(&self, text: &str) -> Result<BlockType> {
        let text = text.trim();
        if let Some(found) = self.parse_numeric(text) {
            return Ok(found);
        }
        if let Some(found) = self.by_name(text) {
            return Ok(found.clone());
        }
        if let Some((name, meta)) = text.rsplit_once(':') {
            if let (Some(base), Ok(meta)) = (self.by_name(name), meta.parse::<u8>()) {
                return self
                    .get(base.id, meta)
                    .cloned()
                    .ok_or_else(|| WorldError::UnknownBlock(text.to_string()));
            }
        }
        Err(WorldError::UnknownBlock(text.to_string()))
    }

    fn parse_numeric(&self, text: &str) -> Option<BlockType> {
        let (id, meta) = match text.split_once(':') {
            Some((id, meta)) => (id.parse::<u16>().ok()?, meta.parse::<u8>().ok()?),
            None => (text.parse::<u16>().ok()?, 0),
        };
        Some(self.get(id, meta).cloned().unwrap_or_else(|| BlockType {
            id,
            meta,
            internal_name: format!("{}:{}", id, meta),
            display_name: format!("Unknown Block {}:{}", id, meta),
            opacity: self.opacity(id),
            brightness: self.brightness(id),
        }))
    }

    /// Same definitions, so numeric ids can be copied without translation.
    pub fn same_numbering(&self, other: &BlockTypeSet) -> bool {
        self.types.len() == other.types.len()
            && self.types.iter().all(|t| other.get(t.id, t.meta).is_some_and(|o| o.internal_name == t.internal_name))
    }
}

impl fmt::Debug for BlockTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockTypeSet {{ name: {:?}, types: {} }}", self.name, self.types.len())
    }
}
