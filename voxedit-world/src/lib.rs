//! Chunked voxel world storage with block editing and relighting.

pub mod accessor;
pub mod blocktypes;
pub mod cache;
pub mod chunk;
pub mod convert;
pub mod copy;
pub mod dimension;
pub mod error;
pub mod fill;
pub mod geometry;
pub mod lighting;
pub mod mask;
pub mod nbt;
pub mod progress;
pub mod schematic;
pub mod section;
pub mod selection;
pub mod shape;

pub use accessor::{BlockValues, BlockWrites, Channel, Coords, SetOptions, SetReport, get_blocks, set_blocks};
pub use blocktypes::{BlockType, BlockTypeSet};
pub use copy::{CopyOptions, CopyReport, LightUpdate, copy_blocks};
pub use dimension::{Dimension, DimensionConfig};
pub use error::{Result, WorldError};
pub use fill::{FillOptions, FillReport, Replacement, fill_blocks, replace_blocks};
pub use geometry::{BoundingBox, Vector};
pub use lighting::{RelightReport, relight_selection, update_lights_by_coord};
pub use progress::{CancelToken, FnProgress, NoProgress, Progress};
pub use schematic::{copy_within, extract_schematic};
pub use section::LightKind;
pub use selection::{CombinedSelection, Selection, ShapedSelection, TranslatedSelection};
pub use shape::Shape;
