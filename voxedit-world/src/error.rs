use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

#[derive(Debug)]
pub enum WorldError {
    /// The chunk does not exist and the caller did not ask to create it.
    ChunkNotPresent { cx: i32, cz: i32 },
    /// Coordinate or value arrays that cannot be broadcast together.
    ShapeMismatch { what: &'static str, expected: usize, found: usize },
    /// Block name or id that the palette does not know.
    UnknownBlock(String),
    /// Palette definition could not be parsed.
    InvalidPalette(String),
    /// A stored chunk that could not be decoded or encoded.
    Codec { cx: i32, cz: i32, source: anyhow::Error },
    /// The storage backend failed.
    Storage(anyhow::Error),
}

impl WorldError {
    /// Errors that only affect a single chunk. Long operations log these and
    /// move on to the next chunk.
    pub fn is_recoverable(&self) -> bool {
        match self {
            WorldError::ChunkNotPresent { .. } => true,
            WorldError::Codec { .. } => true,
            WorldError::ShapeMismatch { .. } => false,
            WorldError::UnknownBlock(_) => false,
            WorldError::InvalidPalette(_) => false,
            WorldError::Storage(_) => false,
        }
    }

    pub fn is_chunk_not_present(&self) -> bool {
        matches!(self, WorldError::ChunkNotPresent { .. })
    }
}

impl Display for WorldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldError::ChunkNotPresent { cx, cz } => write!(f, "Chunk ({}, {}) is not present", cx, cz),
            WorldError::ShapeMismatch { what, expected, found } => {
                write!(f, "Cannot broadcast {} of length {} to length {}", what, found, expected)
            }
            WorldError::UnknownBlock(name) => write!(f, "Unknown block type: {}", name),
            WorldError::InvalidPalette(msg) => write!(f, "Invalid block palette: {}", msg),
            WorldError::Codec { cx, cz, source } => write!(f, "Chunk ({}, {}) codec error: {:#}", cx, cz, source),
            WorldError::Storage(e) => write!(f, "Storage error: {:#}", e),
        }
    }
}

impl Error for WorldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorldError::Codec { source, .. } => Some(&**source),
            WorldError::Storage(e) => Some(&**e),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for WorldError {
    fn from(e: anyhow::Error) -> Self {
        WorldError::Storage(e)
    }
}

pub type Result<T> = std::result::Result<T, WorldError>;
