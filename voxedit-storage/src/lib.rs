//! Chunk persistence backends.
//!
//! Backends store opaque, already-encoded chunk blobs keyed by chunk
//! coordinates. Encoding and decoding is the caller's business.

use anyhow::Result;

pub mod dir;
pub mod memory;

pub use dir::DirStorage;
pub use memory::MemoryStorage;

pub trait ChunkStorage: Send + Sync {
    fn read_chunk(&self, cx: i32, cz: i32) -> Result<Option<Vec<u8>>>;
    fn write_chunk(&self, cx: i32, cz: i32, data: &[u8]) -> Result<()>;
    fn delete_chunk(&self, cx: i32, cz: i32) -> Result<()>;
    fn contains_chunk(&self, cx: i32, cz: i32) -> Result<bool>;
    /// All stored chunk positions, in no particular order.
    fn list_chunks(&self) -> Result<Vec<(i32, i32)>>;
}
