use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Result, anyhow};

use crate::ChunkStorage;

/// Keeps chunk blobs in a map. Used for schematics and tests.
#[derive(Default)]
pub struct MemoryStorage {
    chunks: RwLock<HashMap<(i32, i32), Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChunkStorage for MemoryStorage {
    fn read_chunk(&self, cx: i32, cz: i32) -> Result<Option<Vec<u8>>> {
        let chunks = self.chunks.read().map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(chunks.get(&(cx, cz)).cloned())
    }

    fn write_chunk(&self, cx: i32, cz: i32, data: &[u8]) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(|_| anyhow!("memory storage lock poisoned"))?;
        chunks.insert((cx, cz), data.to_vec());
        Ok(())
    }

    fn delete_chunk(&self, cx: i32, cz: i32) -> Result<()> {
        let mut chunks = self.chunks.write().map_err(|_| anyhow!("memory storage lock poisoned"))?;
        chunks.remove(&(cx, cz));
        Ok(())
    }

    fn contains_chunk(&self, cx: i32, cz: i32) -> Result<bool> {
        let chunks = self.chunks.read().map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(chunks.contains_key(&(cx, cz)))
    }

    fn list_chunks(&self) -> Result<Vec<(i32, i32)>> {
        let chunks = self.chunks.read().map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(chunks.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_delete() {
        let storage = MemoryStorage::new();
        assert!(storage.read_chunk(0, 0).unwrap().is_none());

        storage.write_chunk(3, -2, &[1, 2, 3]).unwrap();
        assert_eq!(storage.read_chunk(3, -2).unwrap(), Some(vec![1, 2, 3]));
        assert!(storage.contains_chunk(3, -2).unwrap());
        assert_eq!(storage.list_chunks().unwrap(), vec![(3, -2)]);

        storage.delete_chunk(3, -2).unwrap();
        assert!(!storage.contains_chunk(3, -2).unwrap());
        assert!(storage.is_empty());
    }
}
