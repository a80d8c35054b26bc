//! One file per chunk inside a world directory.
//!
//! File names follow `c.<x>.<z>.dat`, so a directory listing is enough to
//! enumerate stored chunks.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::ChunkStorage;

pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create world directory {}", root.display()))?;
        log::debug!("Opened chunk directory {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chunk_path(&self, cx: i32, cz: i32) -> PathBuf {
        self.root.join(format!("c.{}.{}.dat", cx, cz))
    }
}

/// Parse `c.<x>.<z>.dat` back into chunk coordinates.
pub fn parse_chunk_file_name(name: &str) -> Option<(i32, i32)> {
    let rest = name.strip_prefix("c.")?.strip_suffix(".dat")?;
    let (x, z) = rest.split_once('.')?;
    Some((x.parse().ok()?, z.parse().ok()?))
}

impl ChunkStorage for DirStorage {
    fn read_chunk(&self, cx: i32, cz: i32) -> Result<Option<Vec<u8>>> {
        let path = self.chunk_path(cx, cz);
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn write_chunk(&self, cx: i32, cz: i32, data: &[u8]) -> Result<()> {
        let path = self.chunk_path(cx, cz);
        // Write to a sibling file and rename so a crash never leaves half a chunk.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    fn delete_chunk(&self, cx: i32, cz: i32) -> Result<()> {
        let path = self.chunk_path(cx, cz);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    fn contains_chunk(&self, cx: i32, cz: i32) -> Result<bool> {
        Ok(self.chunk_path(cx, cz).is_file())
    }

    fn list_chunks(&self) -> Result<Vec<(i32, i32)>> {
        let mut positions = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list {}", self.root.display()))?
        {
            let entry = entry?;
            if let Some(pos) = entry.file_name().to_str().and_then(parse_chunk_file_name) {
                positions.push(pos);
            }
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("voxedit-dir-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_parse_chunk_file_name() {
        assert_eq!(parse_chunk_file_name("c.0.0.dat"), Some((0, 0)));
        assert_eq!(parse_chunk_file_name("c.-12.7.dat"), Some((-12, 7)));
        assert_eq!(parse_chunk_file_name("c.1.dat"), None);
        assert_eq!(parse_chunk_file_name("r.0.0.mca"), None);
        assert_eq!(parse_chunk_file_name("c.x.1.dat"), None);
    }

    #[test]
    fn test_round_trip_on_disk() {
        let dir = scratch_dir("roundtrip");
        let storage = DirStorage::new(&dir).unwrap();

        assert_eq!(storage.read_chunk(-1, 4).unwrap(), None);
        storage.write_chunk(-1, 4, b"chunk").unwrap();
        storage.write_chunk(2, 2, b"other").unwrap();
        assert_eq!(storage.read_chunk(-1, 4).unwrap().as_deref(), Some(&b"chunk"[..]));

        let mut listed = storage.list_chunks().unwrap();
        listed.sort();
        assert_eq!(listed, vec![(-1, 4), (2, 2)]);

        storage.delete_chunk(-1, 4).unwrap();
        assert!(!storage.contains_chunk(-1, 4).unwrap());
        // deleting twice is fine
        storage.delete_chunk(-1, 4).unwrap();

        fs::remove_dir_all(&dir).unwrap();
    }
}
