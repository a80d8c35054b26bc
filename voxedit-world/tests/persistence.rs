use std::sync::Arc;
use std::sync::atomic::Ordering;

use voxedit_benchmark::EditMetrics;
use voxedit_storage::{ChunkStorage, DirStorage, MemoryStorage};
use voxedit_world::{BlockTypeSet, Dimension, DimensionConfig, LightKind};

const IDS: [u16; 6] = [1, 3, 4, 5, 7, 17];

fn small_cache(storage: Arc<dyn ChunkStorage>, capacity: usize) -> (Dimension, Arc<EditMetrics>) {
    let config = DimensionConfig { cache_capacity: capacity, ..Default::default() };
    let metrics = Arc::new(EditMetrics::new(format!("cache of {}", capacity)));
    let dim = Dimension::new(config, Arc::new(BlockTypeSet::classic()), storage, metrics.clone());
    (dim, metrics)
}

fn write_row(dim: &mut Dimension) {
    for (i, &id) in IDS.iter().enumerate() {
        let x = i as i32 * 16 + 1;
        dim.set_block_at(x, 5, 3, id, i as u8, true).unwrap();
        dim.set_light_at(LightKind::Block, x, 6, 3, 9).unwrap();
    }
}

fn check_row(dim: &mut Dimension) {
    for (i, &id) in IDS.iter().enumerate() {
        let x = i as i32 * 16 + 1;
        assert_eq!(dim.block_at(x, 5, 3).unwrap(), (id, i as u8), "chunk {}", i);
        assert_eq!(dim.light_at(LightKind::Block, x, 6, 3).unwrap(), Some(9), "chunk {}", i);
    }
}

#[test]
fn evicted_chunks_are_written_back() {
    for capacity in [1, 2] {
        let storage = Arc::new(MemoryStorage::new());
        let (mut dim, metrics) = small_cache(storage.clone(), capacity);
        write_row(&mut dim);

        assert!(dim.cache().len() <= capacity);
        assert_eq!(storage.len(), IDS.len() - capacity);
        assert!(metrics.total_cache_evictions.load(Ordering::Relaxed) >= IDS.len() - capacity);

        // reading back reloads what was evicted
        check_row(&mut dim);
        assert!(metrics.total_chunks_loaded.load(Ordering::Relaxed) > 0);

        dim.flush().unwrap();
        assert_eq!(storage.len(), IDS.len());
        assert_eq!(dim.cache().dirty_count(), 0);

        let (mut reopened, _) = small_cache(storage.clone(), capacity);
        check_row(&mut reopened);
    }
}

#[test]
fn directory_storage_round_trip() {
    let dir = std::env::temp_dir().join(format!("voxedit-persistence-{}", std::process::id()));
    let storage: Arc<dyn ChunkStorage> = Arc::new(DirStorage::new(&dir).unwrap());
    let (mut dim, _) = small_cache(storage.clone(), 2);
    write_row(&mut dim);
    dim.flush().unwrap();

    let (mut reopened, _) = small_cache(storage.clone(), 2);
    check_row(&mut reopened);
    let mut positions = reopened.chunk_positions().unwrap();
    positions.sort_unstable();
    assert_eq!(positions, (0..IDS.len() as i32).map(|cx| (cx, 0)).collect::<Vec<_>>());

    std::fs::remove_dir_all(&dir).unwrap();
}
