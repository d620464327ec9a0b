//! # Storage Flows
//!
//! Engines sharing dump directories: persistence, reload across restarts,
//! eviction and pruning.

use qc_ubqhash::UbqhashConfig;
use std::path::Path;

/// Test-mode configuration persisting caches and datasets under `dir`.
pub fn disk_config(dir: &Path) -> UbqhashConfig {
    UbqhashConfig {
        cache_dir: Some(dir.join("caches")),
        caches_in_mem: 1,
        caches_on_disk: 2,
        dataset_dir: Some(dir.join("datasets")),
        datasets_in_mem: 1,
        datasets_on_disk: 1,
        ..UbqhashConfig::test()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::sealing_flows::work_at;
    use qc_ubqhash::algorithm::{seed_hash, EPOCH_LENGTH};
    use qc_ubqhash::dump::{dump_path, DumpKind, Endian};
    use qc_ubqhash::{EpochItem, UbqhashEngine};
    use std::fs;
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;

    fn cache_dump(dir: &Path, epoch: u64) -> std::path::PathBuf {
        dump_path(&dir.join("caches"), DumpKind::Cache, &seed_hash(epoch), Endian::native())
    }

    #[test]
    fn test_restarted_engine_reuses_dumps() {
        let dir = TempDir::new().unwrap();
        let first = UbqhashEngine::new(disk_config(dir.path()));
        first.set_threads(1);
        let work = work_at(3, 16);
        let header = work.seal_header(first.seal(&work, &AtomicBool::new(false)).unwrap());
        first.verify_seal(&header, false).unwrap();
        let stored = first.cache_for(3).data().unwrap().as_bytes().to_vec();
        drop(first);

        assert!(cache_dump(dir.path(), 0).exists());
        let second = UbqhashEngine::new(disk_config(dir.path()));
        let cache = second.cache_for(3);
        let loaded = cache.data().unwrap();
        assert!(loaded.is_mapped());
        assert_eq!(loaded.as_bytes(), stored.as_slice());
        second.verify_seal(&header, false).unwrap();
    }

    #[test]
    fn test_dump_header_is_checked_on_reload() {
        let dir = TempDir::new().unwrap();
        drop(UbqhashEngine::new(disk_config(dir.path())).cache_for(0));

        let path = cache_dump(dir.path(), 0);
        let mut raw = fs::read(&path).unwrap();
        let original = raw.clone();
        raw[0] ^= 0xff;
        fs::write(&path, &raw).unwrap();

        // A broken magic is regenerated and rewritten with a valid header.
        let engine = UbqhashEngine::new(disk_config(dir.path()));
        let data = engine.cache_for(0).data().unwrap();
        assert_eq!(data.as_bytes(), &original[qc_ubqhash::dump::HEADER_BYTES..]);
        assert_eq!(fs::read(&path).unwrap(), original);
    }

    #[test]
    fn test_old_dumps_are_pruned() {
        let dir = TempDir::new().unwrap();
        let engine = UbqhashEngine::new(disk_config(dir.path()));
        // Epoch 4 keeps itself and epoch 3; a background epoch 5 may drop 3 too.
        for epoch in 0..=4 {
            engine.cache_for(epoch * EPOCH_LENGTH);
        }

        assert!(!cache_dump(dir.path(), 0).exists());
        assert!(!cache_dump(dir.path(), 1).exists());
        assert!(!cache_dump(dir.path(), 2).exists());
        assert!(cache_dump(dir.path(), 4).exists());
    }

    #[test]
    fn test_dataset_dump_written_once() {
        let dir = TempDir::new().unwrap();
        let engine = UbqhashEngine::new(disk_config(dir.path()));
        let dataset = engine.dataset_for(1, false);
        assert!(dataset.generated());
        assert!(dataset.data().unwrap().is_mapped());

        let path = dump_path(
            &dir.path().join("datasets"),
            DumpKind::Dataset,
            &seed_hash(0),
            Endian::native(),
        );
        assert!(path.exists());
        assert_eq!(engine.dataset_for(2, false).generation_runs(), 1);
    }
}
