use super::{EpochData, EpochItem, GenerateOptions, GenerationSlot};
use crate::algorithm::{cache_size, generate_cache, seed_hash, TEST_CACHE_SIZE};
use crate::dump::{self, DumpKind};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Verification cache of one epoch
pub struct EpochCache {
    epoch: u64,
    special_fork_epoch: u64,
    slot: GenerationSlot,
}

impl EpochCache {
    /// Number of times the generator body ran (0 or 1)
    pub fn generation_runs(&self) -> u32 {
        self.slot.runs()
    }

    /// Epoch from which this cache would hash with SHA3-512
    pub fn special_fork_epoch(&self) -> u64 {
        self.special_fork_epoch
    }

    fn size(&self, options: &GenerateOptions) -> u64 {
        if options.test {
            TEST_CACHE_SIZE
        } else {
            cache_size(self.epoch)
        }
    }

    /// Compute the content in memory without touching the slot or disk.
    pub(crate) fn build_in_memory(&self, options: &GenerateOptions) -> EpochData {
        let seed = seed_hash(self.epoch);
        let mut bytes = vec![0u8; self.size(options) as usize];
        generate_cache(&mut bytes, self.epoch, self.special_fork_epoch, &seed, options.endian);
        EpochData::in_memory(bytes, options.endian)
    }

    fn build(&self, options: &GenerateOptions) -> EpochData {
        let Some(dir) = &options.dir else {
            return self.build_in_memory(options);
        };
        let epoch = self.epoch;
        let endian = options.endian;
        let seed = seed_hash(epoch);
        let path = dump::dump_path(dir, DumpKind::Cache, &seed, endian);

        let size = self.size(options);
        match dump::memory_map(&path, size, options.lock_mmap, endian) {
            Ok(mapped) => {
                debug!(epoch, path = %path.display(), "Loaded old ubqhash cache from disk");
                return EpochData::mapped(mapped, endian);
            }
            Err(err) => debug!(epoch, %err, "Failed to load old ubqhash cache"),
        }

        let fork = self.special_fork_epoch;
        let data = match dump::memory_map_and_generate(&path, size, options.lock_mmap, endian, |buf| {
            generate_cache(buf, epoch, fork, &seed, endian)
        }) {
            Ok(mapped) => {
                info!(epoch, path = %path.display(), "Stored ubqhash cache to disk");
                EpochData::mapped(mapped, endian)
            }
            Err(err) => {
                error!(epoch, %err, "Failed to generate mapped ubqhash cache");
                self.build_in_memory(options)
            }
        };

        dump::prune(dir, DumpKind::Cache, epoch, options.disk_limit, endian);
        data
    }
}

impl EpochItem for EpochCache {
    const KIND: &'static str = "cache";

    fn new(epoch: u64, special_fork_epoch: u64) -> Self {
        Self {
            epoch,
            special_fork_epoch,
            slot: GenerationSlot::default(),
        }
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }

    fn generate(&self, options: &GenerateOptions) -> Option<Arc<EpochData>> {
        self.slot.run(|| self.build(options))
    }

    fn data(&self) -> Option<Arc<EpochData>> {
        self.slot.data()
    }

    fn release(&self) {
        if self.slot.release() {
            debug!(epoch = self.epoch, "Released ubqhash cache");
        }
    }
}
