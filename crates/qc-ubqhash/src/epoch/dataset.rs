use super::{EpochData, EpochItem, GenerateOptions, GenerationSlot};
use crate::algorithm::{
    cache_size, cache_words, dataset_size, generate_dataset, seed_hash, TEST_CACHE_SIZE,
    TEST_DATASET_SIZE,
};
use crate::dump::{self, DumpKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Full mining dataset of one epoch
pub struct EpochDataset {
    epoch: u64,
    special_fork_epoch: u64,
    slot: GenerationSlot,
    scheduled: AtomicBool,
}

impl EpochDataset {
    /// Whether generation has finished. Never blocks.
    pub fn generated(&self) -> bool {
        self.slot.is_done()
    }

    /// Number of times the generator body ran (0 or 1)
    pub fn generation_runs(&self) -> u32 {
        self.slot.runs()
    }

    /// Claim the single background generation of this dataset.
    /// Returns false when another caller already claimed it.
    pub(crate) fn schedule_background(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn sizes(&self, options: &GenerateOptions) -> (u64, u64) {
        if options.test {
            (TEST_CACHE_SIZE, TEST_DATASET_SIZE)
        } else {
            (cache_size(self.epoch), dataset_size(self.epoch))
        }
    }

    fn source_cache(&self, options: &GenerateOptions, seed: &[u8; 32]) -> Vec<u32> {
        let (csize, _) = self.sizes(options);
        cache_words(csize, self.epoch, self.special_fork_epoch, seed)
    }

    /// Compute the content in memory without touching the slot or disk.
    pub(crate) fn build_in_memory(&self, options: &GenerateOptions) -> EpochData {
        let seed = seed_hash(self.epoch);
        let cache = self.source_cache(options, &seed);
        let (_, dsize) = self.sizes(options);
        let mut bytes = vec![0u8; dsize as usize];
        generate_dataset(&mut bytes, self.epoch, cache.as_slice(), options.endian);
        EpochData::in_memory(bytes, options.endian)
    }

    fn build(&self, options: &GenerateOptions) -> EpochData {
        let Some(dir) = &options.dir else {
            return self.build_in_memory(options);
        };
        let epoch = self.epoch;
        let endian = options.endian;
        let seed = seed_hash(epoch);
        let path = dump::dump_path(dir, DumpKind::Dataset, &seed, endian);

        let (_, dsize) = self.sizes(options);
        match dump::memory_map(&path, dsize, options.lock_mmap, endian) {
            Ok(mapped) => {
                debug!(epoch, path = %path.display(), "Loaded old ubqhash dataset from disk");
                return EpochData::mapped(mapped, endian);
            }
            Err(err) => debug!(epoch, %err, "Failed to load old ubqhash dataset"),
        }

        let cache = self.source_cache(options, &seed);
        let data = match dump::memory_map_and_generate(&path, dsize, options.lock_mmap, endian, |buf| {
            generate_dataset(buf, epoch, cache.as_slice(), endian)
        }) {
            Ok(mapped) => {
                info!(epoch, path = %path.display(), "Stored ubqhash dataset to disk");
                EpochData::mapped(mapped, endian)
            }
            Err(err) => {
                error!(epoch, %err, "Failed to generate mapped ubqhash dataset");
                let mut bytes = vec![0u8; dsize as usize];
                generate_dataset(&mut bytes, epoch, cache.as_slice(), endian);
                EpochData::in_memory(bytes, endian)
            }
        };

        dump::prune(dir, DumpKind::Dataset, epoch, options.disk_limit, endian);
        data
    }
}

impl EpochItem for EpochDataset {
    const KIND: &'static str = "dataset";

    fn new(epoch: u64, special_fork_epoch: u64) -> Self {
        Self {
            epoch,
            special_fork_epoch,
            slot: GenerationSlot::default(),
            scheduled: AtomicBool::new(false),
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
            debug!(epoch = self.epoch, "Released ubqhash dataset");
        }
    }
}
