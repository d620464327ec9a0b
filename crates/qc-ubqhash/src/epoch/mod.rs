//! Epoch-keyed verification caches and mining datasets
//!
//! Items are created empty by [`EpochLru`] and materialize their content on
//! the first [`EpochItem::generate`] call, from a valid on-disk dump when one
//! exists and otherwise by computing it (and persisting it when a directory
//! is configured). Content is handed out as [`EpochData`] handles so a
//! holder keeps its mapping alive even after the item is evicted and
//! released.

mod cache;
mod dataset;
mod lru;

pub use cache::EpochCache;
pub use dataset::EpochDataset;
pub use lru::EpochLru;

use crate::algorithm::{WordSource, EPOCH_LENGTH};
use crate::config::DEFAULT_UIP1_EPOCH;
use crate::dump::{Endian, MappedDump};
use parking_lot::{Once, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Where and how an item materializes its content
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Dump directory; `None` keeps content in memory only
    pub dir: Option<PathBuf>,
    /// Number of newest epochs whose dumps survive pruning
    pub disk_limit: u64,
    /// Lock mapped dumps into RAM
    pub lock_mmap: bool,
    /// Use the tiny test sizes
    pub test: bool,
    /// Word order of generated content and dumps
    pub endian: Endian,
}

/// An epoch-scoped item managed by [`EpochLru`]
pub trait EpochItem: Send + Sync + 'static {
    /// Name used in logs
    const KIND: &'static str;

    /// Create an empty item
    fn new(epoch: u64, special_fork_epoch: u64) -> Self;

    /// Epoch this item belongs to
    fn epoch(&self) -> u64;

    /// Materialize the content once; later and concurrent calls wait for the
    /// first one. Returns the content, or `None` if the item was released.
    fn generate(&self, options: &GenerateOptions) -> Option<Arc<EpochData>>;

    /// Content if generated and not released
    fn data(&self) -> Option<Arc<EpochData>>;

    /// Drop the content held by the item. Idempotent.
    fn release(&self);
}

/// Generate the verification cache covering `block` into `dir`.
///
/// Existing dumps in `dir` are never pruned.
pub fn make_cache(block: u64, dir: &Path) -> Option<Arc<EpochData>> {
    make::<EpochCache>(block, &unpruned_options(dir))
}

/// Generate the mining dataset covering `block` into `dir`.
///
/// Existing dumps in `dir` are never pruned.
pub fn make_dataset(block: u64, dir: &Path) -> Option<Arc<EpochData>> {
    make::<EpochDataset>(block, &unpruned_options(dir))
}

fn unpruned_options(dir: &Path) -> GenerateOptions {
    GenerateOptions {
        dir: Some(dir.to_path_buf()),
        disk_limit: u64::MAX,
        ..GenerateOptions::default()
    }
}

fn make<T: EpochItem>(block: u64, options: &GenerateOptions) -> Option<Arc<EpochData>> {
    T::new(block / EPOCH_LENGTH, DEFAULT_UIP1_EPOCH).generate(options)
}

enum Backing {
    Memory(Vec<u8>),
    Mapped(MappedDump),
}

/// Generated content: an owned buffer or a read-only dump mapping
pub struct EpochData {
    backing: Backing,
    endian: Endian,
}

impl std::fmt::Debug for EpochData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochData")
            .field("bytes", &self.as_bytes().len())
            .field("mapped", &self.is_mapped())
            .field("endian", &self.endian)
            .finish()
    }
}

impl EpochData {
    pub(crate) fn in_memory(bytes: Vec<u8>, endian: Endian) -> Self {
        Self {
            backing: Backing::Memory(bytes),
            endian,
        }
    }

    pub(crate) fn mapped(dump: MappedDump, endian: Endian) -> Self {
        Self {
            backing: Backing::Mapped(dump),
            endian,
        }
    }

    /// Raw content in [`Self::endian`] word order
    pub fn as_bytes(&self) -> &[u8] {
        match &self.backing {
            Backing::Memory(bytes) => bytes,
            Backing::Mapped(dump) => dump.payload(),
        }
    }

    /// Word order of the content
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Whether the content is backed by a dump file
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// Content length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the content is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content decoded to native words
    pub fn to_words(&self) -> Vec<u32> {
        self.as_bytes()
            .chunks_exact(4)
            .map(|w| self.endian.read_u32(w))
            .collect()
    }
}

impl WordSource for EpochData {
    fn word(&self, index: usize) -> u32 {
        self.endian.read_u32(&self.as_bytes()[index * 4..])
    }

    fn word_count(&self) -> usize {
        self.len() / 4
    }
}

/// Run-once content slot shared by caches and datasets
#[derive(Default)]
pub(crate) struct GenerationSlot {
    once: Once,
    content: RwLock<SlotContent>,
    runs: AtomicU32,
}

#[derive(Default)]
struct SlotContent {
    data: Option<Arc<EpochData>>,
    released: bool,
}

impl GenerationSlot {
    /// Run `build` at most once for the lifetime of the slot.
    pub(crate) fn run<F>(&self, build: F) -> Option<Arc<EpochData>>
    where
        F: FnOnce() -> EpochData,
    {
        self.once.call_once(|| {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let data = Arc::new(build());
            let mut content = self.content.write();
            // Released while generating: the item must not hold anything.
            if !content.released {
                content.data = Some(data);
            }
        });
        self.data()
    }

    pub(crate) fn data(&self) -> Option<Arc<EpochData>> {
        self.content.read().data.clone()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.once.state().done()
    }

    pub(crate) fn release(&self) -> bool {
        let mut content = self.content.write();
        content.released = true;
        content.data.take().is_some()
    }

    pub(crate) fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }
}
