//! Configuration types for the ubqhash engine

use crate::epoch::GenerateOptions;
use crate::error::UbqhashError;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Default epoch at which cache generation switches to SHA3-512 (UIP-1)
pub const DEFAULT_UIP1_EPOCH: u64 = 22;

/// Proof-of-work mode the engine runs in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Full verification with real-sized caches and datasets
    #[default]
    Normal,
    /// Delegate verification and mining to a shared engine
    Shared,
    /// Real verification with tiny caches and datasets
    Test,
    /// Accept every seal except a configured failing block
    Fake,
    /// Accept everything without any checks
    #[serde(rename = "fullfake")]
    FullFake,
}

impl Mode {
    /// Fake and FullFake skip all hashing.
    pub fn is_fake(self) -> bool {
        matches!(self, Self::Fake | Self::FullFake)
    }
}

impl FromStr for Mode {
    type Err = UbqhashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "shared" => Ok(Self::Shared),
            "test" => Ok(Self::Test),
            "fake" => Ok(Self::Fake),
            "fullfake" | "full-fake" => Ok(Self::FullFake),
            other => Err(UbqhashError::InvalidConfig(format!(
                "unknown pow mode: {other}"
            ))),
        }
    }
}

/// Runtime configuration for the ubqhash engine
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct UbqhashConfig {
    /// Directory for verification cache dumps (None = memory only)
    pub cache_dir: Option<PathBuf>,

    /// Number of verification caches kept in memory
    pub caches_in_mem: usize,

    /// Number of verification cache dumps kept on disk
    pub caches_on_disk: u64,

    /// Lock cache mappings into RAM
    pub caches_lock_mmap: bool,

    /// Directory for mining dataset dumps (None = memory only)
    pub dataset_dir: Option<PathBuf>,

    /// Number of mining datasets kept in memory
    pub datasets_in_mem: usize,

    /// Number of mining dataset dumps kept on disk
    pub datasets_on_disk: u64,

    /// Lock dataset mappings into RAM
    pub datasets_lock_mmap: bool,

    /// Proof-of-work mode
    pub pow_mode: Mode,

    /// Epoch from which caches hash with SHA3-512 instead of Keccak-512
    pub uip1_epoch: u64,
}

impl Default for UbqhashConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            caches_in_mem: 2,
            caches_on_disk: 3,
            caches_lock_mmap: false,
            dataset_dir: None,
            datasets_in_mem: 1,
            datasets_on_disk: 2,
            datasets_lock_mmap: false,
            pow_mode: Mode::Normal,
            uip1_epoch: DEFAULT_UIP1_EPOCH,
        }
    }
}

impl UbqhashConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_UBQHASH_CACHE_DIR`: cache dump directory (default: memory only)
    /// - `QC_UBQHASH_CACHES_IN_MEM`: caches kept in memory (default: 2)
    /// - `QC_UBQHASH_CACHES_ON_DISK`: cache dumps kept on disk (default: 3)
    /// - `QC_UBQHASH_CACHES_LOCK_MMAP`: lock cache mappings (default: false)
    /// - `QC_UBQHASH_DATASET_DIR`: dataset dump directory (default: memory only)
    /// - `QC_UBQHASH_DATASETS_IN_MEM`: datasets kept in memory (default: 1)
    /// - `QC_UBQHASH_DATASETS_ON_DISK`: dataset dumps kept on disk (default: 2)
    /// - `QC_UBQHASH_DATASETS_LOCK_MMAP`: lock dataset mappings (default: false)
    /// - `QC_UBQHASH_POW_MODE`: normal, shared, test, fake, fullfake (default: normal)
    /// - `QC_UBQHASH_UIP1_EPOCH`: SHA3-512 switch epoch (default: 22)
    ///
    /// Unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_dir: env::var("QC_UBQHASH_CACHE_DIR").ok().map(PathBuf::from),
            caches_in_mem: parsed("QC_UBQHASH_CACHES_IN_MEM").unwrap_or(defaults.caches_in_mem),
            caches_on_disk: parsed("QC_UBQHASH_CACHES_ON_DISK")
                .unwrap_or(defaults.caches_on_disk),
            caches_lock_mmap: flag("QC_UBQHASH_CACHES_LOCK_MMAP")
                .unwrap_or(defaults.caches_lock_mmap),
            dataset_dir: env::var("QC_UBQHASH_DATASET_DIR").ok().map(PathBuf::from),
            datasets_in_mem: parsed("QC_UBQHASH_DATASETS_IN_MEM")
                .unwrap_or(defaults.datasets_in_mem),
            datasets_on_disk: parsed("QC_UBQHASH_DATASETS_ON_DISK")
                .unwrap_or(defaults.datasets_on_disk),
            datasets_lock_mmap: flag("QC_UBQHASH_DATASETS_LOCK_MMAP")
                .unwrap_or(defaults.datasets_lock_mmap),
            pow_mode: parsed("QC_UBQHASH_POW_MODE").unwrap_or(defaults.pow_mode),
            uip1_epoch: parsed("QC_UBQHASH_UIP1_EPOCH").unwrap_or(defaults.uip1_epoch),
        }
    }

    /// Configuration for tests: tiny caches and datasets, memory only.
    pub fn test() -> Self {
        Self {
            pow_mode: Mode::Test,
            ..Self::default()
        }
    }

    pub(crate) fn cache_options(&self) -> GenerateOptions {
        GenerateOptions {
            dir: self.cache_dir.clone(),
            disk_limit: self.caches_on_disk,
            lock_mmap: self.caches_lock_mmap,
            test: self.pow_mode == Mode::Test,
            ..GenerateOptions::default()
        }
    }

    pub(crate) fn dataset_options(&self) -> GenerateOptions {
        GenerateOptions {
            dir: self.dataset_dir.clone(),
            disk_limit: self.datasets_on_disk,
            lock_mmap: self.datasets_lock_mmap,
            test: self.pow_mode == Mode::Test,
            ..GenerateOptions::default()
        }
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}
