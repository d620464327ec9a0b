//! Ubqhash consensus engine facade
//!
//! Owns the cache and dataset registries, the mining thread setting, the
//! local hashrate meter and the remote sealer. Verification and mining live
//! in [`seal`], the remote sealer in [`sealer`], RPC registration in [`api`].

mod api;
mod seal;
mod sealer;

pub use api::{RpcApi, UbqhashApi};
pub use seal::{pow_target, SealHeader, SealResult, SealWork};
pub use sealer::{work_package, RemoteSealer};

use crate::algorithm::EPOCH_LENGTH;
use crate::config::{Mode, UbqhashConfig};
use crate::epoch::{EpochCache, EpochData, EpochDataset, EpochItem, EpochLru, GenerateOptions};
use crate::metrics::Meter;
use parking_lot::{Mutex, Once};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Attempts to fetch content of an item that was evicted concurrently
const REFETCH_ATTEMPTS: usize = 3;

/// Proof-of-work engine
pub struct UbqhashEngine {
    config: UbqhashConfig,
    caches: EpochLru<EpochCache>,
    datasets: EpochLru<EpochDataset>,

    /// Configured mining threads: 0 = all cores, negative = local mining off
    threads: Mutex<i32>,
    update_tx: SyncSender<()>,
    update_rx: Mutex<Receiver<()>>,
    hashrate: Meter,
    remote: Option<RemoteSealer>,
    /// Background generation threads started so far
    generation_threads: AtomicU64,
    /// Searches restarted by a thread count update
    pub(crate) restarts: AtomicU64,

    shared: Option<Arc<UbqhashEngine>>,
    fake_fail: Option<u64>,
    fake_delay: Duration,
    close_once: Once,
}

impl UbqhashEngine {
    /// Create an engine with a remote sealer.
    pub fn new(config: UbqhashConfig) -> Self {
        Self::build(config, None, true)
    }

    /// Create a Shared-mode engine delegating verification and mining to `shared`.
    pub fn with_shared(shared: Arc<UbqhashEngine>) -> Self {
        let config = UbqhashConfig {
            pow_mode: Mode::Shared,
            ..UbqhashConfig::default()
        };
        Self::build(config, Some(shared), false)
    }

    /// Engine with tiny caches and datasets for tests
    pub fn new_tester() -> Self {
        Self::new(UbqhashConfig::test())
    }

    /// Engine accepting every seal
    pub fn new_faker() -> Self {
        Self::fake(Mode::Fake)
    }

    /// Engine accepting every seal except the one at block `fail`
    pub fn new_fake_failer(fail: u64) -> Self {
        let mut engine = Self::fake(Mode::Fake);
        engine.fake_fail = Some(fail);
        engine
    }

    /// Engine accepting every seal after sleeping `delay`
    pub fn new_fake_delayer(delay: Duration) -> Self {
        let mut engine = Self::fake(Mode::Fake);
        engine.fake_delay = delay;
        engine
    }

    /// Engine skipping all checks
    pub fn new_full_faker() -> Self {
        Self::fake(Mode::FullFake)
    }

    fn fake(mode: Mode) -> Self {
        let config = UbqhashConfig {
            pow_mode: mode,
            ..UbqhashConfig::default()
        };
        Self::build(config, None, false)
    }

    fn build(mut config: UbqhashConfig, shared: Option<Arc<UbqhashEngine>>, with_sealer: bool) -> Self {
        if config.caches_in_mem == 0 {
            warn!(
                requested = config.caches_in_mem,
                "One ubqhash cache must always be in memory"
            );
            config.caches_in_mem = 1;
        }
        if let Some(dir) = &config.cache_dir {
            if config.caches_on_disk > 0 {
                info!(dir = %dir.display(), count = config.caches_on_disk, "Disk storage enabled for ubqhash caches");
            }
        }
        if let Some(dir) = &config.dataset_dir {
            if config.datasets_on_disk > 0 {
                info!(dir = %dir.display(), count = config.datasets_on_disk, "Disk storage enabled for ubqhash DAGs");
            }
        }
        if config.pow_mode == Mode::Shared && shared.is_none() {
            warn!("Shared ubqhash mode without a shared engine, verifying locally");
        }

        let (update_tx, update_rx) = mpsc::sync_channel(1);
        Self {
            caches: EpochLru::new(config.caches_in_mem),
            datasets: EpochLru::new(config.datasets_in_mem),
            config,
            threads: Mutex::new(0),
            update_tx,
            update_rx: Mutex::new(update_rx),
            hashrate: Meter::new(),
            remote: with_sealer.then(RemoteSealer::start),
            generation_threads: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
            shared,
            fake_fail: None,
            fake_delay: Duration::ZERO,
            close_once: Once::new(),
        }
    }

    /// Effective configuration
    pub fn config(&self) -> &UbqhashConfig {
        &self.config
    }

    /// Proof-of-work mode
    pub fn mode(&self) -> Mode {
        self.config.pow_mode
    }

    /// Remote sealer handle, when this engine runs one
    pub fn remote_sealer(&self) -> Option<&RemoteSealer> {
        self.remote.as_ref()
    }

    /// Verification cache covering `block`, generated before returning.
    ///
    /// The next epoch's cache is prepared on a background thread the first
    /// time an epoch is requested.
    pub fn cache_for(&self, block: u64) -> Arc<EpochCache> {
        let epoch = block / EPOCH_LENGTH;
        let (current, future) = self.caches.get(epoch, self.config.uip1_epoch);
        let options = self.config.cache_options();

        current.generate(&options);
        if let Some(future) = future {
            self.spawn_generation(future, options);
        }
        current
    }

    /// Mining dataset covering `block`.
    ///
    /// With `background` set and the dataset not yet generated, generation of
    /// the current and then the future dataset runs on a background thread and
    /// this returns immediately; check [`EpochDataset::generated`]. Only the
    /// first such call per dataset starts a thread.
    pub fn dataset_for(&self, block: u64, background: bool) -> Arc<EpochDataset> {
        let epoch = block / EPOCH_LENGTH;
        let (current, future) = self.datasets.get(epoch, self.config.uip1_epoch);
        let options = self.config.dataset_options();

        if background && !current.generated() {
            if current.schedule_background() {
                let item = current.clone();
                self.spawn_named(format!("ubqhash-dataset-{epoch}"), move || {
                    item.generate(&options);
                    if let Some(future) = future {
                        future.generate(&options);
                    }
                });
            } else if let Some(future) = future {
                self.spawn_generation(future, options);
            }
        } else {
            current.generate(&options);
            if let Some(future) = future {
                self.spawn_generation(future, options);
            }
        }
        current
    }

    /// Background generation threads started by this engine
    pub fn generation_threads(&self) -> u64 {
        self.generation_threads.load(Ordering::Relaxed)
    }

    fn spawn_generation<T: EpochItem>(&self, item: Arc<T>, options: GenerateOptions) {
        let name = format!("ubqhash-{}-{}", T::KIND, item.epoch());
        self.spawn_named(name, move || {
            item.generate(&options);
        });
    }

    fn spawn_named<F>(&self, name: String, body: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match thread::Builder::new().name(name.clone()).spawn(body) {
            Ok(_) => {
                self.generation_threads.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => error!(thread = %name, %err, "Failed to spawn ubqhash generation"),
        }
    }

    /// Cache content for `block`, refetching if it was evicted mid-request.
    pub(crate) fn cache_data(&self, block: u64) -> Arc<EpochData> {
        for _ in 0..REFETCH_ATTEMPTS {
            if let Some(data) = self.cache_for(block).data() {
                return data;
            }
            debug!(block, "Ubqhash cache released while in use, refetching");
        }
        let cache = EpochCache::new(block / EPOCH_LENGTH, self.config.uip1_epoch);
        Arc::new(cache.build_in_memory(&self.config.cache_options()))
    }

    /// Dataset content for `block`, generated synchronously.
    pub(crate) fn dataset_data(&self, block: u64) -> Arc<EpochData> {
        for _ in 0..REFETCH_ATTEMPTS {
            if let Some(data) = self.dataset_for(block, false).data() {
                return data;
            }
            debug!(block, "Ubqhash dataset released while in use, refetching");
        }
        let dataset = EpochDataset::new(block / EPOCH_LENGTH, self.config.uip1_epoch);
        Arc::new(dataset.build_in_memory(&self.config.dataset_options()))
    }

    /// Configured mining threads
    pub fn threads(&self) -> i32 {
        if let Some(shared) = &self.shared {
            return shared.threads();
        }
        *self.threads.lock()
    }

    /// Update the mining thread count.
    ///
    /// 0 uses every core, a negative value stops local mining while remote
    /// sealing keeps working. A running search restarts with the new count.
    pub fn set_threads(&self, threads: i32) {
        if let Some(shared) = &self.shared {
            shared.set_threads(threads);
            return;
        }
        *self.threads.lock() = threads;
        // Full channel means an update is already pending.
        let _ = self.update_tx.try_send(());
    }

    /// Thread count a search should actually start
    pub(crate) fn mining_threads(&self) -> usize {
        match self.threads() {
            0 => num_cpus::get(),
            n if n < 0 => 0,
            n => n as usize,
        }
    }

    /// Hashes per second: local one-minute rate plus what remote miners report.
    pub fn hashrate(&self) -> f64 {
        let local = self.hashrate.rate1();
        if !matches!(self.config.pow_mode, Mode::Normal | Mode::Test) {
            return local;
        }
        match &self.remote {
            Some(remote) => match remote.submitted_hashrate() {
                Ok(submitted) => local + submitted as f64,
                Err(_) => local,
            },
            None => local,
        }
    }

    /// Stop the remote sealer and wait for it. Later calls do nothing.
    pub fn close(&self) {
        self.close_once.call_once(|| {
            if let Some(remote) = &self.remote {
                remote.close();
            }
        });
    }
}

impl Drop for UbqhashEngine {
    fn drop(&mut self) {
        self.close();
    }
}
