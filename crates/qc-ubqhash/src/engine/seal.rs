//! Seal verification and local nonce search

use super::UbqhashEngine;
use crate::algorithm::{dataset_size, hashimoto_full, hashimoto_light, EPOCH_LENGTH, TEST_DATASET_SIZE};
use crate::config::Mode;
use crate::epoch::{EpochData, EpochItem};
use crate::error::{Result, UbqhashError};
use primitive_types::{H256, U256, U512};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// How often a running search looks at the stop flag and update channel
const SEAL_POLL: Duration = Duration::from_millis(50);

/// Attempts between hashrate meter updates
const HASHRATE_BATCH: u64 = 1 << 15;

/// Block to be sealed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealWork {
    pub number: u64,
    /// Header hash without nonce and mix digest
    pub seal_hash: H256,
    pub difficulty: U256,
}

impl SealWork {
    /// Header carrying `result` as its seal.
    pub fn seal_header(&self, result: SealResult) -> SealHeader {
        SealHeader {
            number: self.number,
            seal_hash: self.seal_hash,
            difficulty: self.difficulty,
            nonce: result.nonce,
            mix_digest: result.mix_digest,
        }
    }
}

/// Header fields needed to check a seal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealHeader {
    pub number: u64,
    pub seal_hash: H256,
    pub difficulty: U256,
    pub nonce: u64,
    pub mix_digest: H256,
}

/// Nonce found by a search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SealResult {
    pub nonce: u64,
    pub mix_digest: H256,
}

/// Largest result accepted at `difficulty`: `2^256 / difficulty`.
pub fn pow_target(difficulty: U256) -> U256 {
    if difficulty <= U256::one() {
        return U256::MAX;
    }
    let target = (U512::one() << 256usize) / U512::from(difficulty);
    U256::try_from(target).unwrap_or(U256::MAX)
}

enum SearchOutcome {
    Found(SealResult),
    Stopped,
    Restart,
    Exhausted,
}

impl UbqhashEngine {
    /// Check that `header` carries a valid proof-of-work.
    ///
    /// With `full_dag` set the mining dataset is used when already generated
    /// (its generation is kicked off in the background otherwise); the
    /// verification cache is used in every other case.
    pub fn verify_seal(&self, header: &SealHeader, full_dag: bool) -> Result<()> {
        if self.config.pow_mode.is_fake() {
            if !self.fake_delay.is_zero() {
                thread::sleep(self.fake_delay);
            }
            if self.fake_fail == Some(header.number) {
                return Err(UbqhashError::InvalidPow);
            }
            return Ok(());
        }
        if let Some(shared) = &self.shared {
            return shared.verify_seal(header, full_dag);
        }
        if header.difficulty.is_zero() {
            return Err(UbqhashError::InvalidDifficulty);
        }

        let hash = header.seal_hash.to_fixed_bytes();
        let mut outcome = None;
        if full_dag {
            let dataset = self.dataset_for(header.number, true);
            if dataset.generated() {
                if let Some(data) = dataset.data() {
                    outcome = Some(hashimoto_full(&*data, &hash, header.nonce));
                }
            }
        }
        let (mix_digest, result) = match outcome {
            Some(outcome) => outcome,
            None => {
                let size = if self.config.pow_mode == Mode::Test {
                    TEST_DATASET_SIZE
                } else {
                    dataset_size(header.number / EPOCH_LENGTH)
                };
                let cache = self.cache_data(header.number);
                hashimoto_light(size, &*cache, &hash, header.nonce)
            }
        };

        if H256(mix_digest) != header.mix_digest {
            return Err(UbqhashError::InvalidMixDigest);
        }
        if U256::from_big_endian(&result) > pow_target(header.difficulty) {
            return Err(UbqhashError::InvalidPow);
        }
        Ok(())
    }

    /// Search a nonce sealing `work` until one is found or `stop` is set.
    ///
    /// The work is published to the remote sealer first. A thread count
    /// change restarts the search with the new count.
    #[tracing::instrument(skip(self, work, stop), fields(number = work.number))]
    pub fn seal(&self, work: &SealWork, stop: &AtomicBool) -> Option<SealResult> {
        if self.config.pow_mode.is_fake() {
            return Some(SealResult {
                nonce: 0,
                mix_digest: H256::zero(),
            });
        }
        if let Some(shared) = &self.shared {
            return shared.seal(work, stop);
        }
        if let Some(remote) = &self.remote {
            remote.publish_work(work);
        }
        // Updates sent before this search do not concern it.
        let stale = self.drain_updates();
        if stale > 0 {
            trace!(stale, "Dropped thread updates pending before the search");
        }

        let target = pow_target(work.difficulty);
        loop {
            let threads = self.mining_threads();
            if threads == 0 {
                if self.idle_until_update(stop) {
                    continue;
                }
                return None;
            }

            let dataset = self.dataset_data(work.number);
            match self.search(&dataset, work, target, threads, stop) {
                SearchOutcome::Found(result) => return Some(result),
                SearchOutcome::Stopped | SearchOutcome::Exhausted => return None,
                SearchOutcome::Restart => {
                    self.restarts.fetch_add(1, Ordering::Relaxed);
                    info!(threads = self.threads(), "Mining threads changed, restarting search");
                }
            }
        }
    }

    fn drain_updates(&self) -> usize {
        let updates = self.update_rx.lock();
        std::iter::from_fn(|| updates.try_recv().ok()).count()
    }

    /// Wait for a thread count update. Returns false once `stop` is set.
    fn idle_until_update(&self, stop: &AtomicBool) -> bool {
        let updates = self.update_rx.lock();
        loop {
            if stop.load(Ordering::SeqCst) {
                return false;
            }
            match updates.recv_timeout(SEAL_POLL) {
                Ok(()) => return true,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    fn search(
        &self,
        dataset: &EpochData,
        work: &SealWork,
        target: U256,
        threads: usize,
        stop: &AtomicBool,
    ) -> SearchOutcome {
        let abort = AtomicBool::new(false);
        let abort = &abort;
        let started = Instant::now();

        thread::scope(|scope| {
            let (found_tx, found_rx) = mpsc::channel();
            for worker in 0..threads {
                let found_tx = found_tx.clone();
                let seed = rand::random::<u64>();
                scope.spawn(move || self.mine(worker, dataset, work, target, seed, abort, found_tx));
            }
            drop(found_tx);

            let outcome = self.wait_for_outcome(&found_rx, stop);
            abort.store(true, Ordering::SeqCst);
            if let SearchOutcome::Found(result) = &outcome {
                debug!(nonce = result.nonce, elapsed = ?started.elapsed(), "Sealed block");
            }
            outcome
        })
    }

    fn wait_for_outcome(&self, found: &Receiver<SealResult>, stop: &AtomicBool) -> SearchOutcome {
        loop {
            match found.recv_timeout(SEAL_POLL) {
                Ok(result) => return SearchOutcome::Found(result),
                Err(RecvTimeoutError::Disconnected) => return SearchOutcome::Exhausted,
                Err(RecvTimeoutError::Timeout) => {}
            }
            if stop.load(Ordering::SeqCst) {
                return SearchOutcome::Stopped;
            }
            if self.update_rx.lock().try_recv().is_ok() {
                return SearchOutcome::Restart;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn mine(
        &self,
        worker: usize,
        dataset: &EpochData,
        work: &SealWork,
        target: U256,
        seed: u64,
        abort: &AtomicBool,
        found: Sender<SealResult>,
    ) {
        let hash = work.seal_hash.to_fixed_bytes();
        let mut nonce = seed;
        let mut attempts = 0u64;
        trace!(worker, seed, "Started ubqhash search for new nonces");

        loop {
            if abort.load(Ordering::Relaxed) {
                trace!(worker, attempts = nonce.wrapping_sub(seed), "Ubqhash nonce search aborted");
                break;
            }
            attempts += 1;
            if attempts == HASHRATE_BATCH {
                self.hashrate.mark(attempts);
                attempts = 0;
            }

            let (mix_digest, result) = hashimoto_full(dataset, &hash, nonce);
            if U256::from_big_endian(&result) <= target {
                trace!(worker, nonce, "Ubqhash nonce found and reported");
                let _ = found.send(SealResult {
                    nonce,
                    mix_digest: H256(mix_digest),
                });
                break;
            }
            nonce = nonce.wrapping_add(1);
            if nonce == seed {
                break;
            }
        }
        self.hashrate.mark(attempts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn work(difficulty: u64) -> SealWork {
        SealWork {
            number: 1,
            seal_hash: H256::repeat_byte(0x5a),
            difficulty: U256::from(difficulty),
        }
    }

    #[test]
    fn test_pow_target() {
        assert_eq!(pow_target(U256::zero()), U256::MAX);
        assert_eq!(pow_target(U256::one()), U256::MAX);
        assert_eq!(pow_target(U256::from(2)), U256::one() << 255);
        assert_eq!(pow_target(U256::from(16)), U256::one() << 252);
        assert_eq!(pow_target(U256::MAX), U256::one());
    }

    #[test]
    fn test_seal_then_verify() {
        let engine = UbqhashEngine::new_tester();
        engine.set_threads(2);
        let work = work(50);
        let stop = AtomicBool::new(false);

        let result = engine.seal(&work, &stop).unwrap();
        let header = work.seal_header(result);
        engine.verify_seal(&header, false).unwrap();
        engine.verify_seal(&header, true).unwrap();
        assert!(engine.hashrate.count() > 0);
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let engine = UbqhashEngine::new_tester();
        engine.set_threads(1);
        let work = work(8);
        let result = engine.seal(&work, &AtomicBool::new(false)).unwrap();
        let header = work.seal_header(result);

        let bad_mix = SealHeader {
            mix_digest: H256::repeat_byte(1),
            ..header.clone()
        };
        assert!(matches!(
            engine.verify_seal(&bad_mix, false),
            Err(UbqhashError::InvalidMixDigest)
        ));

        let zero = SealHeader {
            difficulty: U256::zero(),
            ..header.clone()
        };
        assert!(matches!(
            engine.verify_seal(&zero, false),
            Err(UbqhashError::InvalidDifficulty)
        ));

        // Mix stays valid; only the maximal difficulty target is missed.
        let hard = SealHeader {
            difficulty: U256::MAX,
            ..header
        };
        assert!(matches!(
            engine.verify_seal(&hard, false),
            Err(UbqhashError::InvalidPow)
        ));
    }

    #[test]
    fn test_seal_stops_on_request() {
        let engine = UbqhashEngine::new_tester();
        engine.set_threads(1);
        let stop = AtomicBool::new(true);
        assert!(engine.seal(&work(u64::MAX), &stop).is_none());
    }

    #[test]
    fn test_update_sent_before_seal_does_not_restart() {
        let engine = UbqhashEngine::new_tester();
        // Leaves one update pending in the channel.
        engine.set_threads(1);

        let stop = AtomicBool::new(false);
        let result = thread::scope(|scope| {
            scope.spawn(|| {
                thread::sleep(Duration::from_millis(300));
                stop.store(true, Ordering::SeqCst);
            });
            engine.seal(&work(u64::MAX), &stop)
        });
        assert!(result.is_none());
        assert_eq!(engine.restarts.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_idle_search_resumes_after_thread_update() {
        let engine = Arc::new(UbqhashEngine::new_tester());
        engine.set_threads(-1);

        let miner = {
            let engine = engine.clone();
            thread::spawn(move || engine.seal(&work(4), &AtomicBool::new(false)))
        };
        thread::sleep(Duration::from_millis(200));
        engine.set_threads(1);

        let result = miner.join().unwrap().unwrap();
        engine.verify_seal(&work(4).seal_header(result), false).unwrap();
    }

    #[test]
    fn test_fake_modes() {
        let faker = UbqhashEngine::new_faker();
        let result = faker.seal(&work(u64::MAX), &AtomicBool::new(false)).unwrap();
        assert_eq!(result.nonce, 0);
        let header = work(u64::MAX).seal_header(result);
        faker.verify_seal(&header, true).unwrap();

        let failer = UbqhashEngine::new_fake_failer(1);
        assert!(matches!(
            failer.verify_seal(&header, false),
            Err(UbqhashError::InvalidPow)
        ));
        let other = SealHeader { number: 2, ..header.clone() };
        failer.verify_seal(&other, false).unwrap();

        let delayer = UbqhashEngine::new_fake_delayer(Duration::from_millis(20));
        let started = Instant::now();
        delayer.verify_seal(&header, false).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));

        UbqhashEngine::new_full_faker().verify_seal(&header, false).unwrap();
    }

    #[test]
    fn test_shared_mode_delegates_verification() {
        let shared = Arc::new(UbqhashEngine::new_tester());
        shared.set_threads(1);
        let work = work(8);
        let result = shared.seal(&work, &AtomicBool::new(false)).unwrap();

        let engine = UbqhashEngine::with_shared(shared.clone());
        engine.verify_seal(&work.seal_header(result), false).unwrap();
        // Verification ran on the shared engine's caches.
        assert_eq!(engine.caches.len(), 0);
        assert!(!shared.caches.is_empty());
    }

    #[test]
    fn test_seal_publishes_work_to_remote() {
        let engine = UbqhashEngine::new_tester();
        engine.set_threads(1);
        let work = work(2);
        engine.seal(&work, &AtomicBool::new(false)).unwrap();

        let package = engine.remote_sealer().unwrap().fetch_work().unwrap();
        assert_eq!(package[0], format!("0x{}", hex::encode(work.seal_hash.as_bytes())));
        assert_eq!(package[3], "0x1");
    }
}
