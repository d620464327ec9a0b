//! # Sealing Flows
//!
//! Mining and verification through the engine facade in Test mode, with
//! the remote sealer and RPC service in the loop.

use primitive_types::{H256, U256};
use qc_ubqhash::SealWork;

/// Work for `number` with a seal hash derived from it
pub fn work_at(number: u64, difficulty: u64) -> SealWork {
    let mut seal_hash = [0u8; 32];
    seal_hash[24..].copy_from_slice(&number.to_be_bytes());
    SealWork {
        number,
        seal_hash: H256(seal_hash),
        difficulty: U256::from(difficulty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_ubqhash::algorithm::EPOCH_LENGTH;
    use qc_ubqhash::{UbqhashEngine, UbqhashError};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_mine_and_verify_across_epochs() {
        let engine = UbqhashEngine::new_tester();
        engine.set_threads(2);
        let stop = AtomicBool::new(false);

        for number in [1, EPOCH_LENGTH + 1, 2 * EPOCH_LENGTH + 1] {
            let work = work_at(number, 32);
            let header = work.seal_header(engine.seal(&work, &stop).unwrap());
            engine.verify_seal(&header, false).unwrap();
            engine.verify_seal(&header, true).unwrap();
        }
    }

    #[test]
    fn test_independent_verifier_accepts_seal() {
        let miner = UbqhashEngine::new_tester();
        miner.set_threads(1);
        let verifier = UbqhashEngine::new_tester();

        let work = work_at(77, 64);
        let header = work.seal_header(miner.seal(&work, &AtomicBool::new(false)).unwrap());
        verifier.verify_seal(&header, false).unwrap();

        // Seal does not carry over to another block.
        let mut moved = header.clone();
        moved.seal_hash = work_at(78, 64).seal_hash;
        let err = verifier.verify_seal(&moved, false).unwrap_err();
        assert!(err.is_seal_rejection());
    }

    #[test]
    fn test_concurrent_verification_shares_one_cache() {
        let engine = Arc::new(UbqhashEngine::new_tester());
        engine.set_threads(1);
        let work = work_at(5, 16);
        let header = work.seal_header(engine.seal(&work, &AtomicBool::new(false)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let header = header.clone();
                thread::spawn(move || engine.verify_seal(&header, false))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(engine.cache_for(5).generation_runs(), 1);
    }

    #[test]
    fn test_remote_miner_flow() {
        let engine = Arc::new(UbqhashEngine::new_tester());
        engine.set_threads(1);
        let apis = engine.apis();
        let api = &apis[1].service;
        assert_eq!(apis[1].namespace, "ubqhash");

        let work = work_at(9, 4);
        engine.seal(&work, &AtomicBool::new(false)).unwrap();
        let package = api.get_work().unwrap();
        assert_eq!(package[0], format!("0x{}", "00".repeat(24) + "0000000000000009"));
        assert_eq!(package[1], format!("0x{}", "00".repeat(32)));

        assert!(api.submit_hashrate(500, H256::repeat_byte(0xaa)));
        assert!(api.get_hashrate() >= 500);

        engine.close();
        assert!(matches!(api.get_work(), Err(UbqhashError::SealerStopped)));
        assert!(!api.submit_hashrate(1, H256::repeat_byte(0xaa)));
    }

    #[test]
    fn test_shared_engine_serves_verification() {
        let shared = Arc::new(UbqhashEngine::new_tester());
        shared.set_threads(1);
        let local = UbqhashEngine::with_shared(shared.clone());

        let work = work_at(12, 8);
        let header = work.seal_header(local.seal(&work, &AtomicBool::new(false)).unwrap());
        local.verify_seal(&header, false).unwrap();
        shared.verify_seal(&header, false).unwrap();
        assert_eq!(local.threads(), 1);
    }
}
