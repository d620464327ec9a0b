//! # Difficulty and Reward Flows
//!
//! Drives the chain-config dispatch over simulated chains with constant
//! block spacing, and walks the mainnet reward schedule.

use primitive_types::U256;
use qc_ubqhash::{ChainHeaderReader, ParentHeader};

/// Chain whose median times advance by a fixed spacing per block
pub struct SteadyChain {
    pub spacing: u64,
}

impl ChainHeaderReader for SteadyChain {
    fn calc_past_median_time(&self, number: u64, _parent: &ParentHeader) -> u64 {
        number * self.spacing
    }
}

/// Extend a chain for `blocks` blocks from `start`, returning every difficulty.
pub fn simulate(
    chain: &SteadyChain,
    config: &qc_ubqhash::ChainConfig,
    start: u64,
    difficulty: U256,
    blocks: u64,
) -> Vec<U256> {
    let mut parent = ParentHeader {
        number: start,
        time: start * chain.spacing,
        difficulty,
        has_uncles: false,
    };
    let mut out = Vec::with_capacity(blocks as usize);
    for _ in 0..blocks {
        let time = parent.time + chain.spacing;
        let next = qc_ubqhash::calc_difficulty(chain, config, time, &parent);
        out.push(next);
        parent = ParentHeader {
            number: parent.number + 1,
            time,
            difficulty: next,
            has_uncles: false,
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_ubqhash::difficulty::{reference, MINIMUM_DIFFICULTY, TARGET_BLOCK_TIME};
    use qc_ubqhash::{
        calc_base_block_reward, calc_uncle_block_reward, ChainConfig, DifficultyAlgorithm,
    };
    use rand::Rng;

    const START: u64 = 10_000_000;

    #[test]
    fn test_on_target_chain_keeps_difficulty() {
        let config = ChainConfig::mainnet();
        let chain = SteadyChain {
            spacing: TARGET_BLOCK_TIME,
        };
        for start in [100, 5_000, 20_000] {
            let difficulties = simulate(&chain, &config, start, U256::from(START), 50);
            assert!(difficulties.iter().all(|d| *d == U256::from(START)));
        }
    }

    #[test]
    fn test_fast_chain_raises_difficulty() {
        let config = ChainConfig::mainnet();
        let chain = SteadyChain {
            spacing: TARGET_BLOCK_TIME / 2,
        };
        let difficulties = simulate(&chain, &config, 9_000, U256::from(START), 100);
        assert!(difficulties.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_slow_chain_lowers_difficulty_to_floor() {
        let config = ChainConfig::mainnet();
        let chain = SteadyChain {
            spacing: TARGET_BLOCK_TIME * 2,
        };
        let difficulties = simulate(&chain, &config, 9_000, U256::from(START), 2_000);
        assert!(difficulties.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(*difficulties.last().unwrap(), U256::from(MINIMUM_DIFFICULTY));
    }

    #[test]
    fn test_dispatch_follows_fork_blocks() {
        let config = ChainConfig::mainnet();
        assert!(matches!(
            config.difficulty_algorithm(4_087),
            DifficultyAlgorithm::DigishieldV3(p) if p.averaging_window == 21
        ));
        assert!(matches!(
            config.difficulty_algorithm(4_088),
            DifficultyAlgorithm::DigishieldV3(p) if p.averaging_window == 88
        ));
        assert!(matches!(
            config.difficulty_algorithm(8_000),
            DifficultyAlgorithm::Flux(_)
        ));
    }

    #[test]
    fn test_ethereum_calculators_agree_with_reference() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let parent = ParentHeader {
                number: rng.gen_range(0..20_000_000),
                time: rng.gen_range(0..1_000_000_000),
                difficulty: U256::from(rng.gen::<u128>()),
                has_uncles: rng.gen(),
            };
            let time = parent.time + rng.gen_range(0..1_000);

            for (algorithm, expected) in [
                (
                    DifficultyAlgorithm::Frontier,
                    reference::frontier(time, &parent),
                ),
                (
                    DifficultyAlgorithm::Homestead,
                    reference::homestead(time, &parent),
                ),
                (
                    DifficultyAlgorithm::BombDelay(Some(3_000_000)),
                    reference::bomb_delay(Some(3_000_000), time, &parent),
                ),
            ] {
                let Some(expected) = reference::from_biguint(&expected) else {
                    continue;
                };
                let chain = SteadyChain { spacing: 0 };
                assert_eq!(algorithm.calculate(&chain, time, &parent), expected);
            }
        }
    }

    #[test]
    fn test_block_and_uncle_payouts() {
        let config = ChainConfig::mainnet();
        let ubq = |tenths: u64| U256::exp10(17) * U256::from(tenths);

        let (step, reward) = calc_base_block_reward(&config, 358_364, false);
        assert_eq!((step, reward), (ubq(70), ubq(70)));
        assert_eq!(calc_uncle_block_reward(358_364, 358_363, reward), ubq(35));
        assert_eq!(calc_uncle_block_reward(358_364, 358_362, reward), U256::zero());

        let (step, reward) = calc_base_block_reward(&config, 2_000_000, true);
        assert_eq!(step, ubq(30));
        assert_eq!(reward, ubq(15));

        let (step, reward) = calc_base_block_reward(&config, 3_000_000, true);
        assert_eq!((step, reward), (ubq(10), ubq(10)));
    }
}
