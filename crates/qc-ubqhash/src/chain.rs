//! Chain-side inputs: parent headers, the median-time reader and fork config

use crate::difficulty::{DifficultyAlgorithm, RetargetParams};
use primitive_types::U256;
use serde::Deserialize;

/// Parent header fields the difficulty calculators read
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentHeader {
    /// Block number
    pub number: u64,
    /// Unix timestamp in seconds
    pub time: u64,
    /// Block difficulty
    pub difficulty: U256,
    /// False when the uncle hash is the empty-uncles hash
    pub has_uncles: bool,
}

/// Read access to chain history needed by the retarget algorithms.
pub trait ChainHeaderReader: Send + Sync {
    /// Median timestamp of the blocks preceding `number`, walked back from `parent`.
    fn calc_past_median_time(&self, number: u64, parent: &ParentHeader) -> u64;
}

/// One step of the block reward schedule
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MonetaryPolicyStep {
    /// First block paying this reward
    pub activation_block: u64,
    /// Reward in wei
    pub reward: U256,
}

impl MonetaryPolicyStep {
    fn ubq_tenths(activation_block: u64, tenths: u64) -> Self {
        Self {
            activation_block,
            reward: U256::exp10(17) * U256::from(tenths),
        }
    }
}

/// Fork blocks and reward schedule
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Block from which the DigishieldV3-mod retarget applies
    pub digishield_mod_block: Option<u64>,
    /// Block from which the Flux retarget applies
    pub flux_block: Option<u64>,
    /// Reward steps sorted by activation block
    pub monetary_policy: Vec<MonetaryPolicyStep>,
}

impl ChainConfig {
    /// Ubiq mainnet fork blocks and reward steps
    pub fn mainnet() -> Self {
        Self {
            digishield_mod_block: Some(4088),
            flux_block: Some(8000),
            monetary_policy: vec![
                MonetaryPolicyStep::ubq_tenths(1, 80),
                MonetaryPolicyStep::ubq_tenths(358_364, 70),
                MonetaryPolicyStep::ubq_tenths(716_728, 60),
                MonetaryPolicyStep::ubq_tenths(1_075_091, 50),
                MonetaryPolicyStep::ubq_tenths(1_433_455, 40),
                MonetaryPolicyStep::ubq_tenths(1_791_819, 30),
                MonetaryPolicyStep::ubq_tenths(2_150_182, 20),
                MonetaryPolicyStep::ubq_tenths(2_508_546, 10),
            ],
        }
    }

    /// Whether the DigishieldV3-mod fork is active at `number`
    pub fn is_digishield_mod(&self, number: u64) -> bool {
        self.digishield_mod_block.is_some_and(|fork| number >= fork)
    }

    /// Whether the Flux fork is active at `number`
    pub fn is_flux(&self, number: u64) -> bool {
        self.flux_block.is_some_and(|fork| number >= fork)
    }

    /// Retarget algorithm governing the block numbered `next_number`
    pub fn difficulty_algorithm(&self, next_number: u64) -> DifficultyAlgorithm {
        if self.is_flux(next_number) {
            DifficultyAlgorithm::Flux(RetargetParams::FLUX)
        } else if self.is_digishield_mod(next_number) {
            DifficultyAlgorithm::DigishieldV3(RetargetParams::DIGISHIELD_V3_MOD)
        } else {
            DifficultyAlgorithm::DigishieldV3(RetargetParams::DIGISHIELD_V3)
        }
    }
}
