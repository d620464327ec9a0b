//! Difficulty adjustment algorithms
//!
//! Two families live here:
//!
//! - **Ethereum-lineage calculators** (`Frontier`, `Homestead`, `BombDelay`):
//!   parent difficulty nudged by `parent / 2048` per time bucket, floored at
//!   [`MINIMUM_DIFFICULTY`], plus the exponential "bomb" term. Implemented in
//!   fixed-width `U256` ([`fixed`]) and in arbitrary precision ([`reference`]);
//!   both agree whenever the reference result fits in 256 bits.
//! - **Median-time retargets** (`DigishieldV3`, `Flux`): compare the
//!   median-time span of the last `averaging_window` blocks with its ideal
//!   value and scale the parent difficulty inversely ([`retarget`]).
//!
//! Higher difficulty = harder. Nothing in this module does I/O or fails.

pub mod fixed;
pub mod reference;
pub mod retarget;

pub use fixed::{frontier, homestead, BombDelayCalculator};
pub use retarget::{digishield_v3, flux, RetargetParams};

use crate::chain::{ChainConfig, ChainHeaderReader, ParentHeader};
use primitive_types::U256;

/// Difficulty floor
pub const MINIMUM_DIFFICULTY: u64 = 131_072;

/// Blocks per bomb period
pub const EXP_DIFF_PERIOD: u64 = 100_000;

/// Right shift giving the per-step adjustment (divide by 2048)
pub const DIFFICULTY_BOUND_DIVISOR_SHIFT: usize = 11;

/// Frontier increases difficulty when blocks arrive faster than this (seconds)
pub const FRONTIER_DURATION_LIMIT: u64 = 13;

/// Target block time of the median-time retargets (seconds)
pub const TARGET_BLOCK_TIME: u64 = 88;

/// Difficulty algorithm selected for a block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DifficultyAlgorithm {
    /// Original Ethereum rule with a 13-second threshold
    Frontier,
    /// Graduated adjustment in 10-second buckets
    Homestead,
    /// Uncle-aware rule with an optionally delayed bomb
    BombDelay(Option<u64>),
    /// DigishieldV3 median-time retarget
    DigishieldV3(RetargetParams),
    /// Flux median-time retarget with dampening
    Flux(RetargetParams),
}

impl DifficultyAlgorithm {
    /// Difficulty of a block created at `time` on top of `parent`
    pub fn calculate(&self, chain: &dyn ChainHeaderReader, time: u64, parent: &ParentHeader) -> U256 {
        match self {
            Self::Frontier => frontier(time, parent),
            Self::Homestead => homestead(time, parent),
            Self::BombDelay(delay) => BombDelayCalculator::new(*delay).calculate(time, parent),
            Self::DigishieldV3(params) => digishield_v3(chain, parent, params),
            Self::Flux(params) => flux(chain, time, parent, params),
        }
    }
}

/// Difficulty of the block after `parent`, using the algorithm active at that height
pub fn calc_difficulty(
    chain: &dyn ChainHeaderReader,
    config: &ChainConfig,
    time: u64,
    parent: &ParentHeader,
) -> U256 {
    let next = parent.number.saturating_add(1);
    config.difficulty_algorithm(next).calculate(chain, time, parent)
}
