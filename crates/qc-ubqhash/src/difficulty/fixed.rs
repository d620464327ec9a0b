//! Fixed-width (U256) Ethereum-lineage difficulty calculators
//!
//! Arithmetic wraps modulo 2^256 exactly like a 256-bit register would; a
//! bomb shift of 256 or more contributes nothing.

use super::{
    DIFFICULTY_BOUND_DIVISOR_SHIFT, EXP_DIFF_PERIOD, FRONTIER_DURATION_LIMIT, MINIMUM_DIFFICULTY,
};
use crate::chain::ParentHeader;
use primitive_types::U256;

/// Largest per-block adjustment multiplier
const MAX_ADJUSTMENT_STEPS: u64 = 99;

/// 2^exp, zero once the shift leaves the register
fn pow2(exp: u64) -> U256 {
    if exp >= 256 {
        U256::zero()
    } else {
        U256::one() << (exp as usize)
    }
}

/// Exponential term for a given bomb period
fn bomb(period_count: u64) -> U256 {
    if period_count > 1 {
        pow2(period_count - 2)
    } else {
        U256::zero()
    }
}

fn adjust(difficulty: U256, negative: bool, step: U256) -> U256 {
    if negative {
        difficulty.overflowing_sub(step).0
    } else {
        difficulty.overflowing_add(step).0
    }
}

fn floored(difficulty: U256) -> U256 {
    difficulty.max(U256::from(MINIMUM_DIFFICULTY))
}

/// Frontier rule: `±parent/2048` depending on a 13-second threshold.
///
/// A `time` earlier than `parent.time` counts as zero elapsed seconds.
pub fn frontier(time: u64, parent: &ParentHeader) -> U256 {
    let step = parent.difficulty >> DIFFICULTY_BOUND_DIVISOR_SHIFT;
    let faster = time.saturating_sub(parent.time) < FRONTIER_DURATION_LIMIT;
    let difficulty = floored(adjust(parent.difficulty, !faster, step));

    let period_count = parent.number.saturating_add(1) / EXP_DIFF_PERIOD;
    difficulty.overflowing_add(bomb(period_count)).0
}

/// Homestead rule: `parent/2048 * max(1 - elapsed/10, -99)`.
///
/// A `time` earlier than `parent.time` counts as zero elapsed seconds.
pub fn homestead(time: u64, parent: &ParentHeader) -> U256 {
    let buckets = time.saturating_sub(parent.time) / 10;
    let (steps, negative) = match buckets {
        0 => (1, false),
        _ => ((buckets - 1).min(MAX_ADJUSTMENT_STEPS), true),
    };

    let step = (parent.difficulty >> DIFFICULTY_BOUND_DIVISOR_SHIFT)
        .overflowing_mul(U256::from(steps))
        .0;
    let difficulty = floored(adjust(parent.difficulty, negative, step));

    let period_count = parent.number.saturating_add(1) / EXP_DIFF_PERIOD;
    difficulty.overflowing_add(bomb(period_count)).0
}

/// Uncle-aware calculator with an optionally delayed bomb
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BombDelayCalculator {
    /// Delay expressed against the parent number (`delay - 1`)
    bomb_delay_from_parent: Option<u64>,
    /// Seconds per adjustment bucket
    median_block_time: u64,
}

impl BombDelayCalculator {
    /// Create a calculator; `None` or a zero delay disables the bomb.
    ///
    /// Any `Some` delay, zero included, selects 9-second buckets.
    pub fn new(bomb_delay: Option<u64>) -> Self {
        match bomb_delay {
            Some(delay) => Self {
                bomb_delay_from_parent: delay.checked_sub(1),
                median_block_time: 9,
            },
            None => Self {
                bomb_delay_from_parent: None,
                median_block_time: 15,
            },
        }
    }

    /// Difficulty of a block created at `time` on top of `parent`.
    ///
    /// A `time` earlier than `parent.time` counts as zero elapsed seconds.
    pub fn calculate(&self, time: u64, parent: &ParentHeader) -> U256 {
        let buckets = time.saturating_sub(parent.time) / self.median_block_time;
        let target = if parent.has_uncles { 2 } else { 1 };
        let (steps, negative) = if buckets >= target {
            (buckets - target, true)
        } else {
            (target - buckets, false)
        };

        let step = (parent.difficulty >> DIFFICULTY_BOUND_DIVISOR_SHIFT)
            .overflowing_mul(U256::from(steps.min(MAX_ADJUSTMENT_STEPS)))
            .0;
        let difficulty = floored(adjust(parent.difficulty, negative, step));

        match self.bomb_delay_from_parent {
            Some(from_parent) if parent.number >= from_parent => {
                let fake_number = parent.number - from_parent;
                if fake_number >= 2 * EXP_DIFF_PERIOD {
                    difficulty.overflowing_add(bomb(fake_number / EXP_DIFF_PERIOD)).0
                } else {
                    difficulty
                }
            }
            _ => difficulty,
        }
    }
}
