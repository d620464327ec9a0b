//! Arbitrary-precision reference calculators
//!
//! Same rules as [`super::fixed`] with unbounded integers and signed
//! intermediates. Used to cross-check the fixed-width implementations.

use super::{
    DIFFICULTY_BOUND_DIVISOR_SHIFT, EXP_DIFF_PERIOD, FRONTIER_DURATION_LIMIT, MINIMUM_DIFFICULTY,
};
use crate::chain::ParentHeader;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};
use primitive_types::U256;

/// Convert a 256-bit value to an unbounded integer
pub fn to_biguint(value: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    BigUint::from_bytes_be(&bytes)
}

/// Convert back to 256 bits; `None` when the value does not fit
pub fn from_biguint(value: &BigUint) -> Option<U256> {
    if value.bits() > 256 {
        return None;
    }
    Some(U256::from_big_endian(&value.to_bytes_be()))
}

fn bomb(period_count: &BigUint) -> BigUint {
    let two = BigUint::from(2u8);
    if *period_count > BigUint::one() {
        let exp = period_count - &two;
        // Periods come from a u64 block number, so the exponent fits in u64.
        let shift = exp.iter_u64_digits().next().unwrap_or(0);
        BigUint::one() << shift
    } else {
        BigUint::zero()
    }
}

fn floor_min(value: BigInt) -> BigUint {
    let min = BigInt::from(MINIMUM_DIFFICULTY);
    value.max(min).to_biguint().unwrap_or_default()
}

/// Seconds since the parent; an earlier `time` counts as zero.
fn elapsed(time: u64, parent: &ParentHeader) -> BigInt {
    BigInt::from(time.saturating_sub(parent.time))
}

/// Frontier rule on unbounded integers
pub fn frontier(time: u64, parent: &ParentHeader) -> BigUint {
    let difficulty = to_biguint(parent.difficulty);
    let step = &difficulty >> DIFFICULTY_BOUND_DIVISOR_SHIFT;

    let adjusted = if elapsed(time, parent) < BigInt::from(FRONTIER_DURATION_LIMIT) {
        BigInt::from(difficulty + step)
    } else {
        BigInt::from(difficulty) - BigInt::from(step)
    };
    let floored = floor_min(adjusted);

    let period_count = (BigUint::from(parent.number) + 1u32) / EXP_DIFF_PERIOD;
    floored + bomb(&period_count)
}

/// Homestead rule on unbounded integers
pub fn homestead(time: u64, parent: &ParentHeader) -> BigUint {
    // 1 - elapsed / 10, clamped at -99
    let mut x = BigInt::one() - elapsed(time, parent) / 10u32;
    let limit = BigInt::from(-99);
    if x < limit {
        x = limit;
    }

    let difficulty = BigInt::from(to_biguint(parent.difficulty));
    let step = &difficulty >> DIFFICULTY_BOUND_DIVISOR_SHIFT;
    let floored = floor_min(difficulty + step * x);

    let period_count = (BigUint::from(parent.number) + 1u32) / EXP_DIFF_PERIOD;
    floored + bomb(&period_count)
}

/// Uncle-aware rule with optional bomb delay on unbounded integers.
/// A zero delay keeps 9-second buckets but adds no bomb.
pub fn bomb_delay(bomb_delay: Option<u64>, time: u64, parent: &ParentHeader) -> BigUint {
    let median_block_time: u32 = if bomb_delay.is_some() { 9 } else { 15 };
    let target = if parent.has_uncles { 2 } else { 1 };

    // c - elapsed / median, clamped at -99
    let mut x = BigInt::from(target) - elapsed(time, parent) / median_block_time;
    let limit = BigInt::from(-99);
    if x < limit {
        x = limit;
    }

    let difficulty = BigInt::from(to_biguint(parent.difficulty));
    let step = &difficulty >> DIFFICULTY_BOUND_DIVISOR_SHIFT;
    let mut result = floor_min(difficulty + step * x);

    if let Some(delay) = bomb_delay.filter(|delay| *delay > 0) {
        let from_parent = BigInt::from(delay) - 1;
        let number = BigInt::from(parent.number);
        if number >= from_parent {
            let fake_number = (number - from_parent).to_biguint().unwrap_or_default();
            let period_count = fake_number / EXP_DIFF_PERIOD;
            result += bomb(&period_count);
        }
    }
    result
}
