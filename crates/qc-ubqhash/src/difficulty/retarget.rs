//! Median-time retargets: DigishieldV3 and Flux
//!
//! Both measure the median-time span of the last `averaging_window` blocks,
//! damp its deviation from the ideal span by a factor of four, clamp it to an
//! allowed band and scale the parent difficulty by `ideal / actual`.

use super::{MINIMUM_DIFFICULTY, TARGET_BLOCK_TIME};
use crate::chain::{ChainHeaderReader, ParentHeader};
use primitive_types::{U256, U512};
use tracing::debug;

/// Tuning of a median-time retarget
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetargetParams {
    /// Number of blocks in the measured window
    pub averaging_window: u64,
    /// Allowed slowdown of the window, in `1/factor` units
    pub max_adjust_down: u64,
    /// Allowed speedup of the window, in `1/factor` units
    pub max_adjust_up: u64,
    /// Tighter band used by Flux when the last block alone looks normal
    pub dampen: u64,
    /// Denominator of the adjust bounds
    pub factor: u64,
}

impl RetargetParams {
    /// Original DigishieldV3 tuning
    pub const DIGISHIELD_V3: Self = Self {
        averaging_window: 21,
        max_adjust_down: 16,
        max_adjust_up: 8,
        dampen: 0,
        factor: 100,
    };

    /// DigishieldV3 with a longer window and a narrower band
    pub const DIGISHIELD_V3_MOD: Self = Self {
        averaging_window: 88,
        max_adjust_down: 3,
        max_adjust_up: 2,
        dampen: 0,
        factor: 100,
    };

    /// Flux tuning
    pub const FLUX: Self = Self {
        averaging_window: 88,
        max_adjust_down: 5,
        max_adjust_up: 3,
        dampen: 1,
        factor: 1000,
    };

    /// Ideal duration of the window in seconds
    pub fn averaging_window_timespan(&self) -> u64 {
        self.averaging_window * TARGET_BLOCK_TIME
    }

    /// Lower bound for the measured span
    pub fn min_actual_timespan(&self, dampened: bool) -> u64 {
        let adjust = if dampened { self.dampen } else { self.max_adjust_up };
        self.averaging_window_timespan() * self.factor.saturating_sub(adjust) / self.factor
    }

    /// Upper bound for the measured span
    pub fn max_actual_timespan(&self, dampened: bool) -> u64 {
        let adjust = if dampened { self.dampen } else { self.max_adjust_down };
        self.averaging_window_timespan() * (self.factor + adjust) / self.factor
    }
}

/// Window span measured from median times, with its deviation quartered
fn damped_timespan(
    chain: &dyn ChainHeaderReader,
    parent: &ParentHeader,
    params: &RetargetParams,
) -> i128 {
    let first_block = parent.number - params.averaging_window;
    let last_time = chain.calc_past_median_time(parent.number, parent);
    let first_time = chain.calc_past_median_time(first_block, parent);

    let ideal = i128::from(params.averaging_window_timespan());
    let actual = i128::from(last_time) - i128::from(first_time);
    // Floor division: negative deviations round down.
    ideal + (actual - ideal).div_euclid(4)
}

/// `parent * ideal / actual`, floored at the minimum difficulty
fn scale(parent_difficulty: U256, ideal: u64, actual: i128) -> U256 {
    let actual = u64::try_from(actual.max(1)).unwrap_or(u64::MAX);
    let scaled = parent_difficulty.full_mul(U256::from(ideal)) / U512::from(actual);
    let difficulty = U256::try_from(scaled).unwrap_or(U256::MAX);
    difficulty.max(U256::from(MINIMUM_DIFFICULTY))
}

/// DigishieldV3 retarget; returns the parent difficulty until a full window exists.
pub fn digishield_v3(
    chain: &dyn ChainHeaderReader,
    parent: &ParentHeader,
    params: &RetargetParams,
) -> U256 {
    if parent.number <= params.averaging_window {
        return parent.difficulty;
    }

    let mut actual = damped_timespan(chain, parent, params);
    let min = i128::from(params.min_actual_timespan(false));
    let max = i128::from(params.max_actual_timespan(false));
    if actual < min {
        actual = min;
    } else if actual > max {
        actual = max;
    }

    let difficulty = scale(parent.difficulty, params.averaging_window_timespan(), actual);
    debug!(
        parent = parent.number,
        actual_timespan = actual as i64,
        %difficulty,
        "DigishieldV3 retarget"
    );
    difficulty
}

/// Flux retarget: DigishieldV3 whose clamp band narrows to `dampen` when the
/// parent itself arrived within a normal interval.
pub fn flux(
    chain: &dyn ChainHeaderReader,
    time: u64,
    parent: &ParentHeader,
    params: &RetargetParams,
) -> U256 {
    if parent.number <= params.averaging_window {
        return parent.difficulty;
    }

    let block_time = time.saturating_sub(parent.time);
    let mut actual = damped_timespan(chain, parent, params);
    let min = i128::from(params.min_actual_timespan(false));
    let max = i128::from(params.max_actual_timespan(false));

    if actual < min {
        let dampened = block_time > TARGET_BLOCK_TIME * 2;
        actual = i128::from(params.min_actual_timespan(dampened));
    } else if actual > max {
        let dampened = block_time < TARGET_BLOCK_TIME / 2;
        actual = i128::from(params.max_actual_timespan(dampened));
    }

    let difficulty = scale(parent.difficulty, params.averaging_window_timespan(), actual);
    debug!(
        parent = parent.number,
        block_time,
        actual_timespan = actual as i64,
        %difficulty,
        "Flux retarget"
    );
    difficulty
}
