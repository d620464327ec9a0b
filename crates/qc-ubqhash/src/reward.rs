//! Block and uncle rewards

use crate::chain::ChainConfig;
use primitive_types::U256;

/// Ceiling applied to the step reward under the alternate policy (1.5 UBQ)
pub fn alternate_policy_reward() -> U256 {
    U256::exp10(17) * U256::from(15u8)
}

/// Base reward at `height`.
///
/// Returns `(step_reward, reward)`: the reward of the latest step whose
/// activation block is at or below `height`, and the amount actually paid.
/// The two differ only under the alternate policy, which caps the paid
/// reward at [`alternate_policy_reward`]. Both are zero before the first step.
pub fn calc_base_block_reward(config: &ChainConfig, height: u64, alternate: bool) -> (U256, U256) {
    let step_reward = config
        .monetary_policy
        .iter()
        .filter(|step| step.activation_block <= height)
        .max_by_key(|step| step.activation_block)
        .map(|step| step.reward)
        .unwrap_or_default();

    let reward = if alternate {
        step_reward.min(alternate_policy_reward())
    } else {
        step_reward
    };
    (step_reward, reward)
}

/// Uncle reward: `(uncle_height + 2 - height) * reward / 2`, never negative.
pub fn calc_uncle_block_reward(height: u64, uncle_height: u64, block_reward: U256) -> U256 {
    match uncle_height.saturating_add(2).checked_sub(height) {
        Some(credit) if credit > 0 => block_reward.saturating_mul(U256::from(credit)) / 2,
        _ => U256::zero(),
    }
}
