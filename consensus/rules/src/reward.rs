//! Emission curve and size-penalised block reward (§4.3).

use cn_constants::money::MoneyParams;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockRewardError {
    #[error("cumulative block size {size} exceeds twice the median {median}")]
    CumulativeBlockSizeLimitExceeded { size: usize, median: usize },
    #[error("coinbase sum {actual} does not equal base reward + fees {expected}")]
    InvalidCoinbaseSum { actual: u64, expected: u64 },
}

/// `baseReward = (MoneySupply - G) >> emissionSpeedFactor`, floored at the
/// tail-emission reward when configured (§4.3, §9 open question: "the
/// tail emission path is reachable but disabled by default").
pub fn base_reward(already_generated_coins: u64, params: &MoneyParams) -> u64 {
    let remaining = params.money_supply.saturating_sub(already_generated_coins);
    let decayed = remaining >> params.emission_speed_factor;
    decayed.max(params.tail_emission_reward)
}

/// Applies the median-block-size penalty to `reward` (§4.3):
/// `reward *= 1 - ((size - median) / median)^2`, only when `size > median`.
/// Returns an error if `size > 2 * median` (block must be rejected).
pub fn penalised_reward(
    reward: u64,
    block_size: usize,
    median_size: usize,
) -> Result<u64, BlockRewardError> {
    if block_size <= median_size || median_size == 0 {
        return Ok(reward);
    }
    if block_size > 2 * median_size {
        return Err(BlockRewardError::CumulativeBlockSizeLimitExceeded {
            size: block_size,
            median: median_size,
        });
    }

    // reward * (1 - ((size-median)/median)^2) expands to
    // reward * size * (2*median - size) / median^2 (CryptoNote's
    // getPenalizedAmount), computed in u128 to avoid overflow for large
    // rewards/sizes.
    let reward = u128::from(reward);
    let size = block_size as u128;
    let median = median_size as u128;
    let two_median_minus_size = 2 * median - size; // always > 0 since size <= 2*median
    let numerator = reward * size * two_median_minus_size;
    let denominator = median * median;
    Ok((numerator / denominator) as u64)
}

/// Validates the coinbase sum against the expected `baseReward + fees`
/// after penalty, and returns the effective reward (§4.3, §4.4 step 9).
pub fn validate_coinbase_sum(
    coinbase_output_sum: u64,
    already_generated_coins: u64,
    block_size: usize,
    median_size: usize,
    fees: u64,
    money_params: &MoneyParams,
) -> Result<u64, BlockRewardError> {
    let base = base_reward(already_generated_coins, money_params);
    let effective = penalised_reward(base, block_size, median_size.max(1))?;
    let expected = effective.saturating_add(fees);
    if coinbase_output_sum != expected {
        return Err(BlockRewardError::InvalidCoinbaseSum {
            actual: coinbase_output_sum,
            expected,
        });
    }
    Ok(effective)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_reward_halves_over_time() {
        let params = MoneyParams {
            money_supply: 1 << 40,
            emission_speed_factor: 1,
            tail_emission_reward: 0,
            coin_decimals: 8,
        };
        let r0 = base_reward(0, &params);
        let r1 = base_reward(r0, &params);
        assert!(r1 < r0);
    }

    #[test]
    fn tail_emission_floors_the_reward() {
        let params = MoneyParams {
            money_supply: 100,
            emission_speed_factor: 20,
            tail_emission_reward: 7,
            coin_decimals: 8,
        };
        assert_eq!(base_reward(100, &params), 7);
    }

    #[test]
    fn no_penalty_under_median() {
        assert_eq!(penalised_reward(1000, 50, 100).unwrap(), 1000);
    }

    #[test]
    fn penalty_applies_over_median() {
        let full = penalised_reward(1000, 100, 100).unwrap();
        let penalised = penalised_reward(1000, 150, 100).unwrap();
        assert!(penalised < full);
    }

    #[test]
    fn penalty_matches_cryptonote_formula() {
        // reward * size * (2*median - size) / median^2
        // = 1000 * 150 * 50 / 10000 = 750
        assert_eq!(penalised_reward(1000, 150, 100).unwrap(), 750);
    }

    #[test]
    fn double_median_is_rejected() {
        assert!(penalised_reward(1000, 201, 100).is_err());
        assert!(penalised_reward(1000, 200, 100).is_ok());
    }

    #[test]
    fn coinbase_sum_must_match_expected() {
        let params = MoneyParams::default();
        let base = base_reward(0, &params);
        assert!(validate_coinbase_sum(base + 5, 0, 10, 100, 5, &params).is_ok());
        assert!(validate_coinbase_sum(base + 4, 0, 10, 100, 5, &params).is_err());
    }
}
