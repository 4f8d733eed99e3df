//! Emission-curve parameters (§4.3).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoneyParams {
    /// Total coins ever mintable, in atomic units.
    pub money_supply: u64,
    /// `baseReward = (MoneySupply - G) >> emission_speed_factor`.
    pub emission_speed_factor: u8,
    /// Minimum per-block reward once the main curve decays below it; `0`
    /// disables tail emission.
    pub tail_emission_reward: u64,
    pub coin_decimals: u8,
}

impl Default for MoneyParams {
    fn default() -> Self {
        Self {
            money_supply: u64::MAX / 2,
            emission_speed_factor: 21,
            tail_emission_reward: 0,
            coin_decimals: 8,
        }
    }
}
