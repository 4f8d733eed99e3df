//! Multisignature-deposit parameters (§9 supplement, grounded on
//! `tests/CoreTests/Deposit.cpp` and `CryptoNoteConfig.h`'s
//! `DEPOSIT_MIN_TERM`/`DEPOSIT_MAX_TERM`/interest constants).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositParams {
    pub min_amount: u64,
    pub min_term: u32,
    pub max_term: u32,
    /// Basis points of interest per term-unit; `calculateInterest` applies
    /// this linearly: `amount * term * basis_points_per_term / 10_000`.
    pub interest_basis_points_per_term: u64,
}

impl Default for DepositParams {
    fn default() -> Self {
        Self {
            min_amount: 1_000_000_000_000,
            min_term: 5_480,
            max_term: 5_480 * 12,
            interest_basis_points_per_term: 3,
        }
    }
}

/// `calculateInterest(amount, term)` (§4.4, §GLOSSARY).
pub fn calculate_interest(amount: u64, term: u32, params: &DepositParams) -> u64 {
    let bp = u128::from(params.interest_basis_points_per_term);
    let amount = u128::from(amount);
    let term = u128::from(term);
    let interest = amount.saturating_mul(term).saturating_mul(bp) / 10_000;
    interest.min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_scales_with_term() {
        let params = DepositParams::default();
        let short = calculate_interest(params.min_amount, params.min_term, &params);
        let long = calculate_interest(params.min_amount, params.min_term * 2, &params);
        assert!(long > short);
        assert_eq!(long, short * 2);
    }

    #[test]
    fn zero_amount_yields_zero_interest() {
        let params = DepositParams::default();
        assert_eq!(calculate_interest(0, params.min_term, &params), 0);
    }
}
