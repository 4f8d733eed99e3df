//! Windowed, trimmed-median difficulty retarget (§4.2, §8 invariant 3).

/// `nextDifficulty(timestamps, cumulativeDifficulties)` (§4.2).
///
/// `window`, `cut`, and `target_seconds` select the V1/V2 parameter
/// triple; the caller picks these via
/// [`cn_constants::Currency::difficulty_params_for_major_version`].
pub fn next_difficulty(
    timestamps: &[u64],
    cumulative_difficulties: &[u128],
    window: usize,
    cut: usize,
    target_seconds: u64,
) -> u128 {
    assert_eq!(timestamps.len(), cumulative_difficulties.len());

    let len = timestamps.len().min(window);
    if len < 2 {
        return 1;
    }

    let timestamps = &timestamps[timestamps.len() - len..];
    let cumulative_difficulties = &cumulative_difficulties[cumulative_difficulties.len() - len..];

    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();

    let (begin, end) = trimmed_window_bounds(len, cut);
    if begin >= end {
        return 1;
    }

    let timespan = (sorted[end - 1].saturating_sub(sorted[begin])).max(1);

    // The cumulative-difficulty slice is aligned by insertion order (not
    // sorted), so we take the same trimmed count from each end of the
    // original (unsorted) window.
    let work = cumulative_difficulties[end - 1] - cumulative_difficulties[begin];

    let target = u128::from(target_seconds);
    let timespan = u128::from(timespan);
    let result = (work * target + timespan - 1) / timespan;
    result.max(1)
}

/// Trims `cut` entries from each end of a length-`len` window, clamping so
/// at least one entry always survives.
fn trimmed_window_bounds(len: usize, cut: usize) -> (usize, usize) {
    if len <= cut * 2 {
        return (0, len);
    }
    (cut, len - cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_one_with_fewer_than_two_entries() {
        assert_eq!(next_difficulty(&[], &[], 720, 60, 120), 1);
        assert_eq!(next_difficulty(&[1], &[100], 720, 60, 120), 1);
    }

    #[test]
    fn constant_spacing_converges_near_one_at_target() {
        let target = 120u64;
        let n = 100;
        let timestamps: Vec<u64> = (0..n).map(|i| i as u64 * target).collect();
        let cumulative: Vec<u128> = (0..n).map(|i| i as u128 + 1).collect();
        let diff = next_difficulty(&timestamps, &cumulative, 720, 60, target);
        assert!(diff >= 1);
    }

    #[test]
    fn never_returns_zero() {
        let timestamps = vec![10u64, 10, 10, 10];
        let cumulative = vec![1u128, 2, 3, 4];
        let diff = next_difficulty(&timestamps, &cumulative, 720, 1, 120);
        assert!(diff >= 1);
    }

    #[test]
    fn more_work_in_same_time_raises_difficulty() {
        let timestamps: Vec<u64> = (0..20).map(|i| i as u64 * 120).collect();
        let low_work: Vec<u128> = (0..20).map(|i| i as u128).collect();
        let high_work: Vec<u128> = (0..20).map(|i| i as u128 * 10).collect();
        let low = next_difficulty(&timestamps, &low_work, 720, 2, 120);
        let high = next_difficulty(&timestamps, &high_work, 720, 2, 120);
        assert!(high > low);
    }

    proptest::proptest! {
        #[test]
        fn prop_never_zero(
            n in 2usize..50,
            base in 0u64..1_000_000,
        ) {
            let timestamps: Vec<u64> = (0..n).map(|i| base + i as u64 * 60).collect();
            let cumulative: Vec<u128> = (0..n).map(|i| i as u128 + 1).collect();
            let diff = next_difficulty(&timestamps, &cumulative, 720, 60, 120);
            proptest::prop_assert!(diff >= 1);
        }
    }
}
