//! Robust summary statistics.

/// Mean after two-sided winsorization.
///
/// `k = round_half_even(limit · n)` observations on each side are clipped to the
/// nearest retained order statistic (not discarded), then the arithmetic mean is
/// taken. Non-finite values are ignored. Returns `None` for an empty input.
pub fn winsorized_mean(values: &[f64], lower: f64, upper: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let k_low = clip_count(lower, n);
    let k_high = clip_count(upper, n);
    if k_low + k_high >= n {
        // Everything clipped: fall back to the median-like central value.
        return Some(sorted[n / 2]);
    }

    let floor = sorted[k_low];
    let ceiling = sorted[n - k_high - 1];
    let sum: f64 = sorted.iter().map(|v| v.clamp(floor, ceiling)).sum();
    Some(sum / n as f64)
}

fn clip_count(limit: f64, n: usize) -> usize {
    if !(limit.is_finite() && limit > 0.0) {
        return 0;
    }
    (limit * n as f64).round_ties_even() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winsorization_clips_rather_than_drops() {
        // n = 20 -> one observation clipped on each side.
        let mut values: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        values[19] = 1000.0;
        let mean = winsorized_mean(&values, 0.05, 0.05).unwrap();
        // 1 -> 2 and 1000 -> 19; the rest are 2..=19.
        let expected = (2.0 + (2..=19).sum::<i32>() as f64 + 19.0) / 20.0;
        assert!((mean - expected).abs() < 1e-12);
    }

    #[test]
    fn short_histories_are_unclipped() {
        // 0.05 * 9 = 0.45 rounds to 0.
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 90.0];
        let mean = winsorized_mean(&values, 0.05, 0.05).unwrap();
        assert!((mean - 126.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn empty_input_has_no_mean() {
        assert!(winsorized_mean(&[], 0.05, 0.05).is_none());
        assert!(winsorized_mean(&[f64::NAN], 0.05, 0.05).is_none());
    }
}
