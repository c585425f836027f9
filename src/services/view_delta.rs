//! Incremental views between two measurements of the same post

/// Result of comparing a raw measurement against the last recorded total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDelta {
    /// Views attributable to this measurement, never negative
    pub delta: i64,
    /// High-water mark to record as the post's cumulative views
    pub cumulative: i64,
    /// The raw measurement went below the previous cumulative count
    pub regressed: bool,
}

/// Compute the delta for `current` given the previous cumulative count.
///
/// A post with no history starts from zero. A regression floors the delta at
/// zero and keeps the previous high-water mark, so views lost to a
/// platform recount are not paid a second time when they come back.
pub fn compute(previous: Option<i64>, current: i64) -> ViewDelta {
    let previous = previous.unwrap_or(0).max(0);
    let current = current.max(0);

    if current < previous {
        return ViewDelta {
            delta: 0,
            cumulative: previous,
            regressed: true,
        };
    }

    ViewDelta {
        delta: current - previous,
        cumulative: current,
        regressed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_measurement_is_full_delta() {
        let result = compute(None, 5_000);
        assert_eq!(result.delta, 5_000);
        assert_eq!(result.cumulative, 5_000);
        assert!(!result.regressed);
    }

    #[test]
    fn test_regression_clips_to_zero() {
        let result = compute(Some(12_000), 11_500);
        assert_eq!(result.delta, 0);
        assert_eq!(result.cumulative, 12_000);
        assert!(result.regressed);
    }

    #[test]
    fn test_unchanged_count_is_not_a_regression() {
        let result = compute(Some(800), 800);
        assert_eq!(result.delta, 0);
        assert!(!result.regressed);
    }

    #[test]
    fn test_deltas_telescope_over_non_decreasing_sequence() {
        let views = [1_200_i64, 1_200, 4_750, 9_001, 9_002, 250_000];
        let mut previous = Some(views[0]);
        let mut total = 0;
        for &v in &views[1..] {
            let step = compute(previous, v);
            assert!(step.delta >= 0);
            total += step.delta;
            previous = Some(step.cumulative);
        }
        assert_eq!(total, views[views.len() - 1] - views[0]);
    }

    #[test]
    fn test_recovery_after_regression_only_pays_new_views() {
        let first = compute(None, 10_000);
        let dip = compute(Some(first.cumulative), 7_000);
        let recovered = compute(Some(dip.cumulative), 10_500);
        assert_eq!(first.delta + dip.delta + recovered.delta, 10_500);
        assert_eq!(recovered.delta, 500);
    }
}
