//! OCR quality weighting.

/// Multiplier for documents without a quality score.
pub const UNSCORED_QUALITY_MULTIPLIER: f64 = 0.9;

/// Map a document quality score (0.0–5.0) to `[0.8, 1.0]`.
///
/// Out-of-range scores are clamped; a missing score gets
/// [`UNSCORED_QUALITY_MULTIPLIER`].
#[must_use]
pub fn quality_multiplier(quality: Option<f64>) -> f64 {
    match quality {
        None => UNSCORED_QUALITY_MULTIPLIER,
        Some(q) if q.is_nan() => UNSCORED_QUALITY_MULTIPLIER,
        Some(q) => 0.04_f64.mul_add(q.clamp(0.0, 5.0), 0.8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn endpoints() {
        assert!((quality_multiplier(Some(0.0)) - 0.8).abs() < 1e-12);
        assert!((quality_multiplier(Some(5.0)) - 1.0).abs() < 1e-12);
        assert!((quality_multiplier(None) - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_is_clamped() {
        assert!((quality_multiplier(Some(-3.0)) - 0.8).abs() < 1e-12);
        assert!((quality_multiplier(Some(9.0)) - 1.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn strictly_monotone_within_range(a in 0.0_f64..5.0, b in 0.0_f64..5.0) {
            prop_assume!((a - b).abs() > 1e-9);
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            prop_assert!(quality_multiplier(Some(lo)) < quality_multiplier(Some(hi)));
        }

        #[test]
        fn always_within_bounds(q in -10.0_f64..10.0) {
            let m = quality_multiplier(Some(q));
            prop_assert!((0.8 - 1e-12..=1.0 + 1e-12).contains(&m));
        }
    }
}
