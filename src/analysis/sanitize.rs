/// Repair of non-finite feature values ahead of normalization.
///
/// ±Inf becomes missing (NaN), then every missing value becomes 0.0. The
/// classifier therefore never sees a non-finite input. Idempotent.

use crate::model::FeatureVector;

pub fn sanitize(features: &FeatureVector) -> FeatureVector {
    let missing = (*features).map(|x| if x.is_infinite() { f64::NAN } else { x });
    missing.map(|x| if x.is_nan() { 0.0 } else { x })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_values_untouched() {
        let v = [1.5, -2.0, 0.0, 1e9, -1e-9, 42.0];
        assert_eq!(sanitize(&v), v);
    }

    #[test]
    fn test_infinities_become_zero() {
        let v = [f64::INFINITY, 1.0, f64::NEG_INFINITY, 2.0, 3.0, 4.0];
        assert_eq!(sanitize(&v), [0.0, 1.0, 0.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_nan_becomes_zero() {
        let v = [f64::NAN, 1.0, 2.0, 3.0, 4.0, f64::NAN];
        assert_eq!(sanitize(&v), [0.0, 1.0, 2.0, 3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let v = [f64::INFINITY, f64::NAN, -3.5, f64::NEG_INFINITY, 0.0, 7.25];
        let once = sanitize(&v);
        assert_eq!(sanitize(&once), once);
        assert!(once.iter().all(|x| x.is_finite()));
    }
}
