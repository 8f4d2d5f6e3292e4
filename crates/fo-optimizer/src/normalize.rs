//! Min-max rescaling of observed scores.

use rand::Rng;

/// Rescale `values` into [0, 1] by their min and max.
///
/// A zero range (all values identical, including a single value) yields
/// independent uniform draws in [0, 1) instead of a constant.
pub fn normalize<R: Rng>(values: &[f64], rng: &mut R) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    if range == 0.0 {
        return values.iter().map(|_| rng.random::<f64>()).collect();
    }

    values.iter().map(|v| (v - min) / range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn maps_extremes_to_unit_interval() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let out = normalize(&[1.0, 5.0, 2.0], &mut rng);
        assert_eq!(out, vec![0.0, 1.0, 0.25]);
    }

    #[test]
    fn preserves_ordering() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let input = [-3.5, 10.0, 0.0, 7.25, -1.0, 10.0];
        let out = normalize(&input, &mut rng);
        for (i, a) in input.iter().enumerate() {
            assert!((0.0..=1.0).contains(&out[i]));
            for (j, b) in input.iter().enumerate() {
                if a < b {
                    assert!(out[i] < out[j]);
                }
            }
        }
    }

    #[test]
    fn degenerate_range_yields_random_noise() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let first = normalize(&[4.0; 6], &mut rng);
        let second = normalize(&[4.0; 6], &mut rng);
        assert_eq!(first.len(), 6);
        assert!(first.iter().all(|v| (0.0..1.0).contains(v)));
        assert_ne!(first, second);
    }

    #[test]
    fn single_value_is_degenerate() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let out = normalize(&[42.0], &mut rng);
        assert_eq!(out.len(), 1);
        assert!((0.0..1.0).contains(&out[0]));
    }

    #[test]
    fn empty_input_stays_empty() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(normalize(&[], &mut rng).is_empty());
    }
}
