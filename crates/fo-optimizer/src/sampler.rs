//! Reduction of the candidate set to a bounded working sample.

use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use fo_types::{Position, SearchError};

use crate::space::SearchSpace;

/// Ways of drawing candidates from an oversized candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Uniform draw without replacement.
    Random,
    /// Evenly strided flat indices.
    Grid,
}

impl fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("random"),
            Self::Grid => f.write_str("grid"),
        }
    }
}

impl FromStr for SamplingStrategy {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "grid" => Ok(Self::Grid),
            other => Err(SearchError::UnknownStrategy {
                name: other.to_string(),
            }),
        }
    }
}

/// Draws the working sample as flat indices into the candidate set.
///
/// Candidate sets no larger than `max_sample_size` are returned whole.
/// Larger sets are sampled by every configured strategy, the draws are
/// unioned, and a union that still exceeds `max_sample_size` is randomly
/// thinned down to it.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSampler {
    max_sample_size: usize,
    strategies: Vec<(SamplingStrategy, usize)>,
    warnings: usize,
}

impl CandidateSampler {
    pub fn new(
        max_sample_size: usize,
        sampling: &BTreeMap<SamplingStrategy, usize>,
        warnings: usize,
    ) -> Self {
        Self {
            max_sample_size,
            strategies: sampling.iter().map(|(s, n)| (*s, *n)).collect(),
            warnings,
        }
    }

    /// Whether a candidate set of `n_candidates` should be flagged.
    pub fn exceeds_warning_threshold(&self, n_candidates: usize) -> bool {
        n_candidates > self.warnings
    }

    pub fn sample<R: Rng>(&self, n_candidates: usize, rng: &mut R) -> Vec<usize> {
        if self.exceeds_warning_threshold(n_candidates) {
            warn!(
                "Candidate set of {} positions exceeds the warning threshold of {}",
                n_candidates, self.warnings
            );
        }

        if n_candidates <= self.max_sample_size {
            return (0..n_candidates).collect();
        }

        let mut union = BTreeSet::new();
        for &(strategy, count) in &self.strategies {
            let count = count.min(n_candidates);
            match strategy {
                SamplingStrategy::Random => {
                    union.extend(index::sample(rng, n_candidates, count).iter());
                }
                SamplingStrategy::Grid => {
                    union.extend(grid_indices(n_candidates, count));
                }
            }
        }

        let working = thin(union.into_iter().collect(), self.max_sample_size, rng);
        debug!(
            "Sampled {} of {} candidate positions",
            working.len(),
            n_candidates
        );
        working
    }

    /// Working sample for a space too large to address by flat index.
    ///
    /// Every strategy draws one index per dimension: `random` uniformly,
    /// `grid` as evenly strided columns paired at random (a Latin
    /// hypercube). Draws are deduplicated and capped like [`Self::sample`].
    pub fn sample_positions<R: Rng>(&self, space: &SearchSpace, rng: &mut R) -> Vec<Position> {
        warn!(
            "Candidate set of {} dimensions overflows a flat index, above the warning threshold of {}",
            space.n_dims(),
            self.warnings
        );

        let mut union = BTreeSet::new();
        for &(strategy, count) in &self.strategies {
            let count = count.min(self.max_sample_size);
            match strategy {
                SamplingStrategy::Random => {
                    for _ in 0..count {
                        union.insert(space.random_position(rng));
                    }
                }
                SamplingStrategy::Grid => {
                    union.extend(latin_hypercube(space, count, rng));
                }
            }
        }

        let working = thin(union.into_iter().collect(), self.max_sample_size, rng);
        debug!(
            "Sampled {} positions from an unindexed candidate set",
            working.len()
        );
        working
    }
}

/// Uniformly keep `max` of `items`, preserving their order.
fn thin<T, R: Rng>(items: Vec<T>, max: usize, rng: &mut R) -> Vec<T> {
    if items.len() <= max {
        return items;
    }
    let mut keep = index::sample(rng, items.len(), max).into_vec();
    keep.sort_unstable();
    let mut keep = keep.into_iter().peekable();
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| keep.next_if_eq(&i).map(|_| item))
        .collect()
}

/// `count` positions, evenly strided along every dimension.
fn latin_hypercube<R: Rng>(space: &SearchSpace, count: usize, rng: &mut R) -> Vec<Position> {
    let columns: Vec<Vec<usize>> = space
        .dimensions
        .iter()
        .map(|dim| {
            let mut column: Vec<usize> = grid_indices(dim.values.len(), count).collect();
            column.shuffle(rng);
            column
        })
        .collect();
    (0..count)
        .map(|i| Position::new(columns.iter().map(|column| column[i]).collect()))
        .collect()
}

/// `count` flat indices spread evenly over `0..n`.
fn grid_indices(n: usize, count: usize) -> impl Iterator<Item = usize> {
    (0..count).map(move |i| ((i as u128 * n as u128) / count as u128) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sampler(max: usize, strategies: &[(SamplingStrategy, usize)]) -> CandidateSampler {
        let sampling: BTreeMap<SamplingStrategy, usize> = strategies.iter().copied().collect();
        CandidateSampler::new(max, &sampling, usize::MAX)
    }

    #[test]
    fn small_sets_are_returned_whole() {
        let s = sampler(10, &[(SamplingStrategy::Random, 3)]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(s.sample(10, &mut rng), (0..10).collect::<Vec<_>>());
        assert_eq!(s.sample(4, &mut rng), vec![0, 1, 2, 3]);
    }

    #[test]
    fn random_draws_are_bounded_members() {
        let s = sampler(500, &[(SamplingStrategy::Random, 200)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let working = s.sample(1_000_000, &mut rng);
        assert_eq!(working.len(), 200);
        assert!(working.iter().all(|&i| i < 1_000_000));
        let distinct: BTreeSet<_> = working.iter().collect();
        assert_eq!(distinct.len(), working.len());
    }

    #[test]
    fn oversized_union_is_capped() {
        let s = sampler(
            50,
            &[(SamplingStrategy::Random, 80), (SamplingStrategy::Grid, 80)],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let working = s.sample(1000, &mut rng);
        assert_eq!(working.len(), 50);
        assert!(working.iter().all(|&i| i < 1000));
        assert!(working.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn grid_is_evenly_strided() {
        let s = sampler(5, &[(SamplingStrategy::Grid, 4)]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(s.sample(100, &mut rng), vec![0, 25, 50, 75]);
    }

    #[test]
    fn same_seed_same_sample() {
        let s = sampler(100, &[(SamplingStrategy::Random, 64)]);
        let a = s.sample(1 << 31, &mut ChaCha8Rng::seed_from_u64(9));
        let b = s.sample(1 << 31, &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    fn twenty_dims() -> SearchSpace {
        (0..20).fold(SearchSpace::new(), |space, i| space.add_int(format!("x{i}"), 0, 9))
    }

    #[test]
    fn unindexed_space_is_sampled_per_dimension() {
        let space = twenty_dims();
        let s = sampler(
            64,
            &[(SamplingStrategy::Random, 100), (SamplingStrategy::Grid, 30)],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let working = s.sample_positions(&space, &mut rng);

        assert_eq!(working.len(), 64);
        assert!(working.iter().all(|p| space.contains(p)));
        let distinct: BTreeSet<_> = working.iter().collect();
        assert_eq!(distinct.len(), working.len());
    }

    #[test]
    fn latin_hypercube_covers_every_value_per_dimension() {
        let space = twenty_dims();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let points = latin_hypercube(&space, 10, &mut rng);
        assert_eq!(points.len(), 10);
        for d in 0..20 {
            let mut column: Vec<usize> = points.iter().map(|p| p.as_slice()[d]).collect();
            column.sort_unstable();
            assert_eq!(column, (0..10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn thinning_keeps_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(14);
        let kept = thin((0..100).collect::<Vec<usize>>(), 10, &mut rng);
        assert_eq!(kept.len(), 10);
        assert!(kept.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("random".parse::<SamplingStrategy>().unwrap(), SamplingStrategy::Random);
        assert_eq!("grid".parse::<SamplingStrategy>().unwrap(), SamplingStrategy::Grid);
        assert!(matches!(
            "sobol".parse::<SamplingStrategy>(),
            Err(SearchError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn warning_threshold_is_strict() {
        let s = CandidateSampler::new(10, &BTreeMap::from([(SamplingStrategy::Random, 5)]), 100);
        assert!(!s.exceeds_warning_threshold(100));
        assert!(s.exceeds_warning_threshold(101));
    }
}
