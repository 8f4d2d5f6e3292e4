//! Bagged tree ensembles: random forest and extra trees.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use fo_types::{Position, SurrogateError};

use super::tree::{RegressionTree, SplitRule, TreeSettings};
use super::{query_matrix, training_matrix, Prediction, Surrogate, TreeParams};

/// Tree ensemble whose spread across members is the uncertainty estimate.
///
/// The random-forest flavour grows bootstrap trees with exhaustive
/// splits; the extra-trees flavour grows trees on the full training set
/// with random thresholds. Both report the mean and population standard
/// deviation of the member predictions.
#[derive(Debug, Clone)]
pub struct ForestRegressor {
    name: &'static str,
    params: TreeParams,
    settings: TreeSettings,
    rng: ChaCha8Rng,
    trees: Vec<RegressionTree>,
    n_dims: usize,
}

impl ForestRegressor {
    pub fn random_forest(params: TreeParams, seed: u64) -> Self {
        Self::with_rule("random_forest", params, SplitRule::Best, seed)
    }

    pub fn extra_trees(params: TreeParams, seed: u64) -> Self {
        Self::with_rule("extra_tree", params, SplitRule::Random, seed)
    }

    fn with_rule(name: &'static str, params: TreeParams, rule: SplitRule, seed: u64) -> Self {
        let settings = TreeSettings::from_params(&params, rule);
        Self {
            name,
            params,
            settings,
            rng: ChaCha8Rng::seed_from_u64(seed),
            trees: Vec::new(),
            n_dims: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Surrogate for ForestRegressor {
    fn fit(&mut self, positions: &[Position], scores: &[f64]) -> Result<(), SurrogateError> {
        let features = training_matrix(positions, scores)?;
        let n = features.len();
        let bootstrap = self.params.bootstrap;
        let settings = &self.settings;

        // Seeds are drawn up front so the parallel build stays reproducible.
        let seeds: Vec<u64> = (0..self.params.n_estimators)
            .map(|_| self.rng.random())
            .collect();

        self.trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let indices: Vec<usize> = if bootstrap {
                    (0..n).map(|_| rng.random_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(&features, scores, &indices, settings, &mut rng)
            })
            .collect();
        self.n_dims = positions[0].n_dims();
        Ok(())
    }

    fn predict(&self, positions: &[Position]) -> Result<Prediction, SurrogateError> {
        if self.trees.is_empty() {
            return Err(SurrogateError::NotFitted);
        }
        let queries = query_matrix(positions, self.n_dims)?;

        let (mean, std) = queries
            .par_iter()
            .map(|x| {
                let preds: Vec<f64> = self.trees.iter().map(|t| t.predict(x)).collect();
                spread(&preds)
            })
            .collect::<Vec<(f64, f64)>>()
            .into_iter()
            .unzip();

        Ok(Prediction { mean, std })
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Mean and population standard deviation; exactly zero when members agree.
fn spread(preds: &[f64]) -> (f64, f64) {
    let first = preds[0];
    if preds.iter().all(|&p| p == first) {
        return (first, 0.0);
    }
    let n = preds.len() as f64;
    let mean = preds.iter().sum::<f64>() / n;
    let var = preds.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surrogate::TreeRegressorKind;

    fn line(points: &[(usize, f64)]) -> (Vec<Position>, Vec<f64>) {
        points
            .iter()
            .map(|&(x, y)| (Position::new(vec![x]), y))
            .unzip()
    }

    fn params(kind: TreeRegressorKind, n_estimators: usize) -> TreeParams {
        TreeParams {
            n_estimators,
            ..TreeParams::defaults_for(kind)
        }
    }

    #[test]
    fn predict_before_fit_fails() {
        let forest = ForestRegressor::extra_trees(params(TreeRegressorKind::ExtraTree, 5), 1);
        assert_eq!(
            forest.predict(&[Position::new(vec![0])]).unwrap_err(),
            SurrogateError::NotFitted
        );
    }

    #[test]
    fn fit_on_empty_history_fails() {
        let mut forest = ForestRegressor::random_forest(params(TreeRegressorKind::RandomForest, 5), 1);
        assert_eq!(forest.fit(&[], &[]).unwrap_err(), SurrogateError::EmptyTrainingSet);
    }

    #[test]
    fn extra_trees_reproduce_training_points_with_zero_spread() {
        let (x, y) = line(&[(0, 0.0), (2, 1.0), (4, 0.25)]);
        let mut forest = ForestRegressor::extra_trees(params(TreeRegressorKind::ExtraTree, 50), 9);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.n_trees(), 50);

        let pred = forest.predict(&x).unwrap();
        assert_eq!(pred.mean, y);
        assert!(pred.std.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn extra_trees_are_uncertain_between_observations() {
        let (x, y) = line(&[(0, 0.0), (2, 1.0), (4, 0.25)]);
        let mut forest = ForestRegressor::extra_trees(params(TreeRegressorKind::ExtraTree, 100), 21);
        forest.fit(&x, &y).unwrap();

        let pred = forest
            .predict(&[Position::new(vec![1]), Position::new(vec![3])])
            .unwrap();
        assert!(pred.std.iter().all(|&s| s > 0.0));
        assert!(pred.mean[0] > 0.0 && pred.mean[0] < 1.0);
        assert!(pred.mean[1] > 0.25 && pred.mean[1] < 1.0);
    }

    #[test]
    fn random_forest_is_deterministic_per_seed() {
        let (x, y) = line(&[(0, 0.1), (1, 0.4), (3, 0.9), (5, 0.2), (6, 0.0)]);
        let query: Vec<Position> = (0..7).map(|i| Position::new(vec![i])).collect();

        let mut a = ForestRegressor::random_forest(params(TreeRegressorKind::RandomForest, 30), 5);
        let mut b = ForestRegressor::random_forest(params(TreeRegressorKind::RandomForest, 30), 5);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&query).unwrap(), b.predict(&query).unwrap());
    }

    #[test]
    fn refit_replaces_previous_state() {
        let (x, y) = line(&[(0, 0.0), (1, 1.0)]);
        let mut forest = ForestRegressor::random_forest(params(TreeRegressorKind::RandomForest, 10), 3);
        forest.fit(&x, &y).unwrap();

        let (x2, y2) = line(&[(0, 0.5), (1, 0.5), (2, 0.5)]);
        forest.fit(&x2, &y2).unwrap();
        let pred = forest.predict(&[Position::new(vec![2])]).unwrap();
        assert_eq!(pred.mean, vec![0.5]);
        assert_eq!(pred.std, vec![0.0]);
    }

    #[test]
    fn query_dimensionality_is_checked() {
        let (x, y) = line(&[(0, 0.0), (1, 1.0)]);
        let mut forest = ForestRegressor::extra_trees(params(TreeRegressorKind::ExtraTree, 4), 3);
        forest.fit(&x, &y).unwrap();
        assert!(matches!(
            forest.predict(&[Position::new(vec![0, 1])]),
            Err(SurrogateError::DimensionMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn spread_of_identical_members_is_exactly_zero() {
        assert_eq!(spread(&[0.1; 100]), (0.1, 0.0));
        let (mean, std) = spread(&[0.0, 1.0]);
        assert_eq!(mean, 0.5);
        assert_eq!(std, 0.5);
    }
}
