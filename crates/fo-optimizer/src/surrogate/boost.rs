//! Quantile gradient boosting.
//!
//! Three boosted models are trained on the 16th, 50th and 84th
//! percentiles. The median model supplies the mean and half the distance
//! between the outer models supplies the standard deviation, which for a
//! normal predictive distribution is one sigma.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use fo_types::{Position, SurrogateError};

use super::tree::{RegressionTree, SplitRule, TreeSettings};
use super::{query_matrix, training_matrix, Prediction, Surrogate, TreeParams};

const QUANTILES: [f64; 3] = [0.16, 0.5, 0.84];

#[derive(Debug, Clone)]
struct QuantileBooster {
    init: f64,
    learning_rate: f64,
    stages: Vec<RegressionTree>,
}

impl QuantileBooster {
    fn fit<R: Rng>(
        alpha: f64,
        features: &[Vec<f64>],
        targets: &[f64],
        params: &TreeParams,
        settings: &TreeSettings,
        rng: &mut R,
    ) -> Self {
        let n = targets.len();
        let init = quantile(targets, alpha);
        let mut fitted = vec![init; n];
        let all: Vec<usize> = (0..n).collect();
        let mut stages = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = targets.iter().zip(&fitted).map(|(y, f)| y - f).collect();
            // Negative gradient of the pinball loss.
            let gradient: Vec<f64> = residuals
                .iter()
                .map(|&r| if r > 0.0 { alpha } else { alpha - 1.0 })
                .collect();

            let mut tree = RegressionTree::fit(features, &gradient, &all, settings, rng);

            let leaves: Vec<usize> = features.iter().map(|x| tree.leaf_index(x)).collect();
            let mut distinct = leaves.clone();
            distinct.sort_unstable();
            distinct.dedup();
            for leaf in distinct {
                let in_leaf: Vec<f64> = leaves
                    .iter()
                    .zip(&residuals)
                    .filter(|(l, _)| **l == leaf)
                    .map(|(_, r)| *r)
                    .collect();
                tree.set_leaf_value(leaf, quantile(&in_leaf, alpha));
            }

            for (f, x) in fitted.iter_mut().zip(features) {
                *f += params.learning_rate * tree.predict(x);
            }
            stages.push(tree);
        }

        Self {
            init,
            learning_rate: params.learning_rate,
            stages,
        }
    }

    fn predict(&self, x: &[f64]) -> f64 {
        self.init
            + self
                .stages
                .iter()
                .map(|t| self.learning_rate * t.predict(x))
                .sum::<f64>()
    }
}

/// Gradient-boosted quantile regressor.
#[derive(Debug, Clone)]
pub struct GradientBoostingRegressor {
    params: TreeParams,
    settings: TreeSettings,
    rng: ChaCha8Rng,
    models: Vec<QuantileBooster>,
    n_dims: usize,
}

impl GradientBoostingRegressor {
    pub fn new(params: TreeParams, seed: u64) -> Self {
        let settings = TreeSettings::from_params(&params, SplitRule::Best);
        Self {
            params,
            settings,
            rng: ChaCha8Rng::seed_from_u64(seed),
            models: Vec::new(),
            n_dims: 0,
        }
    }
}

impl Surrogate for GradientBoostingRegressor {
    fn fit(&mut self, positions: &[Position], scores: &[f64]) -> Result<(), SurrogateError> {
        let features = training_matrix(positions, scores)?;
        let params = &self.params;
        let settings = &self.settings;
        let seeds: Vec<u64> = QUANTILES.iter().map(|_| self.rng.random()).collect();

        self.models = QUANTILES
            .par_iter()
            .zip(seeds)
            .map(|(&alpha, seed)| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                QuantileBooster::fit(alpha, &features, scores, params, settings, &mut rng)
            })
            .collect();
        self.n_dims = positions[0].n_dims();
        Ok(())
    }

    fn predict(&self, positions: &[Position]) -> Result<Prediction, SurrogateError> {
        let [low, mid, high] = self.models.as_slice() else {
            return Err(SurrogateError::NotFitted);
        };
        let queries = query_matrix(positions, self.n_dims)?;

        let (mean, std) = queries
            .par_iter()
            .map(|x| {
                let (lo, hi) = (low.predict(x), high.predict(x));
                let std = if lo == hi { 0.0 } else { (hi - lo).abs() / 2.0 };
                (mid.predict(x), std)
            })
            .collect::<Vec<(f64, f64)>>()
            .into_iter()
            .unzip();

        Ok(Prediction { mean, std })
    }

    fn name(&self) -> &str {
        "gradient_boost"
    }
}

/// Linearly interpolated quantile of `values` (which must be non-empty).
fn quantile(values: &[f64], alpha: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = alpha * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
