//! Optimizer configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use fo_types::{config_error, FoResult, History};

use crate::acquisition::DEFAULT_XI;
use crate::sampler::SamplingStrategy;
use crate::surrogate::{TreeParams, TreeRegressorKind};

pub const DEFAULT_MAX_SAMPLE_SIZE: usize = 10_000_000;
pub const DEFAULT_RANDOM_SAMPLES: usize = 1_000_000;
pub const DEFAULT_WARNINGS: usize = 100_000_000;

/// Settings for a forest-guided optimizer.
///
/// Handed to the optimizer by value and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Surrogate family.
    pub tree_regressor: TreeRegressorKind,
    /// Raw regressor hyperparameters (e.g. `{"n_estimators": 100}`).
    pub tree_para: BTreeMap<String, Value>,
    /// Exploration margin subtracted from every expected improvement.
    pub xi: f64,
    /// Largest working sample scored per step.
    pub max_sample_size: usize,
    /// Candidates drawn per strategy when the candidate set is too large.
    pub sampling: BTreeMap<SamplingStrategy, usize>,
    /// Candidate-set size above which a warning is logged.
    pub warnings: usize,
    /// Allow already evaluated positions to be proposed again.
    pub replacement: bool,
    /// Seed for every random draw; `None` seeds from entropy.
    pub random_state: Option<u64>,
    /// Observations of a previous run imported before the first step.
    pub warm_start_smbo: Option<History>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            tree_regressor: TreeRegressorKind::default(),
            tree_para: BTreeMap::from([("n_estimators".to_string(), Value::from(100))]),
            xi: DEFAULT_XI,
            max_sample_size: DEFAULT_MAX_SAMPLE_SIZE,
            sampling: BTreeMap::from([(SamplingStrategy::Random, DEFAULT_RANDOM_SAMPLES)]),
            warnings: DEFAULT_WARNINGS,
            replacement: true,
            random_state: None,
            warm_start_smbo: None,
        }
    }
}

impl ForestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree_regressor(mut self, kind: TreeRegressorKind) -> Self {
        self.tree_regressor = kind;
        self
    }

    pub fn with_tree_para(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tree_para.insert(key.into(), value.into());
        self
    }

    pub fn with_xi(mut self, xi: f64) -> Self {
        self.xi = xi;
        self
    }

    pub fn with_max_sample_size(mut self, n: usize) -> Self {
        self.max_sample_size = n;
        self
    }

    /// Replace the sampling strategies with a single one.
    pub fn with_sampling(mut self, strategy: SamplingStrategy, count: usize) -> Self {
        self.sampling = BTreeMap::from([(strategy, count)]);
        self
    }

    /// Add a strategy alongside the configured ones.
    pub fn add_sampling(mut self, strategy: SamplingStrategy, count: usize) -> Self {
        self.sampling.insert(strategy, count);
        self
    }

    pub fn with_warnings(mut self, threshold: usize) -> Self {
        self.warnings = threshold;
        self
    }

    pub fn with_replacement(mut self, replacement: bool) -> Self {
        self.replacement = replacement;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_warm_start(mut self, history: History) -> Self {
        self.warm_start_smbo = Some(history);
        self
    }

    /// Check scalar settings and parse the regressor hyperparameters.
    pub fn validate(&self) -> FoResult<TreeParams> {
        if !(self.xi.is_finite() && self.xi >= 0.0) {
            return Err(config_error!("xi must be a finite number >= 0, got {}", self.xi));
        }
        if self.max_sample_size == 0 {
            return Err(config_error!("max_sample_size must be positive"));
        }
        if self.warnings == 0 {
            return Err(config_error!("warnings must be positive"));
        }
        if self.sampling.is_empty() {
            return Err(config_error!("at least one sampling strategy is required"));
        }
        if let Some((strategy, _)) = self.sampling.iter().find(|(_, n)| **n == 0) {
            return Err(config_error!("sampling count for {} must be positive", strategy));
        }
        Ok(TreeParams::from_map(self.tree_regressor, &self.tree_para)?)
    }

    pub fn from_json(json: &str) -> FoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> FoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fo_types::{FoError, SurrogateError};

    #[test]
    fn defaults_match_documented_values() {
        let config = ForestConfig::default();
        assert_eq!(config.tree_regressor, TreeRegressorKind::ExtraTree);
        assert_eq!(config.tree_para["n_estimators"], Value::from(100));
        assert_eq!(config.xi, 0.03);
        assert_eq!(config.max_sample_size, 10_000_000);
        assert_eq!(config.sampling[&SamplingStrategy::Random], 1_000_000);
        assert_eq!(config.warnings, 100_000_000);
        assert!(config.replacement);
        assert!(config.warm_start_smbo.is_none());
        assert_eq!(config.validate().unwrap().n_estimators, 100);
    }

    #[test]
    fn invalid_scalars_are_config_errors() {
        let bad = [
            ForestConfig::new().with_xi(-0.1),
            ForestConfig::new().with_xi(f64::NAN),
            ForestConfig::new().with_max_sample_size(0),
            ForestConfig::new().with_warnings(0),
            ForestConfig::new().with_sampling(SamplingStrategy::Grid, 0),
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(FoError::Config(_))), "{config:?}");
        }
    }

    #[test]
    fn bad_hyperparameters_surface_as_surrogate_errors() {
        let config = ForestConfig::new().with_tree_para("n_estimators", -3);
        assert!(matches!(
            config.validate(),
            Err(FoError::Surrogate(SurrogateError::InvalidHyperparameter { .. }))
        ));
    }

    #[test]
    fn json_round_trip() {
        let config = ForestConfig::new()
            .with_tree_regressor(TreeRegressorKind::GradientBoost)
            .with_tree_para("learning_rate", 0.2)
            .add_sampling(SamplingStrategy::Grid, 500)
            .with_random_state(7);
        let restored = ForestConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            ForestConfig::from_json(r#"{"tree_regressor": "random_forest", "xi": 0.1}"#).unwrap();
        assert_eq!(config.tree_regressor, TreeRegressorKind::RandomForest);
        assert_eq!(config.xi, 0.1);
        assert_eq!(config.max_sample_size, DEFAULT_MAX_SAMPLE_SIZE);
    }

    #[test]
    fn unknown_regressor_in_json_fails() {
        let err = ForestConfig::from_json(r#"{"tree_regressor": "svm"}"#).unwrap_err();
        assert!(matches!(err, FoError::Serialization(_)));
    }
}
