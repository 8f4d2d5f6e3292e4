//! Regression surrogates standing in for the expensive objective.
//!
//! A surrogate is anything implementing [`Surrogate`]: it is fitted on
//! the observed positions and their normalized scores, and predicts a
//! mean and a standard deviation for each candidate. Three tree-ensemble
//! adapters are provided and selected through [`TreeRegressorKind`].

mod boost;
mod forest;
mod tree;

pub use boost::GradientBoostingRegressor;
pub use forest::ForestRegressor;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use fo_types::{Position, SurrogateError};

/// Per-candidate predictive mean and standard deviation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// Contract a regressor must satisfy to guide the search.
///
/// Each `fit` replaces the previous state entirely; `predict` reads the
/// state of the latest successful `fit`.
pub trait Surrogate: Send {
    /// Train on `positions` and their normalized `scores`.
    fn fit(&mut self, positions: &[Position], scores: &[f64]) -> Result<(), SurrogateError>;

    /// Predict mean and standard deviation for every position.
    fn predict(&self, positions: &[Position]) -> Result<Prediction, SurrogateError>;

    /// Human-readable regressor name.
    fn name(&self) -> &str;
}

/// The regressor families available as surrogates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeRegressorKind {
    RandomForest,
    #[default]
    ExtraTree,
    GradientBoost,
}

impl TreeRegressorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RandomForest => "random_forest",
            Self::ExtraTree => "extra_tree",
            Self::GradientBoost => "gradient_boost",
        }
    }
}

impl fmt::Display for TreeRegressorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreeRegressorKind {
    type Err = SurrogateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random_forest" => Ok(Self::RandomForest),
            "extra_tree" => Ok(Self::ExtraTree),
            "gradient_boost" => Ok(Self::GradientBoost),
            other => Err(SurrogateError::UnknownRegressor {
                name: other.to_string(),
            }),
        }
    }
}

/// Typed regressor hyperparameters, parsed once from the raw mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Trees per ensemble (boosting stages per quantile model).
    pub n_estimators: usize,
    /// Maximum depth of each tree. `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split. `None` considers all of them.
    pub max_features: Option<usize>,
    /// Resample the training rows per tree (forests only).
    pub bootstrap: bool,
    /// Shrinkage applied to each boosting stage.
    pub learning_rate: f64,
}

impl TreeParams {
    pub fn defaults_for(kind: TreeRegressorKind) -> Self {
        Self {
            n_estimators: 100,
            max_depth: match kind {
                TreeRegressorKind::GradientBoost => Some(3),
                _ => None,
            },
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: kind == TreeRegressorKind::RandomForest,
            learning_rate: 0.1,
        }
    }

    /// Parse the raw hyperparameter mapping for `kind`.
    ///
    /// Keys the regressor does not understand and values of the wrong
    /// type are rejected rather than ignored.
    pub fn from_map(
        kind: TreeRegressorKind,
        map: &BTreeMap<String, Value>,
    ) -> Result<Self, SurrogateError> {
        let mut params = Self::defaults_for(kind);
        let is_forest = kind != TreeRegressorKind::GradientBoost;

        for (key, value) in map {
            match key.as_str() {
                "n_estimators" => params.n_estimators = count(key, value, 1)?,
                "max_depth" => params.max_depth = optional_count(key, value, 1)?,
                "min_samples_split" => params.min_samples_split = count(key, value, 2)?,
                "min_samples_leaf" => params.min_samples_leaf = count(key, value, 1)?,
                "max_features" => params.max_features = optional_count(key, value, 1)?,
                "bootstrap" if is_forest => {
                    params.bootstrap = value.as_bool().ok_or_else(|| invalid(key, "expected a boolean"))?
                }
                "learning_rate" if !is_forest => {
                    let rate = value
                        .as_f64()
                        .ok_or_else(|| invalid(key, "expected a number"))?;
                    if !(rate.is_finite() && rate > 0.0) {
                        return Err(invalid(key, "must be a positive finite number"));
                    }
                    params.learning_rate = rate;
                }
                _ => {
                    return Err(invalid(
                        key,
                        &format!("not a hyperparameter of {kind}"),
                    ))
                }
            }
        }

        Ok(params)
    }
}

fn invalid(parameter: &str, message: &str) -> SurrogateError {
    SurrogateError::InvalidHyperparameter {
        parameter: parameter.to_string(),
        message: message.to_string(),
    }
}

fn count(key: &str, value: &Value, min: u64) -> Result<usize, SurrogateError> {
    match value.as_u64() {
        Some(n) if n >= min => {
            usize::try_from(n).map_err(|_| invalid(key, "value does not fit in usize"))
        }
        Some(_) => Err(invalid(key, &format!("must be at least {min}"))),
        None => Err(invalid(key, "expected a non-negative integer")),
    }
}

fn optional_count(key: &str, value: &Value, min: u64) -> Result<Option<usize>, SurrogateError> {
    if value.is_null() {
        return Ok(None);
    }
    count(key, value, min).map(Some)
}

/// Construct the adapter for `kind`, seeded for reproducible fits.
pub fn build_surrogate(
    kind: TreeRegressorKind,
    params: TreeParams,
    seed: u64,
) -> Box<dyn Surrogate> {
    match kind {
        TreeRegressorKind::RandomForest => Box::new(ForestRegressor::random_forest(params, seed)),
        TreeRegressorKind::ExtraTree => Box::new(ForestRegressor::extra_trees(params, seed)),
        TreeRegressorKind::GradientBoost => Box::new(GradientBoostingRegressor::new(params, seed)),
    }
}

/// Validate a training set and lay it out as feature rows.
pub(crate) fn training_matrix(
    positions: &[Position],
    scores: &[f64],
) -> Result<Vec<Vec<f64>>, SurrogateError> {
    if positions.is_empty() {
        return Err(SurrogateError::EmptyTrainingSet);
    }
    if positions.len() != scores.len() {
        return Err(SurrogateError::LengthMismatch {
            positions: positions.len(),
            scores: scores.len(),
        });
    }
    if let Some((row, &value)) = scores.iter().enumerate().find(|(_, s)| !s.is_finite()) {
        return Err(SurrogateError::NonFiniteTarget { row, value });
    }
    let n_dims = positions[0].n_dims();
    positions
        .iter()
        .map(|p| {
            if p.n_dims() == n_dims {
                Ok(p.to_features())
            } else {
                Err(SurrogateError::DimensionMismatch {
                    expected: n_dims,
                    actual: p.n_dims(),
                })
            }
        })
        .collect()
}

/// Check query positions against the dimensionality seen during fit.
pub(crate) fn query_matrix(
    positions: &[Position],
    n_dims: usize,
) -> Result<Vec<Vec<f64>>, SurrogateError> {
    positions
        .iter()
        .map(|p| {
            if p.n_dims() == n_dims {
                Ok(p.to_features())
            } else {
                Err(SurrogateError::DimensionMismatch {
                    expected: n_dims,
                    actual: p.n_dims(),
                })
            }
        })
        .collect()
}
