//! # fo-optimizer
//!
//! Sequential model-based optimization over discrete search spaces.
//!
//! A tree-ensemble surrogate is refitted on every observation so far,
//! candidate positions are sampled from the search space and scored by
//! expected improvement, and the best one is handed back to the caller
//! for evaluation. Each call performs exactly one train/select step so an
//! outer controller can decide when to stop.

mod acquisition;
mod config;
mod normalize;
mod optimizer;
mod run;
mod sampler;
mod space;
pub mod surrogate;
mod warm_start;

pub use acquisition::{argmax, ExpectedImprovement, DEFAULT_XI};
pub use config::{ForestConfig, DEFAULT_MAX_SAMPLE_SIZE, DEFAULT_RANDOM_SAMPLES, DEFAULT_WARNINGS};
pub use normalize::normalize;
pub use optimizer::{ForestOptimizer, Phase, TrainOutcome};
pub use run::{OptimizationState, OptimizationStatus, RunId, SearchRun};
pub use sampler::{CandidateSampler, SamplingStrategy};
pub use space::{Dimension, ParameterValue, SearchSpace};
pub use surrogate::{Prediction, Surrogate, TreeParams, TreeRegressorKind};
pub use warm_start::{
    history_from_search_data, import_history, search_data_from_history, SearchDataRow,
};

pub use fo_types::{
    FoError, FoResult, History, Observation, Position, SearchError, SurrogateError,
};
