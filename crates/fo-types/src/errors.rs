use thiserror::Error;

/// Main error type for the forest optimizer
#[derive(Error, Debug)]
pub enum FoError {
    #[error("Surrogate error: {0}")]
    Surrogate(#[from] SurrogateError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised by the regression surrogate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurrogateError {
    #[error("Unknown tree regressor: {name}")]
    UnknownRegressor { name: String },

    #[error("Invalid hyperparameter {parameter}: {message}")]
    InvalidHyperparameter { parameter: String, message: String },

    #[error("Cannot fit surrogate on an empty training set")]
    EmptyTrainingSet,

    #[error("Training set mismatch: {positions} positions but {scores} scores")]
    LengthMismatch { positions: usize, scores: usize },

    #[error("Dimension mismatch: expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Training targets must be finite, found {value} at row {row}")]
    NonFiniteTarget { row: usize, value: f64 },

    #[error("Surrogate has not been fitted")]
    NotFitted,
}

/// Errors raised while enumerating or sampling the search space
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Search space has no candidate positions")]
    EmptySpace,

    #[error("Search space is too large to index")]
    SpaceTooLarge,

    #[error("Unknown sampling strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("Position {position} is outside the search space")]
    PositionOutOfBounds { position: String },

    #[error("Step out of phase: expected {expected}, currently in {actual}")]
    OutOfPhase { expected: String, actual: String },

    #[error("Every position in the search space has already been evaluated")]
    Exhausted,
}

/// Result type alias for optimizer operations
pub type FoResult<T> = Result<T, FoError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::FoError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::FoError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::FoError::Config(format!($($arg)*))
    };
}
