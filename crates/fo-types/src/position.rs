//! Positions in a discretized search space.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered tuple of value indices, one per search dimension.
///
/// Each entry indexes into that dimension's discretized value list. A
/// position has no mutating API once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(Vec<usize>);

impl Position {
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn n_dims(&self) -> usize {
        self.0.len()
    }

    /// Feature vector handed to the regression surrogate.
    pub fn to_features(&self) -> Vec<f64> {
        self.0.iter().map(|&i| i as f64).collect()
    }
}

impl From<Vec<usize>> for Position {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{idx}")?;
        }
        write!(f, "]")
    }
}
