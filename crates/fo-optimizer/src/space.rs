//! Discrete search space definitions.
//!
//! Every dimension is a finite, ordered list of values. A [`Position`]
//! picks one index per dimension, and the full candidate set is the
//! cartesian product of all dimensions. The product is addressed through
//! a flat mixed-radix index (last dimension varies fastest) so that huge
//! spaces never need to be materialized. Products too large for a flat
//! index are drawn from one index per dimension instead.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use fo_types::{FoResult, Position, SearchError};

/// A concrete parameter value stored in a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl ParameterValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Json(v) => v.as_f64(),
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

/// A single named dimension with its discretized values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Human-readable parameter name (e.g. "max_depth").
    pub name: String,
    pub values: Vec<ParameterValue>,
}

/// The full search space: an ordered list of dimensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub dimensions: Vec<Dimension>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            dimensions: Vec::new(),
        }
    }

    pub fn add_values(mut self, name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            values,
        });
        self
    }

    /// Integer range [low, high] inclusive.
    pub fn add_int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        let values = (low..=high).map(ParameterValue::Int).collect();
        self.add_values(name, values)
    }

    /// `steps` evenly spaced floats covering [low, high].
    pub fn add_float(self, name: impl Into<String>, low: f64, high: f64, steps: usize) -> Self {
        let steps = steps.max(2);
        let values = (0..steps)
            .map(|i| {
                let t = i as f64 / (steps - 1) as f64;
                ParameterValue::Float(low + t * (high - low))
            })
            .collect();
        self.add_values(name, values)
    }

    /// `steps` floats spaced evenly in log-space between low and high.
    pub fn add_log_uniform(
        self,
        name: impl Into<String>,
        low: f64,
        high: f64,
        steps: usize,
    ) -> Self {
        let steps = steps.max(2);
        let log_low = low.ln();
        let log_high = high.ln();
        let values = (0..steps)
            .map(|i| {
                let t = i as f64 / (steps - 1) as f64;
                ParameterValue::Float((log_low + t * (log_high - log_low)).exp())
            })
            .collect();
        self.add_values(name, values)
    }

    pub fn add_choice(self, name: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        let values = values.into_iter().map(ParameterValue::Json).collect();
        self.add_values(name, values)
    }

    pub fn n_dims(&self) -> usize {
        self.dimensions.len()
    }

    /// Number of positions in the candidate set.
    ///
    /// Fails with `SpaceTooLarge` when the product does not fit in a flat
    /// index; see [`SearchSpace::indexable_size`] for a non-failing view.
    pub fn size(&self) -> FoResult<usize> {
        self.indexable_size()?
            .ok_or_else(|| SearchError::SpaceTooLarge.into())
    }

    /// Candidate-set size, or `None` when it overflows `usize`.
    ///
    /// Only an empty space (no dimensions, or a dimension without values)
    /// is an error.
    pub fn indexable_size(&self) -> FoResult<Option<usize>> {
        if self.dimensions.is_empty() || self.dimensions.iter().any(|d| d.values.is_empty()) {
            return Err(SearchError::EmptySpace.into());
        }
        Ok(self
            .dimensions
            .iter()
            .try_fold(1usize, |total, dim| total.checked_mul(dim.values.len())))
    }

    /// Uniform draw from the candidate set, one index per dimension.
    ///
    /// Works for spaces of any size. The space must not be empty.
    pub fn random_position<R: Rng>(&self, rng: &mut R) -> Position {
        Position::new(
            self.dimensions
                .iter()
                .map(|dim| rng.random_range(0..dim.values.len()))
                .collect(),
        )
    }

    /// Decode a flat index into a position.
    pub fn position_at(&self, flat: usize) -> FoResult<Position> {
        let size = self.size()?;
        if flat >= size {
            return Err(SearchError::PositionOutOfBounds {
                position: format!("#{flat}"),
            }
            .into());
        }
        let mut indices = vec![0; self.dimensions.len()];
        let mut rest = flat;
        for (slot, dim) in indices.iter_mut().zip(&self.dimensions).rev() {
            let n = dim.values.len();
            *slot = rest % n;
            rest /= n;
        }
        Ok(Position::new(indices))
    }

    /// Encode a position back into its flat index.
    pub fn flat_index(&self, position: &Position) -> FoResult<usize> {
        if !self.contains(position) {
            return Err(out_of_bounds(position));
        }
        let mut flat = 0usize;
        for (&idx, dim) in position.as_slice().iter().zip(&self.dimensions) {
            flat = flat * dim.values.len() + idx;
        }
        Ok(flat)
    }

    pub fn contains(&self, position: &Position) -> bool {
        position.n_dims() == self.dimensions.len()
            && position
                .as_slice()
                .iter()
                .zip(&self.dimensions)
                .all(|(&idx, dim)| idx < dim.values.len())
    }

    /// Resolve a position into named parameter values.
    pub fn values_at(&self, position: &Position) -> FoResult<HashMap<String, ParameterValue>> {
        if !self.contains(position) {
            return Err(out_of_bounds(position));
        }
        Ok(position
            .as_slice()
            .iter()
            .zip(&self.dimensions)
            .map(|(&idx, dim)| (dim.name.clone(), dim.values[idx].clone()))
            .collect())
    }

    /// Look up the position holding exactly these values, if any.
    pub fn position_of(&self, values: &HashMap<String, ParameterValue>) -> Option<Position> {
        let mut indices = Vec::with_capacity(self.dimensions.len());
        for dim in &self.dimensions {
            let value = values.get(&dim.name)?;
            indices.push(dim.values.iter().position(|v| v == value)?);
        }
        Some(Position::new(indices))
    }
}

fn out_of_bounds(position: &Position) -> fo_types::FoError {
    SearchError::PositionOutOfBounds {
        position: position.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fo_types::FoError;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sample_space() -> SearchSpace {
        SearchSpace::new()
            .add_int("depth", 1, 3) // 3 values
            .add_float("rate", 0.0, 1.0, 5) // 5 values
            .add_choice("kernel", vec![serde_json::json!("rbf"), serde_json::json!("linear")])
    }

    #[test]
    fn numeric_view_of_values() {
        assert_eq!(ParameterValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(ParameterValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(ParameterValue::Json(serde_json::json!("rbf")).as_f64(), None);
    }

    #[test]
    fn size_is_product_of_dimensions() {
        assert_eq!(sample_space().size().unwrap(), 30);
    }

    #[test]
    fn empty_space_is_rejected() {
        assert!(matches!(
            SearchSpace::new().size(),
            Err(FoError::Search(SearchError::EmptySpace))
        ));
        let space = SearchSpace::new().add_int("x", 5, 4);
        assert!(matches!(
            space.size(),
            Err(FoError::Search(SearchError::EmptySpace))
        ));
    }

    #[test]
    fn oversized_space_is_rejected() {
        let mut space = SearchSpace::new();
        for i in 0..8 {
            space = space.add_int(format!("x{i}"), 0, 1 << 12);
        }
        assert!(matches!(
            space.size(),
            Err(FoError::Search(SearchError::SpaceTooLarge))
        ));
    }

    #[test]
    fn huge_space_has_no_flat_index_but_draws_positions() {
        let mut space = SearchSpace::new();
        for i in 0..20 {
            space = space.add_int(format!("x{i}"), 0, 9);
        }
        assert_eq!(space.indexable_size().unwrap(), None);
        assert!(matches!(
            space.size(),
            Err(FoError::Search(SearchError::SpaceTooLarge))
        ));

        let mut rng = ChaCha8Rng::seed_from_u64(8);
        for _ in 0..50 {
            let pos = space.random_position(&mut rng);
            assert_eq!(pos.n_dims(), 20);
            assert!(space.contains(&pos));
        }
    }

    #[test]
    fn empty_dimension_wins_over_overflow() {
        let mut space = SearchSpace::new();
        for i in 0..8 {
            space = space.add_int(format!("x{i}"), 0, 1 << 12);
        }
        let space = space.add_values("none", Vec::new());
        assert!(matches!(
            space.indexable_size(),
            Err(FoError::Search(SearchError::EmptySpace))
        ));
    }

    #[test]
    fn flat_index_round_trips_every_position() {
        let space = sample_space();
        for flat in 0..space.size().unwrap() {
            let pos = space.position_at(flat).unwrap();
            assert!(space.contains(&pos));
            assert_eq!(space.flat_index(&pos).unwrap(), flat);
        }
    }

    #[test]
    fn last_dimension_varies_fastest() {
        let space = sample_space();
        assert_eq!(space.position_at(0).unwrap(), Position::new(vec![0, 0, 0]));
        assert_eq!(space.position_at(1).unwrap(), Position::new(vec![0, 0, 1]));
        assert_eq!(space.position_at(2).unwrap(), Position::new(vec![0, 1, 0]));
        assert!(space.position_at(30).is_err());
    }

    #[test]
    fn values_resolve_both_ways() {
        let space = sample_space();
        let pos = Position::new(vec![2, 4, 1]);
        let values = space.values_at(&pos).unwrap();
        assert_eq!(values["depth"], ParameterValue::Int(3));
        assert_eq!(values["rate"], ParameterValue::Float(1.0));
        assert_eq!(values["kernel"], ParameterValue::Json(serde_json::json!("linear")));
        assert_eq!(space.position_of(&values), Some(pos));
    }

    #[test]
    fn unknown_values_have_no_position() {
        let space = sample_space();
        let mut values = space.values_at(&Position::new(vec![0, 0, 0])).unwrap();
        values.insert("depth".into(), ParameterValue::Int(99));
        assert_eq!(space.position_of(&values), None);
    }

    #[test]
    fn wrong_arity_is_out_of_bounds() {
        let space = sample_space();
        assert!(!space.contains(&Position::new(vec![0, 0])));
        assert!(space.values_at(&Position::new(vec![0, 9, 0])).is_err());
    }

    #[test]
    fn log_uniform_spans_bounds() {
        let space = SearchSpace::new().add_log_uniform("lr", 1e-4, 1e-1, 4);
        let values = &space.dimensions[0].values;
        assert_eq!(values.len(), 4);
        match (&values[0], &values[3]) {
            (ParameterValue::Float(lo), ParameterValue::Float(hi)) => {
                assert!((lo - 1e-4).abs() < 1e-12);
                assert!((hi - 1e-1).abs() < 1e-9);
            }
            other => panic!("unexpected values: {other:?}"),
        }
    }
}
