//! Observation history recorded by an optimization run.

use serde::{Deserialize, Serialize};

use crate::errors::FoResult;
use crate::position::Position;

/// A scored evaluation of the objective at one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub position: Position,
    pub score: f64,
}

impl Observation {
    pub fn new(position: Position, score: f64) -> Self {
        Self { position, score }
    }
}

/// Append-only sequence of observations.
///
/// Later entries never invalidate earlier ones; the same position may
/// appear more than once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    observations: Vec<Observation>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Copy every observation of `other` onto the end of this history.
    pub fn extend_from(&mut self, other: &History) {
        self.observations.extend(other.observations.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn positions(&self) -> Vec<Position> {
        self.observations.iter().map(|o| o.position.clone()).collect()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.score).collect()
    }

    /// Highest scoring observation; the earliest one wins ties.
    pub fn best(&self) -> Option<&Observation> {
        let mut best: Option<&Observation> = None;
        for obs in &self.observations {
            match best {
                Some(current) if obs.score <= current.score => {}
                _ => best = Some(obs),
            }
        }
        best
    }

    pub fn contains(&self, position: &Position) -> bool {
        self.observations.iter().any(|o| &o.position == position)
    }

    pub fn to_json(&self) -> FoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> FoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl FromIterator<Observation> for History {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self {
            observations: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}
