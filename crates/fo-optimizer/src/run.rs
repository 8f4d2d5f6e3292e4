//! Run tracking and a simple propose/evaluate/record driver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use fo_types::{FoResult, Observation, Position};

use crate::optimizer::ForestOptimizer;

/// Unique optimization run identifier.
pub type RunId = Uuid;

/// Lifecycle state for an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Aggregate status of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationStatus {
    pub id: RunId,
    pub state: OptimizationState,
    pub iterations: usize,
    pub best: Option<Observation>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl OptimizationStatus {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: OptimizationState::Pending,
            iterations: 0,
            best: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = OptimizationState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = OptimizationState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = OptimizationState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Update the best observation if `observation` scores higher.
    pub fn update_best(&mut self, observation: &Observation) {
        let improved = match &self.best {
            None => true,
            Some(current) => observation.score > current.score,
        };
        if improved {
            self.best = Some(observation.clone());
        }
    }
}

impl Default for OptimizationStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives an optimizer for a fixed number of steps against an objective.
///
/// Stopping rules beyond the iteration budget belong to the caller, who
/// can equally drive [`ForestOptimizer`] step by step.
pub struct SearchRun<'a> {
    optimizer: &'a mut ForestOptimizer,
    status: OptimizationStatus,
}

impl<'a> SearchRun<'a> {
    pub fn new(optimizer: &'a mut ForestOptimizer) -> Self {
        let mut status = OptimizationStatus::new();
        if let Some(best) = optimizer.best() {
            status.update_best(best);
        }
        Self { optimizer, status }
    }

    pub fn status(&self) -> &OptimizationStatus {
        &self.status
    }

    /// Propose, evaluate and record `n_iter` times.
    ///
    /// The first error stops the run, marks it failed and is returned.
    pub fn execute<F>(&mut self, n_iter: usize, mut objective: F) -> FoResult<&OptimizationStatus>
    where
        F: FnMut(&Position) -> f64,
    {
        self.status.mark_running();
        info!("Starting run {} for {} iterations", self.status.id, n_iter);

        for _ in 0..n_iter {
            if let Err(e) = self.step(&mut objective) {
                error!("Run {} failed: {}", self.status.id, e);
                self.status.mark_failed(e.to_string());
                return Err(e);
            }
        }

        self.status.mark_completed();
        info!(
            "Run {} completed after {} iterations, best score {:?}",
            self.status.id,
            self.status.iterations,
            self.status.best.as_ref().map(|b| b.score)
        );
        Ok(&self.status)
    }

    fn step<F>(&mut self, objective: &mut F) -> FoResult<()>
    where
        F: FnMut(&Position) -> f64,
    {
        let position = self.optimizer.propose_next_position()?;
        let score = objective(&position);
        self.optimizer.record_observation(position.clone(), score)?;
        self.status.iterations += 1;
        self.status.update_best(&Observation::new(position, score));
        Ok(())
    }
}
