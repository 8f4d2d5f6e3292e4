//! Surrogate-guided candidate selection, one step per call.
//!
//! A step has two phases. **Train** normalizes the history and refits the
//! surrogate (or notes a cold start when there is no history yet).
//! **Select** samples the candidate set, scores the working sample with
//! expected improvement and returns the best position. The caller
//! evaluates the objective there and records the result, which puts the
//! optimizer back into the Train phase.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

use fo_types::{
    internal_error, validation_error, FoResult, History, Observation, Position, SearchError,
};

use crate::acquisition::{argmax, ExpectedImprovement};
use crate::config::ForestConfig;
use crate::normalize::normalize;
use crate::sampler::CandidateSampler;
use crate::space::SearchSpace;
use crate::surrogate::{build_surrogate, Surrogate};
use crate::warm_start::{import_history, search_data_from_history, SearchDataRow};

/// Which half of a step the optimizer expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Select,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => f.write_str("train"),
            Self::Select => f.write_str("select"),
        }
    }
}

/// Result of the Train phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainOutcome {
    /// No history yet; the next selection is uniformly random.
    ColdStart,
    /// The surrogate was refitted on this many observations.
    Fitted { observations: usize },
}

/// Sequential model-based optimizer driven by a tree-ensemble surrogate.
pub struct ForestOptimizer {
    space: SearchSpace,
    config: ForestConfig,
    surrogate: Box<dyn Surrogate>,
    acquisition: ExpectedImprovement,
    sampler: CandidateSampler,
    history: History,
    rng: ChaCha8Rng,
    phase: Phase,
    last_outcome: Option<TrainOutcome>,
    steps: usize,
}

impl ForestOptimizer {
    /// Build an optimizer with the surrogate named by the configuration.
    ///
    /// Fails on malformed configuration, unknown hyperparameters, an
    /// empty search space, or warm-start data that does not fit the space.
    pub fn new(space: SearchSpace, config: ForestConfig) -> FoResult<Self> {
        let params = config.validate()?;
        let mut rng = seeded_rng(config.random_state);
        let surrogate = build_surrogate(config.tree_regressor, params, rng.random());
        Self::assemble(space, config, surrogate, rng)
    }

    /// Build an optimizer around a caller-supplied surrogate.
    pub fn with_surrogate(
        space: SearchSpace,
        config: ForestConfig,
        surrogate: Box<dyn Surrogate>,
    ) -> FoResult<Self> {
        config.validate()?;
        let rng = seeded_rng(config.random_state);
        Self::assemble(space, config, surrogate, rng)
    }

    fn assemble(
        space: SearchSpace,
        config: ForestConfig,
        surrogate: Box<dyn Surrogate>,
        rng: ChaCha8Rng,
    ) -> FoResult<Self> {
        let n_candidates = space.indexable_size()?;
        let sampler = CandidateSampler::new(config.max_sample_size, &config.sampling, config.warnings);
        let warm_start = config.warm_start_smbo.clone();

        let mut optimizer = Self {
            acquisition: ExpectedImprovement::new(config.xi),
            sampler,
            space,
            config,
            surrogate,
            history: History::new(),
            rng,
            phase: Phase::Train,
            last_outcome: None,
            steps: 0,
        };

        if let Some(prior) = warm_start {
            optimizer.warm_start(&prior)?;
        }

        info!(
            "Created forest optimizer: surrogate={}, dimensions={}, candidates={}, xi={}",
            optimizer.surrogate.name(),
            optimizer.space.n_dims(),
            n_candidates.map_or_else(|| "unindexed".to_string(), |n| n.to_string()),
            optimizer.config.xi
        );
        Ok(optimizer)
    }

    /// Copy a previous run's observations into this run's history.
    ///
    /// Only allowed before the first Train phase. The source is not
    /// modified.
    pub fn warm_start(&mut self, prior: &History) -> FoResult<usize> {
        if self.steps > 0 {
            return Err(validation_error!(
                "warm start must happen before the first training step"
            ));
        }
        for obs in prior {
            self.check_observation(&obs.position, obs.score)?;
        }
        Ok(import_history(&mut self.history, prior))
    }

    /// Run the Train and Select phases and return the next position.
    pub fn propose_next_position(&mut self) -> FoResult<Position> {
        self.train()?;
        self.select()
    }

    /// Refit the surrogate on the normalized history.
    ///
    /// An empty history is a cold start, not an error. A failing fit is
    /// returned to the caller untouched and leaves the optimizer in the
    /// Train phase.
    pub fn train(&mut self) -> FoResult<TrainOutcome> {
        let outcome = if self.history.is_empty() {
            debug!("No observations yet, falling back to a random position");
            TrainOutcome::ColdStart
        } else {
            let positions = self.history.positions();
            let scores = normalize(&self.history.scores(), &mut self.rng);
            self.surrogate.fit(&positions, &scores)?;
            debug!(
                "Fitted {} surrogate on {} observations",
                self.surrogate.name(),
                positions.len()
            );
            TrainOutcome::Fitted {
                observations: positions.len(),
            }
        };

        self.steps += 1;
        self.phase = Phase::Select;
        self.last_outcome = Some(outcome);
        Ok(outcome)
    }

    /// Pick the next position to evaluate. Requires a preceding `train`.
    pub fn select(&mut self) -> FoResult<Position> {
        if self.phase != Phase::Select {
            return Err(SearchError::OutOfPhase {
                expected: Phase::Select.to_string(),
                actual: self.phase.to_string(),
            }
            .into());
        }

        let position = match self.last_outcome {
            Some(TrainOutcome::Fitted { .. }) => self.select_by_acquisition()?,
            _ => self.random_position()?,
        };

        self.phase = Phase::Train;
        Ok(position)
    }

    /// Append an evaluated position to the history.
    pub fn record_observation(&mut self, position: Position, score: f64) -> FoResult<()> {
        self.check_observation(&position, score)?;
        debug!("Recorded score {} at {}", score, position);
        self.history.push(Observation::new(position, score));
        self.phase = Phase::Train;
        Ok(())
    }

    fn check_observation(&self, position: &Position, score: f64) -> FoResult<()> {
        if !self.space.contains(position) {
            return Err(SearchError::PositionOutOfBounds {
                position: position.to_string(),
            }
            .into());
        }
        if !score.is_finite() {
            return Err(validation_error!(
                "score at {} must be finite, got {}",
                position,
                score
            ));
        }
        Ok(())
    }

    fn select_by_acquisition(&mut self) -> FoResult<Position> {
        let mut working = match self.space.indexable_size()? {
            Some(n_candidates) => self
                .sampler
                .sample(n_candidates, &mut self.rng)
                .into_iter()
                .map(|flat| self.space.position_at(flat))
                .collect::<FoResult<Vec<Position>>>()?,
            None => self.sampler.sample_positions(&self.space, &mut self.rng),
        };

        if !self.config.replacement {
            let evaluated: HashSet<&Position> = self.history.iter().map(|o| &o.position).collect();
            working.retain(|p| !evaluated.contains(p));
            if working.is_empty() {
                debug!("Working sample fully evaluated, drawing an untried position");
                return self.random_position();
            }
        }

        let scores = self.acquisition.score(
            self.surrogate.as_ref(),
            &working,
            &self.history.scores(),
            &mut self.rng,
        )?;
        let best = argmax(&scores).ok_or_else(|| internal_error!("working sample is empty"))?;

        debug!(
            "Scored {} candidates, best expected improvement {} at {}",
            working.len(),
            scores[best],
            working[best]
        );
        Ok(working.swap_remove(best))
    }

    /// Uniform draw from the candidate set, skipping evaluated positions
    /// when replacement is disabled.
    fn random_position(&mut self) -> FoResult<Position> {
        let n_candidates = self.space.indexable_size()?;
        if self.config.replacement {
            return Ok(self.space.random_position(&mut self.rng));
        }

        let Some(n_candidates) = n_candidates else {
            // Cannot be exhausted; redraw until the position is untried.
            let evaluated: HashSet<&Position> = self.history.iter().map(|o| &o.position).collect();
            loop {
                let position = self.space.random_position(&mut self.rng);
                if !evaluated.contains(&position) {
                    return Ok(position);
                }
            }
        };

        let mut evaluated = self
            .history
            .iter()
            .map(|o| self.space.flat_index(&o.position))
            .collect::<FoResult<Vec<usize>>>()?;
        evaluated.sort_unstable();
        evaluated.dedup();
        if evaluated.len() >= n_candidates {
            return Err(SearchError::Exhausted.into());
        }

        // k-th untried index: shift past every evaluated index at or below it.
        let mut flat = self.rng.random_range(0..n_candidates - evaluated.len());
        for &taken in &evaluated {
            if taken <= flat {
                flat += 1;
            } else {
                break;
            }
        }
        self.space.position_at(flat)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// History expressed as named parameter values.
    pub fn search_data(&self) -> FoResult<Vec<SearchDataRow>> {
        search_data_from_history(&self.space, &self.history)
    }

    pub fn best(&self) -> Option<&Observation> {
        self.history.best()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    pub fn surrogate_name(&self) -> &str {
        self.surrogate.name()
    }
}

fn seeded_rng(random_state: Option<u64>) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(random_state.unwrap_or_else(rand::random))
}
