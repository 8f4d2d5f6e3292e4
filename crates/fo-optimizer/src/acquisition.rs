//! Expected Improvement acquisition.

use rand::Rng;

use fo_types::{Position, SurrogateError};

use crate::normalize::normalize;
use crate::surrogate::{Prediction, Surrogate};

/// Default exploration margin.
pub const DEFAULT_XI: f64 = 0.03;

/// Scores candidates by their expected gain over the best normalized score.
///
/// `EI = imp * Φ(z) + σ * φ(z)` with `imp = μ - best - ξ` and `z = imp / σ`.
/// Candidates predicted with `σ == 0` always score 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedImprovement {
    xi: f64,
}

impl ExpectedImprovement {
    pub fn new(xi: f64) -> Self {
        Self { xi }
    }

    pub fn xi(&self) -> f64 {
        self.xi
    }

    /// Acquisition value of a single candidate.
    pub fn value(&self, mean: f64, std: f64, best: f64) -> f64 {
        if std == 0.0 {
            return 0.0;
        }
        let improvement = mean - best - self.xi;
        let z = improvement / std;
        let exploit = improvement * norm_cdf(z);
        let explore = std * norm_pdf(z);
        exploit + explore
    }

    pub fn score_prediction(&self, prediction: &Prediction, best: f64) -> Vec<f64> {
        prediction
            .mean
            .iter()
            .zip(&prediction.std)
            .map(|(&mean, &std)| self.value(mean, std, best))
            .collect()
    }

    /// Score every position of the working sample against the history.
    ///
    /// The history is normalized afresh, so `best` is 1 unless every
    /// observed score is identical.
    pub fn score<R: Rng>(
        &self,
        surrogate: &dyn Surrogate,
        working_sample: &[Position],
        history_scores: &[f64],
        rng: &mut R,
    ) -> Result<Vec<f64>, SurrogateError> {
        if history_scores.is_empty() {
            return Err(SurrogateError::EmptyTrainingSet);
        }
        let prediction = surrogate.predict(working_sample)?;
        let best = normalize(history_scores, rng)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(self.score_prediction(&prediction, best))
    }
}

impl Default for ExpectedImprovement {
    fn default() -> Self {
        Self::new(DEFAULT_XI)
    }
}

/// Index of the highest score; the first one wins ties.
pub fn argmax(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if s <= b || s.is_nan() => {}
            None if s.is_nan() => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

// ---------- normal distribution helpers ----------

/// Standard normal cumulative distribution function via a Chebyshev `erfc`
/// fit (fractional error below 1.2e-7 over the whole line, tails included).
pub(crate) fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x * std::f64::consts::FRAC_1_SQRT_2)
}

/// Standard normal probability density function.
pub(crate) fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * (-z * z + poly).exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}
