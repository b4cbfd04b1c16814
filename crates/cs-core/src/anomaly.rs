//! Outlier detection over inter-event time gaps.
//!
//! Subsession splitting only needs two things from a model: learn what a
//! "normal" gap looks like from a sample, then flag the gaps that are not.
//! [`GapAnomalyDetector`] captures that contract; [`IsolationForest`] is the
//! implementation used by default.
//!
//! # Isolation forest
//!
//! Each tree recursively splits a random subsample at a uniformly drawn
//! threshold between the node's min and max, down to a height limit of
//! `ceil(log2(psi))`. Values that are easy to isolate end up with short
//! paths. The anomaly score is `2^(-E[h(x)] / c(psi))`, where `c(n)` is the
//! average path length of an unsuccessful binary-search-tree lookup over `n`
//! items; scores above 0.5 are outliers.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Scores above this are outliers.
const SCORE_THRESHOLD: f64 = 0.5;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Reasons a detector cannot be fitted on a sample.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnomalyError {
    /// Too few values to learn anything from.
    #[error("sample of {len} values is too small to fit")]
    TooFewSamples { len: usize },

    /// Every value in the sample is the same.
    #[error("sample has no spread: every value is {value}")]
    NoSpread { value: f64 },

    /// The sample contains NaN or an infinity.
    #[error("sample contains a non-finite value")]
    NonFinite,
}

/// A one-class model that flags unusual gap values.
pub trait GapAnomalyDetector {
    /// Learns the shape of normal gaps from `sample`.
    fn fit(&mut self, sample: &[f64]) -> Result<(), AnomalyError>;

    /// Returns one flag per value; `true` marks an outlier.
    ///
    /// An unfitted detector flags nothing.
    fn predict(&self, values: &[f64]) -> Vec<bool>;
}

/// Isolation forest parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestConfig {
    /// Number of trees. Default: 100.
    pub n_estimators: usize,
    /// Subsample size per tree, capped at the sample length. Default: 256.
    pub max_samples: usize,
    /// RNG seed. Default: 0.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn build(values: &[f64], depth: usize, height_limit: usize, rng: &mut StdRng) -> Self {
        if depth >= height_limit || values.len() <= 1 {
            return Self::Leaf { size: values.len() };
        }
        let (min, max) = min_max(values);
        if max <= min {
            return Self::Leaf { size: values.len() };
        }

        // threshold is in [min, max), so both sides are non-empty.
        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<f64>, Vec<f64>) = values.iter().copied().partition(|&v| v <= threshold);

        Self::Split {
            threshold,
            left: Box::new(Self::build(&left, depth + 1, height_limit, rng)),
            right: Box::new(Self::build(&right, depth + 1, height_limit, rng)),
        }
    }

    #[expect(clippy::cast_precision_loss, reason = "tree depths are tiny")]
    fn path_length(&self, value: f64) -> f64 {
        let mut node = self;
        let mut depth = 0usize;
        loop {
            match node {
                Self::Leaf { size } => return depth as f64 + average_path_length(*size),
                Self::Split {
                    threshold,
                    left,
                    right,
                } => {
                    node = if value <= *threshold { left } else { right };
                    depth += 1;
                }
            }
        }
    }
}

/// Ensemble of isolation trees over one-dimensional values.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    config: ForestConfig,
    trees: Vec<Node>,
    psi: usize,
}

impl IsolationForest {
    /// Creates an unfitted forest.
    pub const fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            psi: 0,
        }
    }

    /// Returns the anomaly score of `value` in `[0, 1]`, or `None` before fitting.
    pub fn score(&self, value: f64) -> Option<f64> {
        if self.trees.is_empty() {
            return None;
        }
        #[expect(clippy::cast_precision_loss, reason = "tree count is small")]
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| tree.path_length(value))
            .sum::<f64>()
            / self.trees.len() as f64;
        Some((-mean_depth / average_path_length(self.psi)).exp2())
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl GapAnomalyDetector for IsolationForest {
    fn fit(&mut self, sample: &[f64]) -> Result<(), AnomalyError> {
        self.trees.clear();
        self.psi = 0;

        if sample.iter().any(|v| !v.is_finite()) {
            return Err(AnomalyError::NonFinite);
        }
        if sample.len() < 2 {
            return Err(AnomalyError::TooFewSamples { len: sample.len() });
        }
        let (min, max) = min_max(sample);
        if max <= min {
            return Err(AnomalyError::NoSpread { value: min });
        }

        let psi = self.config.max_samples.clamp(2, sample.len());
        let height_limit = height_limit(psi);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        self.trees = (0..self.config.n_estimators.max(1))
            .map(|_| {
                let subsample: Vec<f64> = sample.choose_multiple(&mut rng, psi).copied().collect();
                Node::build(&subsample, 0, height_limit, &mut rng)
            })
            .collect();
        self.psi = psi;

        tracing::trace!(
            trees = self.trees.len(),
            psi,
            height_limit,
            "fitted isolation forest"
        );
        Ok(())
    }

    fn predict(&self, values: &[f64]) -> Vec<bool> {
        values
            .iter()
            .map(|&v| self.score(v).is_some_and(|score| score > SCORE_THRESHOLD))
            .collect()
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "log2 of a sample size is a small non-negative number"
)]
fn height_limit(psi: usize) -> usize {
    (psi as f64).log2().ceil() as usize
}

/// Average path length of an unsuccessful search in a BST of `n` items.
#[expect(clippy::cast_precision_loss, reason = "sample sizes fit in f64")]
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitted(sample: &[f64]) -> IsolationForest {
        let mut forest = IsolationForest::default();
        forest.fit(sample).unwrap();
        forest
    }

    #[test]
    fn flags_the_long_gap() {
        let gaps = [0.0, 1.0, 1.0, 1000.0, 1.0];
        let forest = fitted(&gaps);
        assert_eq!(forest.predict(&gaps[1..]), vec![false, false, true, false]);
    }

    #[test]
    fn scores_are_in_unit_interval() {
        let gaps = [0.0, 0.5, 0.7, 0.6, 0.4, 30.0, 0.5];
        let forest = fitted(&gaps);
        for gap in gaps {
            let score = forest.score(gap).unwrap();
            assert!((0.0..=1.0).contains(&score), "score {score} out of range");
        }
        assert!(forest.score(30.0).unwrap() > forest.score(0.5).unwrap());
    }

    #[test]
    fn fitting_is_deterministic_for_a_seed() {
        let gaps: Vec<f64> = (0..50).map(|i| f64::from(i % 7) * 0.1).chain([9.0]).collect();
        let a = fitted(&gaps);
        let b = fitted(&gaps);
        assert_eq!(a.predict(&gaps), b.predict(&gaps));
        assert_eq!(a.score(9.0), b.score(9.0));
    }

    #[test]
    fn rejects_degenerate_samples() {
        let mut forest = IsolationForest::default();
        assert_eq!(
            forest.fit(&[]),
            Err(AnomalyError::TooFewSamples { len: 0 })
        );
        assert_eq!(
            forest.fit(&[3.0]),
            Err(AnomalyError::TooFewSamples { len: 1 })
        );
        assert_eq!(
            forest.fit(&[2.0, 2.0, 2.0]),
            Err(AnomalyError::NoSpread { value: 2.0 })
        );
        assert_eq!(forest.fit(&[1.0, f64::NAN]), Err(AnomalyError::NonFinite));
    }

    #[test]
    fn unfitted_forest_flags_nothing() {
        let mut forest = IsolationForest::default();
        assert_eq!(forest.predict(&[1.0, 1e9]), vec![false, false]);

        // A failed refit clears the previous model.
        forest.fit(&[0.0, 1.0, 50.0]).unwrap();
        assert!(forest.fit(&[4.0, 4.0]).is_err());
        assert!(forest.score(50.0).is_none());
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "exact constants")]
    fn average_path_length_small_cases() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(5) - 2.327_020).abs() < 1e-5);
    }
}
