// Driver configuration. Both structs load from JSON with every field optional.

use serde::{Deserialize, Serialize};

use crate::aceei::TieBreak;
use crate::error::SearchError;

/// Parameters of the gradient budget-perturbation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AceeiConfig {
    /// Price step δ applied to the clipped excess demand each iteration.
    pub step: f64,
    /// Half-width ε of every agent's budget window.
    pub epsilon: f64,
    pub tie_break: TieBreak,
    /// Iteration ceiling before giving up with the best state seen.
    pub max_iterations: u32,
    /// 0 sizes the pool to the available cores.
    pub worker_threads: usize,
}

impl Default for AceeiConfig {
    fn default() -> Self {
        Self {
            step: 0.5,
            epsilon: 0.5,
            tie_break: TieBreak::None,
            max_iterations: 10_000,
            worker_threads: 0,
        }
    }
}

impl AceeiConfig {
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, SearchError> {
        serde_json::from_str(json).map_err(|e| SearchError::InvalidParameter {
            name: "config",
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        positive("step", self.step)?;
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(SearchError::InvalidParameter {
                name: "epsilon",
                reason: format!("must be finite and non-negative, got {}", self.epsilon),
            });
        }
        if self.max_iterations == 0 {
            return Err(SearchError::InvalidParameter {
                name: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Parameters of the tabu price search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabuConfig {
    /// Initial prices are drawn uniformly from `[1, 1 + beta]`.
    pub beta: f64,
    /// Gradient step sizes δ.
    pub steps: Vec<f64>,
    /// `None` seeds from entropy.
    pub seed: Option<u64>,
    pub max_iterations: u32,
    pub worker_threads: usize,
    /// Cap on accepted individual-adjustment neighbors per iteration.
    pub max_adjustment_neighbors: usize,
    /// Price increase per individual-adjustment step.
    pub adjustment_increment: f64,
    pub adjustment_max_steps: u32,
}

impl Default for TabuConfig {
    fn default() -> Self {
        Self {
            beta: 4.0,
            steps: vec![0.1, 0.8],
            seed: None,
            max_iterations: 1_000,
            worker_threads: 0,
            max_adjustment_neighbors: 35,
            adjustment_increment: std::f64::consts::FRAC_1_SQRT_2,
            adjustment_max_steps: 10,
        }
    }
}

impl TabuConfig {
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = f64>) -> Self {
        self.steps = steps.into_iter().collect();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, SearchError> {
        serde_json::from_str(json).map_err(|e| SearchError::InvalidParameter {
            name: "config",
            reason: e.to_string(),
        })
    }

    /// Step sizes sorted ascending with exact duplicates removed.
    pub fn sorted_steps(&self) -> Vec<f64> {
        let mut steps = self.steps.clone();
        steps.sort_by(|a, b| a.total_cmp(b));
        steps.dedup();
        steps
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.steps.is_empty() {
            return Err(SearchError::EmptyStepSet);
        }
        for &step in &self.steps {
            positive("steps", step)?;
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(SearchError::InvalidParameter {
                name: "beta",
                reason: format!("must be finite and non-negative, got {}", self.beta),
            });
        }
        positive("adjustment_increment", self.adjustment_increment)?;
        if self.max_iterations == 0 {
            return Err(SearchError::InvalidParameter {
                name: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), SearchError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SearchError::InvalidParameter {
            name,
            reason: format!("must be finite and positive, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TabuConfig::from_json(r#"{"beta": 2.0, "seed": 7}"#).unwrap();
        assert_eq!(config.beta, 2.0);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.steps, vec![0.1, 0.8]);
        assert_eq!(config.max_adjustment_neighbors, 35);

        let config = AceeiConfig::from_json(r#"{"tie_break": "envy_free"}"#).unwrap();
        assert_eq!(config.tie_break, TieBreak::EnvyFree);
        assert_eq!(config.max_iterations, 10_000);
    }

    #[test]
    fn steps_are_sorted_and_deduplicated() {
        let config = TabuConfig::default().with_steps([0.8, 0.1, 0.8]);
        assert_eq!(config.sorted_steps(), vec![0.1, 0.8]);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(matches!(
            TabuConfig::default().with_steps(Vec::<f64>::new()).validate(),
            Err(SearchError::EmptyStepSet)
        ));
        assert!(matches!(
            TabuConfig::default().with_steps([0.1, -1.0]).validate(),
            Err(SearchError::InvalidParameter { name: "steps", .. })
        ));
        assert!(matches!(
            AceeiConfig::default().with_step(0.0).validate(),
            Err(SearchError::InvalidParameter { name: "step", .. })
        ));
        assert!(AceeiConfig::default().validate().is_ok());
    }
}
