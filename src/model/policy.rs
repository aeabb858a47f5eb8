//! Policy and trainer capability seams.
//!
//! `Policy` and `PolicyTrainer` are the narrow interfaces the rest of the
//! crate depends on. The built-in linear implementations are deliberately
//! small and CPU-only; a heavier learner plugs in behind the same traits.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::env::Environment;
use crate::error::Result;

/// Inference seam: maps an observation to a target position score.
pub trait Policy: Send + Sync {
    fn predict(&self, observation: &[f64]) -> f64;
}

/// Training seam: fits a policy against an environment.
pub trait PolicyTrainer: Send {
    /// Run `timesteps` optimization iterations. Repeated calls continue
    /// from the current best policy; the step counter never resets.
    fn learn(&mut self, env: &mut dyn Environment, timesteps: u64) -> Result<LinearPolicy>;
    fn steps_taken(&self) -> u64;
}

/// Linear scorer squashed through tanh, the serialized artifact format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPolicy {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LinearPolicy {
    pub fn zeros(observation_len: usize) -> Self {
        Self {
            weights: vec![0.0; observation_len],
            bias: 0.0,
        }
    }
}

impl Policy for LinearPolicy {
    fn predict(&self, observation: &[f64]) -> f64 {
        let dot: f64 = self
            .weights
            .iter()
            .zip(observation.iter())
            .map(|(w, x)| w * x)
            .sum();
        (dot + self.bias).tanh()
    }
}

/// Seeded random-search hill climber over mean episode reward.
///
/// Proposes a perturbed copy of the incumbent each iteration and keeps it
/// only on a strict improvement, with the perturbation scale decaying
/// toward a floor. Deterministic for a given seed and environment.
pub struct LinearPolicyTrainer {
    rng: StdRng,
    step_size: f64,
    step_decay: f64,
    min_step_size: f64,
    steps_taken: u64,
    best: Option<LinearPolicy>,
}

impl LinearPolicyTrainer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            step_size: 0.1,
            step_decay: 0.995,
            min_step_size: 1e-3,
            steps_taken: 0,
            best: None,
        }
    }

    fn episode_score(env: &mut dyn Environment, policy: &LinearPolicy) -> f64 {
        let mut observation = env.reset();
        let mut total = 0.0;
        let mut steps = 0usize;
        loop {
            let step = env.step(policy.predict(&observation));
            if step.terminated || step.truncated {
                break;
            }
            total += step.reward;
            steps += 1;
            observation = step.observation;
        }
        if steps == 0 {
            0.0
        } else {
            total / steps as f64
        }
    }

    fn perturb(&mut self, policy: &LinearPolicy) -> LinearPolicy {
        let mut candidate = policy.clone();
        for weight in candidate.weights.iter_mut() {
            *weight += self.step_size * (self.rng.gen::<f64>() * 2.0 - 1.0);
        }
        candidate.bias += self.step_size * (self.rng.gen::<f64>() * 2.0 - 1.0);
        candidate
    }
}

impl PolicyTrainer for LinearPolicyTrainer {
    fn learn(&mut self, env: &mut dyn Environment, timesteps: u64) -> Result<LinearPolicy> {
        let mut best = match self.best.take() {
            Some(policy) if policy.weights.len() == env.observation_len() => policy,
            _ => LinearPolicy::zeros(env.observation_len()),
        };
        // re-score the incumbent: fine-tuning may hand us a different env
        let mut best_score = Self::episode_score(env, &best);

        for _ in 0..timesteps {
            let candidate = self.perturb(&best);
            let score = Self::episode_score(env, &candidate);
            if score > best_score {
                best_score = score;
                best = candidate;
            }
            self.step_size = (self.step_size * self.step_decay).max(self.min_step_size);
            self.steps_taken += 1;
        }

        debug!(
            steps_taken = self.steps_taken,
            best_score, "hill climb segment finished"
        );
        self.best = Some(best.clone());
        Ok(best)
    }

    fn steps_taken(&self) -> u64 {
        self.steps_taken
    }
}

/// Which optional capabilities this build can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub policy_trainer: bool,
    pub backtest_runner: bool,
}

/// Probe the optional seams. The built-in trainer is always present; the
/// corroborating backtest runner is wired in by the caller.
pub fn capabilities(backtest_runner_available: bool) -> CapabilityReport {
    CapabilityReport {
        policy_trainer: true,
        backtest_runner: backtest_runner_available,
    }
}
