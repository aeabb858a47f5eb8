//! Training driver: fit, mine hard examples, package the artifact.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{FeatureRow, TradingPair};
use crate::env::{CostConfig, Environment, MarketWindowEnv};
use crate::error::Result;
use crate::features::TechnicalConfig;
use crate::model::artifact::{encode_base64, policy_to_bytes, sha256_hex};
use crate::model::policy::{LinearPolicy, LinearPolicyTrainer, Policy, PolicyTrainer};

const ALGORITHM_LABEL: &str = "linear-hill-climb";

/// Summary statistics of the trained policy's replay over its own training
/// windows, emitted as a structured log record for downstream collectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub win_rate: f64,
    pub net_pnl_after_fees: f64,
    pub max_drawdown: f64,
    pub step_count: usize,
    pub window_start: chrono::DateTime<chrono::Utc>,
    pub window_end: chrono::DateTime<chrono::Utc>,
}

pub fn emit_training_metrics(metrics: &TrainingMetrics) {
    info!(
        win_rate = metrics.win_rate,
        net_pnl_after_fees = metrics.net_pnl_after_fees,
        max_drawdown = metrics.max_drawdown,
        step_count = metrics.step_count,
        window_start = %metrics.window_start,
        window_end = %metrics.window_end,
        "training_metrics"
    );
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRunConfig {
    pub pair: TradingPair,
    #[serde(default = "default_timesteps")]
    pub timesteps: u64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub cost: CostConfig,
    #[serde(default)]
    pub technical: TechnicalConfig,
    /// Hard-example mining passes after the main fit.
    #[serde(default = "default_feedback_rounds")]
    pub feedback_rounds: usize,
    /// Fraction of worst-reward windows selected each round.
    #[serde(default = "default_feedback_hard_ratio")]
    pub feedback_hard_ratio: f64,
    #[serde(default = "default_feedback_timesteps")]
    pub feedback_timesteps: u64,
}

fn default_timesteps() -> u64 {
    2_000
}

fn default_feedback_rounds() -> usize {
    1
}

fn default_feedback_hard_ratio() -> f64 {
    0.2
}

fn default_feedback_timesteps() -> u64 {
    500
}

/// Packaged training output ready for transport and later evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResult {
    pub artifact_base64: String,
    pub artifact_checksum: String,
    pub artifact_size_bytes: usize,
    pub algorithm_label: String,
    pub hyperparameter_summary: serde_json::Value,
}

fn replay_step_rewards(env: &mut MarketWindowEnv, policy: &LinearPolicy) -> Vec<f64> {
    let mut observation = env.reset();
    let mut rewards = Vec::new();
    loop {
        let step = env.step(policy.predict(&observation));
        if step.terminated || step.truncated {
            break;
        }
        rewards.push(step.reward);
        observation = step.observation;
    }
    rewards
}

/// Pick the worst-reward window indices plus their immediate successors,
/// deduplicated and in order. The successor keeps each hard transition
/// steppable when the subset becomes its own environment.
fn hard_example_indices(rewards: &[f64], ratio: f64, total_windows: usize) -> Vec<usize> {
    if rewards.is_empty() {
        return Vec::new();
    }
    let take = ((rewards.len() as f64 * ratio).floor() as usize).max(1);
    let mut ranked: Vec<usize> = (0..rewards.len()).collect();
    ranked.sort_by(|a, b| {
        rewards[*a]
            .partial_cmp(&rewards[*b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut selected: Vec<usize> = Vec::new();
    for idx in ranked.into_iter().take(take) {
        selected.push(idx);
        if idx + 1 < total_windows {
            selected.push(idx + 1);
        }
    }
    selected.sort_unstable();
    selected.dedup();
    selected
}

/// Fit a policy on the full window set, then re-train on the windows it
/// handles worst, and package the result as a checksummed artifact.
pub fn train_policy(
    windows: &[Vec<FeatureRow>],
    config: &TrainingRunConfig,
) -> Result<TrainingResult> {
    let feature_keys = config.technical.canonical_keys();
    let mut env = MarketWindowEnv::new(
        config.pair,
        windows,
        &config.technical,
        &feature_keys,
        config.cost.clone(),
    )?;

    let mut trainer = LinearPolicyTrainer::new(config.seed);
    let mut policy = trainer.learn(&mut env, config.timesteps)?;
    info!(
        pair = %config.pair,
        timesteps = config.timesteps,
        seed = config.seed,
        windows = windows.len(),
        "initial fit complete"
    );

    let mut rounds_applied = 0usize;
    for round in 1..=config.feedback_rounds {
        let rewards = replay_step_rewards(&mut env, &policy);
        let selected = hard_example_indices(&rewards, config.feedback_hard_ratio, windows.len());
        // a sub-episode needs at least one transition
        if selected.len() < 2 {
            break;
        }
        let subset: Vec<Vec<FeatureRow>> =
            selected.iter().map(|idx| windows[*idx].clone()).collect();
        let mut sub_env = MarketWindowEnv::new(
            config.pair,
            &subset,
            &config.technical,
            &feature_keys,
            config.cost.clone(),
        )?;
        policy = trainer.learn(&mut sub_env, config.feedback_timesteps)?;
        rounds_applied = round;
        info!(
            round,
            hard_windows = subset.len(),
            total_steps = trainer.steps_taken(),
            "hard-example round complete"
        );
    }

    let mut observation = env.reset();
    let mut positive_steps = 0usize;
    let mut step_count = 0usize;
    let mut max_drawdown = 0.0f64;
    let mut final_equity = 1.0f64;
    loop {
        let step = env.step(policy.predict(&observation));
        if step.terminated || step.truncated {
            break;
        }
        if step.reward > 0.0 {
            positive_steps += 1;
        }
        step_count += 1;
        max_drawdown = max_drawdown.max(step.info.drawdown);
        final_equity = step.info.equity;
        observation = step.observation;
    }
    let window_start = windows
        .first()
        .and_then(|window| window.first())
        .map(|row| row.timestamp)
        .unwrap_or_default();
    let window_end = windows
        .last()
        .and_then(|window| window.last())
        .map(|row| row.timestamp)
        .unwrap_or_default();
    emit_training_metrics(&TrainingMetrics {
        win_rate: if step_count > 0 {
            positive_steps as f64 / step_count as f64
        } else {
            0.0
        },
        net_pnl_after_fees: final_equity - 1.0,
        max_drawdown,
        step_count,
        window_start,
        window_end,
    });

    let bytes = policy_to_bytes(&policy)?;
    let checksum = sha256_hex(&bytes);
    let summary = serde_json::json!({
        "algorithm": ALGORITHM_LABEL,
        "timesteps": config.timesteps,
        "seed": config.seed,
        "feedback_rounds_requested": config.feedback_rounds,
        "feedback_rounds_applied": rounds_applied,
        "feedback_hard_ratio": config.feedback_hard_ratio,
        "feedback_timesteps": config.feedback_timesteps,
        "optimizer_steps": trainer.steps_taken(),
        "observation_len": feature_keys.len(),
    });
    info!(checksum = %checksum, size = bytes.len(), "artifact packaged");

    Ok(TrainingResult {
        artifact_base64: encode_base64(&bytes),
        artifact_checksum: checksum,
        artifact_size_bytes: bytes.len(),
        algorithm_label: ALGORITHM_LABEL.to_string(),
        hyperparameter_summary: summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::build_feature_windows;
    use chrono::{TimeZone, Utc};

    fn trending_rows(count: usize) -> Vec<FeatureRow> {
        (0..count)
            .map(|idx| {
                let close = 2100.0 + idx as f64 * 0.12;
                FeatureRow {
                    timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
                        + chrono::Duration::minutes(idx as i64),
                    open: close - 0.05,
                    high: close + 0.4,
                    low: close - 0.4,
                    close,
                    volume: 25.0,
                    funding_rate: 0.0,
                }
            })
            .collect()
    }

    fn run_config(seed: u64) -> TrainingRunConfig {
        TrainingRunConfig {
            pair: TradingPair::GoldUsdt,
            timesteps: 30,
            seed,
            cost: CostConfig::default(),
            technical: TechnicalConfig::default(),
            feedback_rounds: 1,
            feedback_hard_ratio: 0.2,
            feedback_timesteps: 10,
        }
    }

    #[test]
    fn hard_indices_include_successors_and_dedup() {
        let rewards = vec![0.5, -0.9, 0.2, -0.8, 0.1];
        // ratio 0.4 of 5 -> 2 worst: indices 1 and 3, successors 2 and 4
        let selected = hard_example_indices(&rewards, 0.4, 6);
        assert_eq!(selected, vec![1, 2, 3, 4]);
    }

    #[test]
    fn hard_indices_always_take_at_least_one() {
        let rewards = vec![0.3, -0.1, 0.2];
        let selected = hard_example_indices(&rewards, 0.0, 4);
        assert_eq!(selected, vec![1, 2]);
    }

    #[test]
    fn last_window_has_no_successor() {
        let rewards = vec![0.1, -0.5];
        // worst is index 1; acting index 1 means windows 1 and 2 exist,
        // but with total_windows 2 there is no index 2
        let selected = hard_example_indices(&rewards, 0.5, 2);
        assert_eq!(selected, vec![1]);
    }

    #[test]
    fn training_is_deterministic_per_seed() {
        let windows = build_feature_windows(&trending_rows(80), 20, 1).unwrap();
        let first = train_policy(&windows, &run_config(17)).unwrap();
        let second = train_policy(&windows, &run_config(17)).unwrap();
        assert_eq!(first.artifact_checksum, second.artifact_checksum);
        assert_eq!(first.artifact_base64, second.artifact_base64);
    }

    #[test]
    fn different_seeds_usually_diverge() {
        let windows = build_feature_windows(&trending_rows(80), 20, 1).unwrap();
        let first = train_policy(&windows, &run_config(1)).unwrap();
        let second = train_policy(&windows, &run_config(2)).unwrap();
        assert_ne!(first.artifact_checksum, second.artifact_checksum);
    }

    #[test]
    fn result_carries_artifact_identity() {
        let windows = build_feature_windows(&trending_rows(60), 20, 1).unwrap();
        let result = train_policy(&windows, &run_config(5)).unwrap();
        assert_eq!(result.algorithm_label, ALGORITHM_LABEL);
        assert_eq!(result.artifact_checksum.len(), 64);
        assert!(result.artifact_size_bytes > 0);
        assert_eq!(
            result.hyperparameter_summary["optimizer_steps"]
                .as_u64()
                .unwrap(),
            40
        );
    }
}
