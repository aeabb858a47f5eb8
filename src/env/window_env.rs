//! Continuous target-position environment with trading cost accounting.

use serde::{Deserialize, Serialize};

use crate::domain::{FeatureRow, TradingPair};
use crate::env::Environment;
use crate::error::{AurumError, Result};
use crate::features::{window_observation, TechnicalConfig};

/// Trading friction parameters, shared by training and evaluation.
/// Fee and slippage are in basis points of traded notional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    #[serde(default = "default_leverage")]
    pub leverage: f64,
    #[serde(default = "default_taker_fee_bps")]
    pub taker_fee_bps: f64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: f64,
    #[serde(default = "default_funding_weight")]
    pub funding_weight: f64,
    #[serde(default)]
    pub drawdown_penalty: f64,
}

fn default_leverage() -> f64 {
    1.0
}

fn default_taker_fee_bps() -> f64 {
    4.0
}

fn default_slippage_bps() -> f64 {
    1.0
}

fn default_funding_weight() -> f64 {
    1.0
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            leverage: default_leverage(),
            taker_fee_bps: default_taker_fee_bps(),
            slippage_bps: default_slippage_bps(),
            funding_weight: default_funding_weight(),
            drawdown_penalty: 0.0,
        }
    }
}

impl CostConfig {
    /// Combined taker fee and slippage as a rate per unit of turnover.
    pub fn turnover_rate(&self) -> f64 {
        (self.taker_fee_bps + self.slippage_bps) / 10_000.0
    }
}

/// Per-step accounting detail alongside the reward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub equity: f64,
    pub peak: f64,
    pub drawdown: f64,
    pub gross_pnl: f64,
    pub transaction_cost: f64,
    pub funding_cost: f64,
    pub step_pnl: f64,
}

#[derive(Debug, Clone)]
pub struct EnvStep {
    pub observation: Vec<f64>,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// Episodic environment over windowed market data.
///
/// Each step holds a target position through the move from the current
/// window's close to the next window's close, paying turnover, slippage and
/// funding on the way. Equity starts at 1.0 and rewards are penalized by
/// open drawdown when configured.
pub struct MarketWindowEnv {
    observations: Vec<Vec<f64>>,
    closes: Vec<f64>,
    funding_rates: Vec<f64>,
    cost: CostConfig,
    index: usize,
    prev_position: f64,
    equity: f64,
    peak: f64,
}

impl MarketWindowEnv {
    pub fn new(
        pair: TradingPair,
        windows: &[Vec<FeatureRow>],
        technical: &TechnicalConfig,
        feature_keys: &[String],
        cost: CostConfig,
    ) -> Result<Self> {
        if windows.is_empty() {
            return Err(AurumError::InvalidArgument(
                "windows must not be empty".to_string(),
            ));
        }
        let mut observations = Vec::with_capacity(windows.len());
        let mut closes = Vec::with_capacity(windows.len());
        let mut funding_rates = Vec::with_capacity(windows.len());
        for window in windows {
            observations.push(window_observation(pair, window, technical, feature_keys));
            let last = window.last().ok_or_else(|| {
                AurumError::InvalidArgument("windows must not contain empty windows".to_string())
            })?;
            closes.push(last.close);
            funding_rates.push(last.funding_rate);
        }
        Ok(Self {
            observations,
            closes,
            funding_rates,
            cost,
            index: 0,
            prev_position: 0.0,
            equity: 1.0,
            peak: 1.0,
        })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn current_position(&self) -> f64 {
        self.prev_position
    }

    pub(crate) fn current_index(&self) -> usize {
        self.index
    }
}

impl Environment for MarketWindowEnv {
    fn reset(&mut self) -> Vec<f64> {
        self.index = 0;
        self.prev_position = 0.0;
        self.equity = 1.0;
        self.peak = 1.0;
        self.observations[0].clone()
    }

    fn step(&mut self, action: f64) -> EnvStep {
        let position = action.clamp(-1.0, 1.0);
        let current = self.index;

        // Last window has no successor: report terminal, leave state alone
        if current + 1 >= self.observations.len() {
            return EnvStep {
                observation: self.observations[current].clone(),
                reward: 0.0,
                terminated: true,
                truncated: false,
                info: StepInfo {
                    equity: self.equity,
                    peak: self.peak,
                    drawdown: (self.peak - self.equity).max(0.0),
                    ..StepInfo::default()
                },
            };
        }

        let close = self.closes[current];
        let next_close = self.closes[current + 1];
        let pct_move = if close > 0.0 {
            (next_close - close) / close
        } else {
            0.0
        };

        let gross_pnl = position * pct_move * self.cost.leverage;
        let turnover = (position - self.prev_position).abs();
        let transaction_cost = turnover * self.cost.turnover_rate();
        let funding_cost =
            position * self.funding_rates[current] * self.cost.funding_weight * self.cost.leverage;
        let step_pnl = gross_pnl - transaction_cost - funding_cost;

        self.equity += step_pnl;
        self.peak = self.peak.max(self.equity);
        let drawdown = (self.peak - self.equity).max(0.0);
        let reward = step_pnl - self.cost.drawdown_penalty * drawdown;

        self.prev_position = position;
        self.index += 1;

        EnvStep {
            observation: self.observations[self.index].clone(),
            reward,
            terminated: false,
            truncated: false,
            info: StepInfo {
                equity: self.equity,
                peak: self.peak,
                drawdown,
                gross_pnl,
                transaction_cost,
                funding_cost,
                step_pnl,
            },
        }
    }

    fn observation_len(&self) -> usize {
        self.observations[0].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn window(closes: &[f64], funding: f64) -> Vec<FeatureRow> {
        closes
            .iter()
            .enumerate()
            .map(|(idx, close)| FeatureRow {
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::minutes(idx as i64),
                open: *close,
                high: close + 0.5,
                low: close - 0.5,
                close: *close,
                volume: 1.0,
                funding_rate: funding,
            })
            .collect()
    }

    fn env_with_closes(last_closes: &[f64], cost: CostConfig) -> MarketWindowEnv {
        let windows: Vec<Vec<FeatureRow>> = last_closes
            .iter()
            .map(|close| window(&[close - 2.0, close - 1.0, *close], 0.0))
            .collect();
        let technical = TechnicalConfig::default();
        let keys = technical.canonical_keys();
        MarketWindowEnv::new(TradingPair::GoldUsdt, &windows, &technical, &keys, cost).unwrap()
    }

    #[test]
    fn empty_windows_are_rejected() {
        let technical = TechnicalConfig::default();
        let keys = technical.canonical_keys();
        let result = MarketWindowEnv::new(
            TradingPair::GoldUsdt,
            &[],
            &technical,
            &keys,
            CostConfig::default(),
        );
        assert!(matches!(result, Err(AurumError::InvalidArgument(_))));
    }

    #[test]
    fn long_position_earns_the_move_minus_costs() {
        let mut env = env_with_closes(&[100.0, 101.0, 102.0], CostConfig::default());
        env.reset();
        let step = env.step(1.0);
        // move = 1%, turnover 1.0 at 5 bps, no funding
        let expected = 0.01 - 5.0 / 10_000.0;
        assert!((step.reward - expected).abs() < 1e-12);
        assert!((step.info.equity - (1.0 + expected)).abs() < 1e-12);
        assert!(!step.terminated);
    }

    #[test]
    fn holding_a_position_pays_no_turnover_twice() {
        let mut env = env_with_closes(&[100.0, 100.0, 100.0], CostConfig::default());
        env.reset();
        let first = env.step(0.5);
        let second = env.step(0.5);
        assert!(first.info.transaction_cost > 0.0);
        assert_eq!(second.info.transaction_cost, 0.0);
    }

    #[test]
    fn terminal_step_is_inert() {
        let mut env = env_with_closes(&[100.0, 101.0], CostConfig::default());
        env.reset();
        env.step(1.0);
        let terminal = env.step(-1.0);
        assert!(terminal.terminated);
        assert_eq!(terminal.reward, 0.0);
        // a second terminal step must observe identical state
        let again = env.step(1.0);
        assert_eq!(again.info.equity, terminal.info.equity);
    }

    #[test]
    fn funding_cost_charges_longs_on_positive_rates() {
        let windows = vec![
            window(&[100.0], 0.001),
            window(&[100.0], 0.001),
        ];
        let technical = TechnicalConfig::default();
        let keys = technical.canonical_keys();
        let mut env = MarketWindowEnv::new(
            TradingPair::GoldUsdt,
            &windows,
            &technical,
            &keys,
            CostConfig {
                taker_fee_bps: 0.0,
                slippage_bps: 0.0,
                ..CostConfig::default()
            },
        )
        .unwrap();
        env.reset();
        let step = env.step(1.0);
        assert!((step.info.funding_cost - 0.001).abs() < 1e-12);
        assert!((step.reward + 0.001).abs() < 1e-12);
    }

    #[test]
    fn drawdown_penalty_reduces_reward_after_losses() {
        let cost = CostConfig {
            taker_fee_bps: 0.0,
            slippage_bps: 0.0,
            drawdown_penalty: 1.0,
            ..CostConfig::default()
        };
        let mut env = env_with_closes(&[100.0, 99.0, 98.0], cost);
        env.reset();
        let step = env.step(1.0);
        // losing long: step pnl -1%, drawdown 1%, penalty doubles the hit
        assert!((step.info.step_pnl + 0.01).abs() < 1e-12);
        assert!((step.reward + 0.02).abs() < 1e-12);
    }

    #[test]
    fn action_is_clamped_to_unit_interval() {
        let mut env = env_with_closes(&[100.0, 101.0], CostConfig::default());
        env.reset();
        let step = env.step(5.0);
        assert!((step.info.gross_pnl - 0.01).abs() < 1e-12);
    }

    #[test]
    fn observations_match_the_standalone_pipeline() {
        use crate::domain::MarketSnapshot;
        use crate::features::{build_feature_snapshot, vectorize};

        let closes: Vec<f64> = (0..30).map(|i| 2100.0 + i as f64 * 0.3).collect();
        let rows = window(&closes, 0.0002);
        let technical = TechnicalConfig::default();
        let keys = technical.canonical_keys();
        let windows = vec![rows.clone(), rows.clone()];
        let mut env = MarketWindowEnv::new(
            TradingPair::GoldUsdt,
            &windows,
            &technical,
            &keys,
            CostConfig::default(),
        )
        .unwrap();

        let observation = env.reset();
        let snapshot = build_feature_snapshot(
            &MarketSnapshot::from_rows(TradingPair::GoldUsdt, &rows),
            &[],
            &[],
            &[],
            &[],
            &technical,
        );
        let expected = vectorize(&snapshot.features, &keys);
        assert_eq!(observation.len(), expected.len());
        for (seen, reference) in observation.iter().zip(expected.iter()) {
            assert!((seen - reference).abs() <= 1e-4);
        }
    }

    #[test]
    fn zero_close_guards_the_move() {
        let windows = vec![window(&[0.0], 0.0), window(&[10.0], 0.0)];
        let technical = TechnicalConfig::default();
        let keys = technical.canonical_keys();
        let mut env = MarketWindowEnv::new(
            TradingPair::GoldUsdt,
            &windows,
            &technical,
            &keys,
            CostConfig::default(),
        )
        .unwrap();
        env.reset();
        let step = env.step(1.0);
        assert_eq!(step.info.gross_pnl, 0.0);
    }
}
