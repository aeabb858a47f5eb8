//! Discrete three-action variant of the window environment.

use serde::{Deserialize, Serialize};

use crate::domain::{FeatureRow, TradingPair};
use crate::env::{CostConfig, EnvStep, Environment, MarketWindowEnv};
use crate::error::Result;
use crate::features::{indicators, TechnicalConfig};

const RISK_LOOKBACK_RETURNS: usize = 20;

/// Target position restricted to short, flat, or long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscreteAction {
    Short,
    Flat,
    Long,
}

impl DiscreteAction {
    pub fn position(self) -> f64 {
        match self {
            DiscreteAction::Short => -1.0,
            DiscreteAction::Flat => 0.0,
            DiscreteAction::Long => 1.0,
        }
    }

    pub fn from_position(position: f64) -> Self {
        if position > 0.0 {
            DiscreteAction::Long
        } else if position < 0.0 {
            DiscreteAction::Short
        } else {
            DiscreteAction::Flat
        }
    }
}

/// Wraps the continuous accounting and adds two shaping penalties:
/// a volatility charge proportional to the held position and the recent
/// return stddev inside the acted-on window, and a turnover charge.
pub struct DiscreteWindowEnv {
    inner: MarketWindowEnv,
    window_risk: Vec<f64>,
    risk_lambda: f64,
    turnover_kappa: f64,
}

impl DiscreteWindowEnv {
    pub fn new(
        pair: TradingPair,
        windows: &[Vec<FeatureRow>],
        technical: &TechnicalConfig,
        feature_keys: &[String],
        cost: CostConfig,
        risk_lambda: f64,
        turnover_kappa: f64,
    ) -> Result<Self> {
        let inner = MarketWindowEnv::new(pair, windows, technical, feature_keys, cost)?;
        let window_risk = windows.iter().map(|window| window_return_risk(window)).collect();
        Ok(Self {
            inner,
            window_risk,
            risk_lambda,
            turnover_kappa,
        })
    }

    pub fn step_discrete(&mut self, action: DiscreteAction) -> EnvStep {
        self.step(action.position())
    }
}

fn window_return_risk(window: &[FeatureRow]) -> f64 {
    let closes: Vec<f64> = window.iter().map(|row| row.close).collect();
    let tail_start = closes.len().saturating_sub(RISK_LOOKBACK_RETURNS + 1);
    let tail = &closes[tail_start..];
    let returns: Vec<f64> = tail
        .windows(2)
        .map(|pair| if pair[0] != 0.0 { (pair[1] - pair[0]) / pair[0] } else { 0.0 })
        .collect();
    indicators::population_stddev(&returns)
}

impl Environment for DiscreteWindowEnv {
    fn reset(&mut self) -> Vec<f64> {
        self.inner.reset()
    }

    fn step(&mut self, action: f64) -> EnvStep {
        let position = DiscreteAction::from_position(action).position();
        let acted_index = self.inner.current_index();
        let turnover = (position - self.inner.current_position()).abs();
        let mut step = self.inner.step(position);
        if !step.terminated {
            let risk_penalty = self.risk_lambda * position.abs() * self.window_risk[acted_index];
            let turnover_penalty = self.turnover_kappa * turnover;
            step.reward -= risk_penalty + turnover_penalty;
        }
        step
    }

    fn observation_len(&self) -> usize {
        self.inner.observation_len()
    }
}
