//! Promotion gates with stable machine-readable reason codes.

use serde::{Deserialize, Serialize};

use crate::domain::TradeRecord;

/// Aggregate metrics a gate judges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub win_rate: f64,
    pub net_pnl_after_fees: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
}

/// Absolute pass/fail thresholds for a standalone evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromotionCriteria {
    #[serde(default = "default_min_win_rate")]
    pub min_win_rate: f64,
    #[serde(default)]
    pub min_net_pnl: f64,
    #[serde(default = "default_max_drawdown")]
    pub max_drawdown: f64,
    #[serde(default = "default_min_trade_count")]
    pub min_trade_count: usize,
}

fn default_min_win_rate() -> f64 {
    0.55
}

fn default_max_drawdown() -> f64 {
    0.25
}

fn default_min_trade_count() -> usize {
    20
}

impl Default for PromotionCriteria {
    fn default() -> Self {
        Self {
            min_win_rate: default_min_win_rate(),
            min_net_pnl: 0.0,
            max_drawdown: default_max_drawdown(),
            min_trade_count: default_min_trade_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub promote: bool,
    /// Empty when promoting; stable codes consumed by dashboards otherwise.
    pub reasons: Vec<String>,
}

pub fn evaluate_promotion(
    metrics: &EvaluationMetrics,
    criteria: &PromotionCriteria,
) -> PromotionDecision {
    let mut reasons = Vec::new();
    if metrics.win_rate < criteria.min_win_rate {
        reasons.push("win_rate_below_threshold".to_string());
    }
    if metrics.net_pnl_after_fees <= criteria.min_net_pnl {
        reasons.push("net_pnl_non_positive".to_string());
    }
    if metrics.max_drawdown > criteria.max_drawdown {
        reasons.push("drawdown_too_high".to_string());
    }
    if metrics.trade_count < criteria.min_trade_count {
        reasons.push("insufficient_trade_count".to_string());
    }
    PromotionDecision {
        promote: reasons.is_empty(),
        reasons,
    }
}

pub fn should_promote(metrics: &EvaluationMetrics, criteria: &PromotionCriteria) -> bool {
    evaluate_promotion(metrics, criteria).promote
}

/// Relative gates for replacing an incumbent champion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegistryThresholds {
    /// Required relative net-pnl improvement over the champion.
    #[serde(default = "default_min_improvement")]
    pub min_net_pnl_improvement: f64,
    /// Maximum tolerated relative drawdown worsening.
    #[serde(default = "default_max_dd_worsening")]
    pub max_drawdown_worsening: f64,
    #[serde(default = "default_registry_trades")]
    pub min_trade_count: usize,
    /// Largest share of total PnL one trade may carry.
    #[serde(default = "default_max_single_share")]
    pub max_single_trade_share: f64,
}

fn default_min_improvement() -> f64 {
    0.05
}

fn default_max_dd_worsening() -> f64 {
    0.10
}

fn default_registry_trades() -> usize {
    25
}

fn default_max_single_share() -> f64 {
    0.5
}

impl Default for RegistryThresholds {
    fn default() -> Self {
        Self {
            min_net_pnl_improvement: default_min_improvement(),
            max_drawdown_worsening: default_max_dd_worsening(),
            min_trade_count: default_registry_trades(),
            max_single_trade_share: default_max_single_share(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChampionComparison<'a> {
    pub champion: EvaluationMetrics,
    pub challenger: EvaluationMetrics,
    pub challenger_trades: &'a [TradeRecord],
}

/// Champion/challenger gate. The challenger must clearly beat the incumbent
/// on net pnl without materially worse drawdown, carry enough trades, and
/// not owe its edge to one lucky fill.
pub fn evaluate_registry_promotion(
    comparison: &ChampionComparison<'_>,
    thresholds: &RegistryThresholds,
) -> PromotionDecision {
    let mut reasons = Vec::new();
    let champ = comparison.champion;
    let chal = comparison.challenger;

    let improved = if champ.net_pnl_after_fees != 0.0 {
        let improvement =
            (chal.net_pnl_after_fees - champ.net_pnl_after_fees) / champ.net_pnl_after_fees.abs();
        improvement >= thresholds.min_net_pnl_improvement
    } else {
        chal.net_pnl_after_fees > 0.0
    };
    if !improved {
        reasons.push("net_pnl_improvement_below_gate".to_string());
    }

    let drawdown_ok = if champ.max_drawdown > 0.0 {
        let worsening = (chal.max_drawdown - champ.max_drawdown) / champ.max_drawdown;
        worsening <= thresholds.max_drawdown_worsening
    } else {
        chal.max_drawdown <= champ.max_drawdown
    };
    if !drawdown_ok {
        reasons.push("drawdown_worsened_beyond_gate".to_string());
    }

    if chal.trade_count < thresholds.min_trade_count {
        reasons.push("insufficient_trade_count".to_string());
    }

    let total_pnl: f64 = comparison
        .challenger_trades
        .iter()
        .map(|trade| trade.realized_pnl)
        .sum();
    if total_pnl != 0.0 {
        let largest = comparison
            .challenger_trades
            .iter()
            .map(|trade| trade.realized_pnl.abs())
            .fold(0.0f64, f64::max);
        if largest > thresholds.max_single_trade_share * total_pnl.abs() {
            reasons.push("single_trade_dominates_pnl".to_string());
        }
    }

    PromotionDecision {
        promote: reasons.is_empty(),
        reasons,
    }
}
