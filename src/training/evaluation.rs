//! Walk-forward evaluation: fold-wise policy replay, trade metrics,
//! aggregation, and the stable report contract dashboards consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::config::ServiceConfig;
use crate::dataset::{build_dataset, DatasetMetadata};
use crate::domain::{FeatureRow, TradeRecord, TradeSide, TradingPair};
use crate::env::CostConfig;
use crate::error::{AurumError, Result};
use crate::features::{window_observation, TechnicalConfig};
use crate::model::artifact::{decode_base64, fetch_artifact, policy_from_bytes};
use crate::model::policy::Policy;
use crate::model::registry::ModelRegistry;
use crate::training::promotion::{evaluate_promotion, EvaluationMetrics, PromotionCriteria};
use crate::training::walk_forward::{build_walk_forward_folds, WalkForwardConfig};

/// Where the policy artifact comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactSource {
    Base64 {
        payload: String,
    },
    Url {
        url: String,
        #[serde(default)]
        expected_checksum: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub pair: TradingPair,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    #[serde(default = "default_interval")]
    pub interval: String,
    pub dataset_features: Vec<FeatureRow>,
    pub artifact: Option<ArtifactSource>,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_stride")]
    pub stride: usize,
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,
    #[serde(default = "default_trade_size")]
    pub trade_size: f64,
    #[serde(default)]
    pub cost: CostConfig,
    #[serde(default)]
    pub technical: TechnicalConfig,
    #[serde(default)]
    pub walk_forward: WalkForwardConfig,
    #[serde(default)]
    pub criteria: PromotionCriteria,
    #[serde(default)]
    pub feature_schema_fingerprint: Option<String>,
}

fn default_interval() -> String {
    "5m".to_string()
}

fn default_window_size() -> usize {
    30
}

fn default_stride() -> usize {
    1
}

fn default_decision_threshold() -> f64 {
    0.35
}

fn default_trade_size() -> f64 {
    1.0
}

/// Corroborating statistics from an external high-fidelity simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestStats {
    pub net_pnl: f64,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
}

/// External backtest capability. Failures are fatal only under
/// `strict_backtest`; otherwise the fold-based metrics stand alone.
#[cfg_attr(test, automock)]
pub trait BacktestRunner: Send + Sync {
    fn run(&self, pair: TradingPair, bars: &[FeatureRow]) -> Result<BacktestStats>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldMetricsReport {
    pub fold: usize,
    pub test_start: usize,
    pub test_end: usize,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub win_rate: f64,
    pub net_pnl_after_fees: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub fold_count: usize,
    pub pass_rate: f64,
    pub win_rate: f64,
    pub net_pnl_after_fees: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
}

/// The stable external contract: per-fold breakdown, aggregate block,
/// dataset identity, and configuration echo for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub id: Uuid,
    pub pair: TradingPair,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub win_rate: f64,
    pub net_pnl_after_fees: f64,
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub status: String,
    pub dataset_checksum: String,
    pub fold_metrics: Vec<FoldMetricsReport>,
    pub aggregate: AggregateReport,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Trade-list metrics. Drawdown is the largest peak-to-trough drop of the
/// cumulative net-PnL curve, as a fraction of the peak; a curve that never
/// rises above zero has no meaningful peak and reports 0.
pub fn compute_trade_metrics(
    trades: &[TradeRecord],
    fee_rate: f64,
    drawdown_penalty: f64,
) -> EvaluationMetrics {
    let mut wins = 0usize;
    let mut cumulative = 0.0f64;
    let mut peak = 0.0f64;
    let mut max_drawdown = 0.0f64;
    let mut net_contributions = 0.0f64;

    for trade in trades {
        if trade.realized_pnl > 0.0 {
            wins += 1;
        }
        let notional = trade.price * trade.quantity;
        let contribution = trade.realized_pnl - notional * fee_rate;
        net_contributions += contribution;
        cumulative += contribution;
        if cumulative > peak {
            peak = cumulative;
        }
        if peak > 0.0 {
            let drawdown = (peak - cumulative) / peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }

    let win_rate = if trades.is_empty() {
        0.0
    } else {
        wins as f64 / trades.len() as f64
    };
    EvaluationMetrics {
        win_rate,
        net_pnl_after_fees: net_contributions - drawdown_penalty.max(0.0) * max_drawdown,
        max_drawdown,
        trade_count: trades.len(),
    }
}

fn replay_fold_trades(
    policy: &dyn Policy,
    observations: &[Vec<f64>],
    closes: &[f64],
    stamps: &[DateTime<Utc>],
    test_start: usize,
    test_end: usize,
    decision_threshold: f64,
    trade_size: f64,
    leverage: f64,
) -> Vec<TradeRecord> {
    let mut trades = Vec::new();
    for index in test_start..test_end {
        let score = policy.predict(&observations[index]);
        // the last test window has no exit price inside the fold
        if score.abs() < decision_threshold || index + 1 >= test_end {
            continue;
        }
        let side = if score > 0.0 {
            TradeSide::Long
        } else {
            TradeSide::Short
        };
        let direction = if score > 0.0 { 1.0 } else { -1.0 };
        let price = closes[index];
        let realized_pnl = direction * (closes[index + 1] - price) * trade_size * leverage;
        trades.push(TradeRecord {
            executed_at: stamps[index],
            side,
            quantity: trade_size,
            price,
            realized_pnl,
        });
    }
    trades
}

async fn resolve_policy(
    source: &ArtifactSource,
    registry: &ModelRegistry,
    fetch_timeout: Duration,
) -> Result<Arc<dyn Policy>> {
    let payload = match source {
        ArtifactSource::Base64 { payload } => decode_base64(payload)?,
        ArtifactSource::Url {
            url,
            expected_checksum,
        } => fetch_artifact(url, expected_checksum.as_deref(), fetch_timeout).await?,
    };
    registry.get_or_load(&payload.checksum, || {
        let policy = policy_from_bytes(&payload.data)?;
        Ok(Arc::new(policy) as Arc<dyn Policy>)
    })
}

/// Run a full fold-based evaluation of a trained policy artifact.
pub async fn run_evaluation(
    request: &EvaluationRequest,
    service: &ServiceConfig,
    registry: &ModelRegistry,
    backtest: Option<&dyn BacktestRunner>,
) -> Result<EvaluationReport> {
    if request.period_end <= request.period_start {
        return Err(AurumError::InvalidArgument(
            "period_end must be after period_start".to_string(),
        ));
    }
    if request.dataset_features.is_empty() {
        return Err(AurumError::InvalidArgument(
            "dataset_features are required for evaluation".to_string(),
        ));
    }
    if !request.trade_size.is_finite() || request.trade_size <= 0.0 {
        return Err(AurumError::InvalidArgument(format!(
            "trade_size must be a positive finite number, got {}",
            request.trade_size
        )));
    }
    let source = request.artifact.as_ref().ok_or_else(|| {
        AurumError::InvalidArgument("artifact payload is required for evaluation".to_string())
    })?;

    let expected_fingerprint = request.technical.schema_fingerprint();
    if service.enforce_schema_fingerprint {
        if let Some(declared) = &request.feature_schema_fingerprint {
            if declared != &expected_fingerprint {
                return Err(AurumError::Integrity(format!(
                    "feature schema fingerprint mismatch: declared {declared}, computed {expected_fingerprint}"
                )));
            }
        }
    }

    let fetch_timeout = Duration::from_millis(service.artifact_fetch_timeout_ms);
    let policy = resolve_policy(source, registry, fetch_timeout).await?;

    let dataset = build_dataset(
        &request.dataset_features,
        request.window_size,
        request.stride,
        DatasetMetadata {
            pair: request.pair,
            interval: request.interval.clone(),
            start_at: request.period_start,
            end_at: request.period_end,
            feature_schema_fingerprint: expected_fingerprint.clone(),
        },
    )?;
    if dataset.windows.is_empty() {
        return Err(AurumError::InvalidArgument(
            "no evaluation windows generated".to_string(),
        ));
    }

    let feature_keys = request.technical.canonical_keys();
    let mut observations = Vec::with_capacity(dataset.windows.len());
    let mut closes = Vec::with_capacity(dataset.windows.len());
    let mut stamps = Vec::with_capacity(dataset.windows.len());
    for window in &dataset.windows {
        observations.push(window_observation(
            request.pair,
            window,
            &request.technical,
            &feature_keys,
        ));
        let last = window.last().ok_or_else(|| {
            AurumError::InvalidArgument("evaluation windows must not be empty".to_string())
        })?;
        closes.push(last.close);
        stamps.push(last.timestamp);
    }

    let folds = build_walk_forward_folds(dataset.windows.len(), &request.walk_forward)?;
    let fee_rate = request.cost.taker_fee_bps / 10_000.0;

    let mut fold_reports = Vec::with_capacity(folds.len());
    let mut all_trades: Vec<TradeRecord> = Vec::new();
    for fold in &folds {
        let trades = replay_fold_trades(
            policy.as_ref(),
            &observations,
            &closes,
            &stamps,
            fold.test_start,
            fold.test_end,
            request.decision_threshold,
            request.trade_size,
            request.cost.leverage,
        );
        if request.walk_forward.strict && trades.is_empty() {
            return Err(AurumError::FoldFailure(format!(
                "fold {} produced zero trades",
                fold.fold
            )));
        }
        let metrics = compute_trade_metrics(&trades, fee_rate, request.cost.drawdown_penalty);
        let decision = evaluate_promotion(&metrics, &request.criteria);
        fold_reports.push(FoldMetricsReport {
            fold: fold.fold,
            test_start: fold.test_start,
            test_end: fold.test_end,
            start_at: stamps[fold.test_start],
            end_at: stamps[fold.test_end - 1],
            win_rate: metrics.win_rate,
            net_pnl_after_fees: metrics.net_pnl_after_fees,
            max_drawdown: metrics.max_drawdown,
            trade_count: metrics.trade_count,
            status: if decision.promote { "pass" } else { "fail" }.to_string(),
        });
        all_trades.extend(trades);
        info!(
            fold = fold.fold,
            trades = metrics.trade_count,
            net_pnl = metrics.net_pnl_after_fees,
            "fold evaluated"
        );
    }

    let total_trades: usize = fold_reports.iter().map(|fold| fold.trade_count).sum();
    let aggregate_win_rate = if total_trades > 0 {
        fold_reports
            .iter()
            .map(|fold| fold.win_rate * fold.trade_count as f64)
            .sum::<f64>()
            / total_trades as f64
    } else if fold_reports.is_empty() {
        0.0
    } else {
        fold_reports.iter().map(|fold| fold.win_rate).sum::<f64>() / fold_reports.len() as f64
    };
    let aggregate_net_pnl: f64 = fold_reports.iter().map(|fold| fold.net_pnl_after_fees).sum();
    let aggregate_drawdown = fold_reports
        .iter()
        .map(|fold| fold.max_drawdown)
        .fold(0.0f64, f64::max);
    let pass_rate = if fold_reports.is_empty() {
        0.0
    } else {
        fold_reports
            .iter()
            .filter(|fold| fold.status == "pass")
            .count() as f64
            / fold_reports.len() as f64
    };

    let aggregate_metrics = EvaluationMetrics {
        win_rate: aggregate_win_rate,
        net_pnl_after_fees: aggregate_net_pnl,
        max_drawdown: aggregate_drawdown,
        trade_count: total_trades,
    };
    let decision = evaluate_promotion(&aggregate_metrics, &request.criteria);

    let backtest_stats = match backtest {
        Some(runner) => match runner.run(request.pair, &request.dataset_features) {
            Ok(stats) => Some(stats),
            Err(error) => {
                if service.strict_backtest {
                    return Err(AurumError::capability(
                        "backtest_runner",
                        error.to_string(),
                    ));
                }
                warn!(%error, "corroborating backtest failed, continuing without it");
                None
            }
        },
        None => None,
    };

    let metadata = serde_json::json!({
        "interval": request.interval,
        "decision_threshold": request.decision_threshold,
        "trade_size": request.trade_size,
        "reward_config": request.cost,
        "walk_forward": request.walk_forward,
        "criteria": request.criteria,
        "feature_schema_fingerprint": expected_fingerprint,
        "promotion_reasons": decision.reasons,
        "backtest": backtest_stats,
        "single_trade_pnls": all_trades.iter().map(|t| t.realized_pnl).collect::<Vec<f64>>(),
    });

    Ok(EvaluationReport {
        id: Uuid::new_v4(),
        pair: request.pair,
        period_start: request.period_start,
        period_end: request.period_end,
        win_rate: aggregate_metrics.win_rate,
        net_pnl_after_fees: aggregate_metrics.net_pnl_after_fees,
        max_drawdown: aggregate_metrics.max_drawdown,
        trade_count: aggregate_metrics.trade_count,
        status: if decision.promote { "pass" } else { "fail" }.to_string(),
        dataset_checksum: dataset.version.checksum,
        fold_metrics: fold_reports,
        aggregate: AggregateReport {
            fold_count: folds.len(),
            pass_rate,
            win_rate: aggregate_metrics.win_rate,
            net_pnl_after_fees: aggregate_metrics.net_pnl_after_fees,
            max_drawdown: aggregate_metrics.max_drawdown,
            trade_count: aggregate_metrics.trade_count,
        },
        metadata,
        created_at: Utc::now(),
    })
}
