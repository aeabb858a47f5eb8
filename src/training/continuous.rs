//! Continuous-learning update: emit the window's metrics, run the
//! promotion gate, and register the policy when it clears.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::policy::Policy;
use crate::model::registry::ModelRegistry;
use crate::training::promotion::{evaluate_promotion, EvaluationMetrics, PromotionCriteria};
use crate::training::trainer::{emit_training_metrics, TrainingMetrics};

/// Outcome of one scheduled learning update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningUpdateResult {
    pub status: String,
    pub promoted: bool,
    pub reasons: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Ties one evaluation window together: metrics are emitted for
/// collectors, the promotion gate decides, and a promoted policy is
/// registered under its version id so serving picks it up.
pub fn run_learning_update(
    registry: &ModelRegistry,
    version_id: &str,
    policy: Arc<dyn Policy>,
    metrics: &EvaluationMetrics,
    criteria: &PromotionCriteria,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> LearningUpdateResult {
    emit_training_metrics(&TrainingMetrics {
        win_rate: metrics.win_rate,
        net_pnl_after_fees: metrics.net_pnl_after_fees,
        max_drawdown: metrics.max_drawdown,
        step_count: metrics.trade_count,
        window_start,
        window_end,
    });

    let decision = evaluate_promotion(metrics, criteria);
    let status = if decision.promote {
        registry.insert(version_id, policy);
        "succeeded"
    } else {
        "failed"
    };
    info!(
        version_id,
        promoted = decision.promote,
        status,
        "learning update complete"
    );

    LearningUpdateResult {
        status: status.to_string(),
        promoted: decision.promote,
        reasons: decision.reasons,
        completed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::policy::LinearPolicy;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
        )
    }

    fn policy() -> Arc<dyn Policy> {
        Arc::new(LinearPolicy::zeros(3))
    }

    #[test]
    fn passing_metrics_register_the_policy() {
        let registry = ModelRegistry::new();
        let (start, end) = window();
        let metrics = EvaluationMetrics {
            win_rate: 0.62,
            net_pnl_after_fees: 14.0,
            max_drawdown: 0.08,
            trade_count: 40,
        };
        let result = run_learning_update(
            &registry,
            "v42",
            policy(),
            &metrics,
            &PromotionCriteria::default(),
            start,
            end,
        );
        assert!(result.promoted);
        assert_eq!(result.status, "succeeded");
        assert!(result.reasons.is_empty());
        assert!(registry.get("v42").is_some());
    }

    #[test]
    fn failing_metrics_leave_the_registry_untouched() {
        let registry = ModelRegistry::new();
        let (start, end) = window();
        let metrics = EvaluationMetrics {
            win_rate: 0.40,
            net_pnl_after_fees: -3.0,
            max_drawdown: 0.40,
            trade_count: 5,
        };
        let result = run_learning_update(
            &registry,
            "v43",
            policy(),
            &metrics,
            &PromotionCriteria::default(),
            start,
            end,
        );
        assert!(!result.promoted);
        assert_eq!(result.status, "failed");
        assert!(!result.reasons.is_empty());
        assert!(registry.is_empty());
    }
}
