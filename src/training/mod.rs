pub mod continuous;
pub mod evaluation;
pub mod promotion;
pub mod trainer;
pub mod walk_forward;

pub use continuous::{run_learning_update, LearningUpdateResult};
pub use evaluation::{
    run_evaluation, ArtifactSource, BacktestRunner, BacktestStats, EvaluationReport,
    EvaluationRequest,
};
pub use promotion::{
    evaluate_promotion, evaluate_registry_promotion, should_promote, ChampionComparison,
    EvaluationMetrics, PromotionCriteria, PromotionDecision, RegistryThresholds,
};
pub use trainer::{
    emit_training_metrics, train_policy, TrainingMetrics, TrainingResult, TrainingRunConfig,
};
pub use walk_forward::{build_walk_forward_folds, WalkForwardConfig, WalkForwardFold};
