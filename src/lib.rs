pub mod config;
pub mod dataset;
pub mod domain;
pub mod env;
pub mod error;
pub mod features;
pub mod model;
pub mod training;

pub use config::ServiceConfig;
pub use dataset::{build_dataset, build_feature_windows, compute_dataset_checksum, Dataset, DatasetVersion};
pub use domain::{
    AuxiliarySignal, FeatureRow, MarketCandle, MarketSnapshot, TradeRecord, TradeSide, TradingPair,
};
pub use env::{CostConfig, DiscreteAction, DiscreteWindowEnv, EnvStep, Environment, MarketWindowEnv};
pub use error::{AurumError, Result};
pub use features::{build_feature_snapshot, FeatureSnapshot, TechnicalConfig};
pub use model::{
    capabilities, CapabilityReport, LinearPolicy, LinearPolicyTrainer, ModelRegistry, Policy,
    PolicyTrainer,
};
pub use training::{
    evaluate_promotion, evaluate_registry_promotion, run_evaluation, run_learning_update,
    train_policy, ArtifactSource, BacktestRunner, BacktestStats, ChampionComparison,
    EvaluationMetrics, EvaluationReport, EvaluationRequest, LearningUpdateResult,
    PromotionCriteria, PromotionDecision, RegistryThresholds, TrainingResult, TrainingRunConfig,
    WalkForwardConfig, WalkForwardFold,
};
