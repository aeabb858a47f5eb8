pub mod indicators;
pub mod pipeline;

pub use pipeline::{
    build_feature_snapshot, resolve_signal_conflicts, vectorize, window_observation,
    FeatureSnapshot, IndicatorSpec, TechnicalConfig, AUX_FEATURE_KEYS, BASE_FEATURE_KEYS,
};
