//! Purged walk-forward fold construction.
//!
//! Each fold trains on everything up to `train_end`, skips `purge_bars`
//! windows to kill lookahead bleed, tests on the next span, then advances
//! the training boundary past an embargo gap. All divisions floor; uneven
//! remainders land in earlier folds.

use serde::{Deserialize, Serialize};

use crate::error::{AurumError, Result};

/// Fold boundaries as half-open window index ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardFold {
    pub fold: usize,
    pub train_start: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

/// Walk-forward parameters as carried on evaluation requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    pub folds: usize,
    #[serde(default)]
    pub purge_bars: usize,
    #[serde(default)]
    pub embargo_bars: usize,
    #[serde(default)]
    pub min_train_bars: Option<usize>,
    #[serde(default = "default_strict")]
    pub strict: bool,
}

fn default_strict() -> bool {
    true
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            folds: 4,
            purge_bars: 0,
            embargo_bars: 0,
            min_train_bars: None,
            strict: true,
        }
    }
}

pub fn build_walk_forward_folds(
    total_windows: usize,
    config: &WalkForwardConfig,
) -> Result<Vec<WalkForwardFold>> {
    if total_windows <= 1 {
        if config.strict {
            return Err(AurumError::InvalidArgument(
                "not enough windows for walk-forward evaluation".to_string(),
            ));
        }
        return Ok(Vec::new());
    }
    if config.folds == 0 {
        return Err(AurumError::InvalidArgument(
            "folds must be positive".to_string(),
        ));
    }

    let train_min = config
        .min_train_bars
        .filter(|bars| *bars > 0)
        .unwrap_or(total_windows / (config.folds + 1))
        .max(1);

    if train_min >= total_windows {
        if config.strict {
            return Err(AurumError::InvalidArgument(
                "insufficient windows for requested min_train_bars".to_string(),
            ));
        }
        return Ok(Vec::new());
    }
    let available = total_windows - train_min;
    let test_span = (available / config.folds).max(1);

    let mut result = Vec::new();
    let mut train_end = train_min;
    for fold in 1..=config.folds {
        let test_start = train_end + config.purge_bars;
        let test_end = (test_start + test_span).min(total_windows);
        if test_start >= test_end {
            break;
        }
        result.push(WalkForwardFold {
            fold,
            train_start: 0,
            train_end,
            test_start,
            test_end,
        });
        train_end = (test_end + config.embargo_bars).min(total_windows);
        if train_end >= total_windows {
            break;
        }
    }

    if config.strict && result.len() < config.folds {
        return Err(AurumError::FoldFailure(format!(
            "constructed {} of {} requested walk-forward folds",
            result.len(),
            config.folds
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(
        folds: usize,
        purge: usize,
        embargo: usize,
        min_train: Option<usize>,
        strict: bool,
    ) -> WalkForwardConfig {
        WalkForwardConfig {
            folds,
            purge_bars: purge,
            embargo_bars: embargo,
            min_train_bars: min_train,
            strict,
        }
    }

    #[test]
    fn folds_are_ordered_and_gapped() {
        let folds = build_walk_forward_folds(220, &config(3, 1, 1, Some(60), true)).unwrap();
        assert_eq!(folds.len(), 3);
        for (idx, fold) in folds.iter().enumerate() {
            assert_eq!(fold.fold, idx + 1);
            assert_eq!(fold.train_start, 0);
            // purge gap between train end and test start
            assert_eq!(fold.test_start, fold.train_end + 1);
            assert!(fold.test_start < fold.test_end);
            assert!(fold.test_end <= 220);
        }
        // embargo advances the next training boundary past the test block
        assert_eq!(folds[1].train_end, folds[0].test_end + 1);
        // train_min 60, available 160, span 53
        assert_eq!(folds[0].train_end, 60);
        assert_eq!(folds[0].test_start, 61);
        assert_eq!(folds[0].test_end, 114);
    }

    #[test]
    fn default_train_min_is_total_over_folds_plus_one() {
        let folds = build_walk_forward_folds(100, &config(4, 0, 0, None, true)).unwrap();
        assert_eq!(folds[0].train_end, 20);
        assert_eq!(folds.len(), 4);
    }

    #[test]
    fn single_window_fails_strict_but_not_lenient() {
        assert!(matches!(
            build_walk_forward_folds(1, &config(3, 0, 0, None, true)),
            Err(AurumError::InvalidArgument(_))
        ));
        assert!(build_walk_forward_folds(1, &config(3, 0, 0, None, false))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn zero_folds_is_always_an_error() {
        assert!(matches!(
            build_walk_forward_folds(50, &config(0, 0, 0, None, false)),
            Err(AurumError::InvalidArgument(_))
        ));
    }

    #[test]
    fn oversized_min_train_fails_strict() {
        assert!(matches!(
            build_walk_forward_folds(50, &config(3, 0, 0, Some(50), true)),
            Err(AurumError::InvalidArgument(_))
        ));
        assert!(build_walk_forward_folds(50, &config(3, 0, 0, Some(50), false))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn short_series_missing_folds_fails_strict_only() {
        // heavy purge eats the series before all folds fit
        let strict = build_walk_forward_folds(20, &config(5, 10, 0, Some(5), true));
        assert!(matches!(strict, Err(AurumError::FoldFailure(_))));
        let lenient = build_walk_forward_folds(20, &config(5, 10, 0, Some(5), false)).unwrap();
        assert!(lenient.len() < 5);
    }

    #[test]
    fn test_ranges_never_overlap_training_data() {
        let folds = build_walk_forward_folds(200, &config(4, 2, 3, None, true)).unwrap();
        for pair in folds.windows(2) {
            assert!(pair[1].train_end >= pair[0].test_end);
            assert!(pair[1].test_start > pair[0].test_end);
        }
        for fold in &folds {
            assert!(fold.test_start >= fold.train_end + 2);
        }
    }
}
