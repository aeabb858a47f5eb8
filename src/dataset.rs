//! Windowed dataset builder with content-addressed versioning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{FeatureRow, TradingPair};
use crate::error::{AurumError, Result};

/// Descriptive metadata hashed into the dataset checksum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub pair: TradingPair,
    pub interval: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub feature_schema_fingerprint: String,
}

/// Identity of one reproducible dataset build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub id: Uuid,
    pub pair: TradingPair,
    pub interval: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub checksum: String,
    pub feature_schema_fingerprint: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub window_size: usize,
    pub stride: usize,
    pub windows: Vec<Vec<FeatureRow>>,
    pub version: DatasetVersion,
}

/// Slice rows into overlapping windows. Series shorter than one window
/// produce an empty list, not an error.
pub fn build_feature_windows(
    rows: &[FeatureRow],
    window_size: usize,
    stride: usize,
) -> Result<Vec<Vec<FeatureRow>>> {
    if window_size == 0 {
        return Err(AurumError::InvalidArgument(
            "window_size must be positive".to_string(),
        ));
    }
    if stride == 0 {
        return Err(AurumError::InvalidArgument(
            "stride must be positive".to_string(),
        ));
    }
    if rows.len() < window_size {
        return Ok(Vec::new());
    }
    let mut windows = Vec::new();
    let mut start = 0;
    while start + window_size <= rows.len() {
        windows.push(rows[start..start + window_size].to_vec());
        start += stride;
    }
    Ok(windows)
}

fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    // serde_json maps sort keys, so re-encoding through Value is canonical
    Ok(serde_json::to_value(value)?.to_string())
}

/// Sha256 over canonical JSON of the metadata followed by the windows.
/// Same inputs always hash identically; any row, ordering, or metadata
/// change (including the pair) yields a different checksum.
pub fn compute_dataset_checksum(
    windows: &[Vec<FeatureRow>],
    metadata: &DatasetMetadata,
) -> Result<String> {
    let mut digest = Sha256::new();
    digest.update(canonical_json(metadata)?.as_bytes());
    digest.update(canonical_json(&windows)?.as_bytes());
    Ok(hex::encode(digest.finalize()))
}

pub fn build_dataset(
    rows: &[FeatureRow],
    window_size: usize,
    stride: usize,
    metadata: DatasetMetadata,
) -> Result<Dataset> {
    let windows = build_feature_windows(rows, window_size, stride)?;
    let checksum = compute_dataset_checksum(&windows, &metadata)?;
    let version = DatasetVersion {
        id: Uuid::new_v4(),
        pair: metadata.pair,
        interval: metadata.interval,
        start_at: metadata.start_at,
        end_at: metadata.end_at,
        checksum,
        feature_schema_fingerprint: metadata.feature_schema_fingerprint,
        created_at: Utc::now(),
    };
    Ok(Dataset {
        window_size,
        stride,
        windows,
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rows(count: usize) -> Vec<FeatureRow> {
        (0..count)
            .map(|idx| FeatureRow {
                timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::minutes(idx as i64),
                open: 100.0 + idx as f64,
                high: 101.0 + idx as f64,
                low: 99.0 + idx as f64,
                close: 100.5 + idx as f64,
                volume: 5.0,
                funding_rate: 0.0001,
            })
            .collect()
    }

    fn metadata(pair: TradingPair) -> DatasetMetadata {
        DatasetMetadata {
            pair,
            interval: "1m".to_string(),
            start_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            end_at: Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap(),
            feature_schema_fingerprint: "abc".to_string(),
        }
    }

    #[test]
    fn window_count_matches_slide_arithmetic() {
        // 10 rows, window 4, stride 2 -> starts at 0, 2, 4, 6
        let windows = build_feature_windows(&rows(10), 4, 2).unwrap();
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].len(), 4);
        assert_eq!(windows[3][0].close, 106.5);
    }

    #[test]
    fn short_series_yields_no_windows() {
        assert!(build_feature_windows(&rows(3), 4, 1).unwrap().is_empty());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(matches!(
            build_feature_windows(&rows(10), 0, 1),
            Err(AurumError::InvalidArgument(_))
        ));
        assert!(matches!(
            build_feature_windows(&rows(10), 4, 0),
            Err(AurumError::InvalidArgument(_))
        ));
    }

    #[test]
    fn checksum_is_deterministic() {
        let windows = build_feature_windows(&rows(10), 4, 1).unwrap();
        let a = compute_dataset_checksum(&windows, &metadata(TradingPair::GoldUsdt)).unwrap();
        let b = compute_dataset_checksum(&windows, &metadata(TradingPair::GoldUsdt)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_is_sensitive_to_rows_and_pair() {
        let windows = build_feature_windows(&rows(10), 4, 1).unwrap();
        let base = compute_dataset_checksum(&windows, &metadata(TradingPair::GoldUsdt)).unwrap();

        let mut shifted_rows = rows(10);
        shifted_rows[5].close += 0.01;
        let shifted = build_feature_windows(&shifted_rows, 4, 1).unwrap();
        assert_ne!(
            base,
            compute_dataset_checksum(&shifted, &metadata(TradingPair::GoldUsdt)).unwrap()
        );

        assert_ne!(
            base,
            compute_dataset_checksum(&windows, &metadata(TradingPair::XautUsdt)).unwrap()
        );
    }

    #[test]
    fn build_dataset_carries_version_identity() {
        let dataset = build_dataset(&rows(30), 10, 1, metadata(TradingPair::GoldUsdt)).unwrap();
        assert_eq!(dataset.windows.len(), 21);
        assert_eq!(dataset.version.pair, TradingPair::GoldUsdt);
        assert_eq!(dataset.version.feature_schema_fingerprint, "abc");
        assert_eq!(dataset.version.checksum.len(), 64);
    }
}
