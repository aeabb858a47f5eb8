//! Feature snapshot builder.
//!
//! Turns a market snapshot plus auxiliary signal channels into a flat,
//! canonically ordered feature map with a stable schema fingerprint. The
//! same code path feeds both dataset construction and live environment
//! observations, so the two can never drift apart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{AuxiliarySignal, FeatureRow, MarketSnapshot, TradingPair};
use crate::features::indicators;

/// Market-derived features, always first in the canonical order.
pub const BASE_FEATURE_KEYS: [&str; 5] = [
    "last_price",
    "price_change",
    "volatility",
    "volume_avg",
    "spread",
];

/// Auxiliary-channel features, always last in the canonical order.
pub const AUX_FEATURE_KEYS: [&str; 8] = [
    "ideas_score",
    "signals_score",
    "news_score",
    "ocr_score",
    "news_confidence_avg",
    "ocr_confidence_avg",
    "ocr_text_length_avg",
    "aux_score",
];

const NEUTRAL_BAND: f64 = 0.1;

/// One configured indicator: a lowercase name and numeric parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl IndicatorSpec {
    pub fn new(name: &str, params: &[(&str, f64)]) -> Self {
        Self {
            name: name.to_string(),
            params: params
                .iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect(),
        }
    }
}

/// Technical indicator configuration; part of the schema fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_indicator_specs")]
    pub indicators: Vec<IndicatorSpec>,
}

fn default_enabled() -> bool {
    true
}

fn default_indicator_specs() -> Vec<IndicatorSpec> {
    vec![
        IndicatorSpec::new("sma", &[("period", 20.0)]),
        IndicatorSpec::new("ema", &[("period", 21.0)]),
        IndicatorSpec::new("rsi", &[("period", 14.0)]),
        IndicatorSpec::new("atr", &[("period", 14.0)]),
        IndicatorSpec::new(
            "macd",
            &[
                ("fastperiod", 12.0),
                ("slowperiod", 26.0),
                ("signalperiod", 9.0),
            ],
        ),
    ]
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            indicators: default_indicator_specs(),
        }
    }
}

impl TechnicalConfig {
    fn active_indicators(&self) -> Vec<IndicatorSpec> {
        if !self.enabled {
            return Vec::new();
        }
        self.indicators
            .iter()
            .filter_map(|spec| {
                let name = spec.name.trim().to_lowercase();
                if name.is_empty() {
                    return None;
                }
                let params = spec
                    .params
                    .iter()
                    .map(|(key, value)| (key.to_lowercase(), *value))
                    .collect();
                Some(IndicatorSpec { name, params })
            })
            .collect()
    }

    /// The full feature key order this configuration produces, independent
    /// of any market data: base keys, sorted indicator keys, aux keys.
    pub fn canonical_keys(&self) -> Vec<String> {
        let mut indicator_keys: Vec<String> = Vec::new();
        for spec in self.active_indicators() {
            indicator_keys.extend(indicator_key_names(&spec));
        }
        indicator_keys.sort();
        BASE_FEATURE_KEYS
            .iter()
            .map(|key| key.to_string())
            .chain(indicator_keys)
            .chain(AUX_FEATURE_KEYS.iter().map(|key| key.to_string()))
            .collect()
    }

    /// Sha256 over the sorted-key JSON of the config plus its key order.
    /// Any config change (or key reorder) produces a new fingerprint.
    pub fn schema_fingerprint(&self) -> String {
        let payload = serde_json::json!({
            "technical_config": self,
            "keys": self.canonical_keys(),
        });
        let encoded = payload.to_string();
        hex::encode(Sha256::digest(encoded.as_bytes()))
    }
}

fn period_param(params: &BTreeMap<String, f64>, key: &str, default: i64) -> usize {
    let raw = params.get(key).copied().unwrap_or(default as f64);
    (raw as i64).max(1) as usize
}

fn indicator_key_names(spec: &IndicatorSpec) -> Vec<String> {
    match spec.name.as_str() {
        "sma" => vec![format!("sma_{}", period_param(&spec.params, "period", 14))],
        "ema" => vec![format!("ema_{}", period_param(&spec.params, "period", 14))],
        "rsi" => vec![format!("rsi_{}", period_param(&spec.params, "period", 14))],
        "atr" => vec![format!("atr_{}", period_param(&spec.params, "period", 14))],
        "macd" => {
            let fast = period_param(&spec.params, "fastperiod", 12);
            let slow = period_param(&spec.params, "slowperiod", 26).max(fast + 1);
            let signal = period_param(&spec.params, "signalperiod", 9);
            vec![
                format!("macd_{fast}_{slow}_{signal}"),
                format!("macd_signal_{fast}_{slow}_{signal}"),
                format!("macd_hist_{fast}_{slow}_{signal}"),
            ]
        }
        "bbands" => {
            let period = period_param(&spec.params, "period", 14);
            vec![
                format!("bbands_upper_{period}"),
                format!("bbands_mid_{period}"),
                format!("bbands_lower_{period}"),
            ]
        }
        _ => Vec::new(),
    }
}

/// A flattened feature map plus its canonical ordering and fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub features: BTreeMap<String, f64>,
    pub feature_keys: Vec<String>,
    pub warmup: bool,
    pub schema_fingerprint: String,
}

/// Confidence-weighted net sentiment for one signal channel.
///
/// Positive and negative weighted scores are summed separately; when both
/// sides are present and the net falls inside the neutral band the channel
/// collapses to 0.0 instead of reporting a weak lean.
pub fn resolve_signal_conflicts(signals: &[AuxiliarySignal], neutral_band: f64) -> f64 {
    let weighted: Vec<f64> = signals
        .iter()
        .map(|signal| signal.score * signal.confidence.unwrap_or(1.0))
        .collect();
    let positive: f64 = weighted.iter().filter(|v| **v > 0.0).sum();
    let negative: f64 = weighted.iter().filter(|v| **v < 0.0).sum::<f64>().abs();
    let net = positive - negative;
    if positive > 0.0 && negative > 0.0 && net.abs() < neutral_band {
        return 0.0;
    }
    net
}

fn avg_confidence(signals: &[AuxiliarySignal]) -> f64 {
    let values: Vec<f64> = signals.iter().filter_map(|s| s.confidence).collect();
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn avg_text_length(signals: &[AuxiliarySignal]) -> f64 {
    let lengths: Vec<f64> = signals
        .iter()
        .filter_map(|signal| signal.metadata.get("text"))
        .filter_map(|value| value.as_str().map(|text| text.len() as f64))
        .collect();
    if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().sum::<f64>() / lengths.len() as f64
    }
}

fn market_features(market: &MarketSnapshot) -> BTreeMap<String, f64> {
    let closes: Vec<f64> = market.candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = market.candles.iter().map(|c| c.volume).collect();
    let volume_avg = if volumes.is_empty() {
        0.0
    } else {
        volumes.iter().sum::<f64>() / volumes.len() as f64
    };
    let last_price = market
        .last_price
        .unwrap_or_else(|| closes.last().copied().unwrap_or(0.0));
    let spread = market.spread.unwrap_or(0.0);

    let mut out = BTreeMap::new();
    out.insert("last_price".to_string(), last_price);
    out.insert("volume_avg".to_string(), volume_avg);
    out.insert("spread".to_string(), spread);
    if closes.len() < 2 {
        out.insert("price_change".to_string(), 0.0);
        out.insert("volatility".to_string(), 0.0);
        return out;
    }

    let first_price = closes[0];
    let price_change = if first_price != 0.0 {
        (last_price - first_price) / first_price
    } else {
        0.0
    };
    let returns: Vec<f64> = closes
        .windows(2)
        .map(|pair| if pair[0] != 0.0 { (pair[1] - pair[0]) / pair[0] } else { 0.0 })
        .collect();
    out.insert("price_change".to_string(), price_change);
    out.insert(
        "volatility".to_string(),
        indicators::population_stddev(&returns),
    );
    out
}

fn last_or_zero(series: &[f64]) -> f64 {
    series.last().copied().unwrap_or(0.0)
}

fn indicator_features(
    closes: &[f64],
    highs: &[f64],
    lows: &[f64],
    technical: &TechnicalConfig,
) -> (BTreeMap<String, f64>, bool) {
    let mut out = BTreeMap::new();
    let mut warmup = false;
    let mut record = |map: &mut BTreeMap<String, f64>, key: String, value: f64| {
        if value.is_finite() {
            map.insert(key, value);
        } else {
            map.insert(key, 0.0);
            warmup = true;
        }
    };
    for spec in technical.active_indicators() {
        let keys = indicator_key_names(&spec);
        match spec.name.as_str() {
            "sma" => {
                let period = period_param(&spec.params, "period", 14);
                record(&mut out, keys[0].clone(), last_or_zero(&indicators::sma(closes, period)));
            }
            "ema" => {
                let period = period_param(&spec.params, "period", 14);
                record(&mut out, keys[0].clone(), last_or_zero(&indicators::ema(closes, period)));
            }
            "rsi" => {
                let period = period_param(&spec.params, "period", 14);
                record(&mut out, keys[0].clone(), last_or_zero(&indicators::rsi(closes, period)));
            }
            "atr" => {
                let period = period_param(&spec.params, "period", 14);
                record(
                    &mut out,
                    keys[0].clone(),
                    last_or_zero(&indicators::atr(highs, lows, closes, period)),
                );
            }
            "macd" => {
                let fast = period_param(&spec.params, "fastperiod", 12);
                let slow = period_param(&spec.params, "slowperiod", 26).max(fast + 1);
                let signal = period_param(&spec.params, "signalperiod", 9);
                let (line, signal_line, hist) = indicators::macd(closes, fast, slow, signal);
                record(&mut out, keys[0].clone(), last_or_zero(&line));
                record(&mut out, keys[1].clone(), last_or_zero(&signal_line));
                record(&mut out, keys[2].clone(), last_or_zero(&hist));
            }
            "bbands" => {
                let period = period_param(&spec.params, "period", 14);
                let dev = spec
                    .params
                    .get("nbdevup")
                    .or_else(|| spec.params.get("dev"))
                    .copied()
                    .unwrap_or(2.0);
                let (upper, mid, lower) = indicators::bbands(closes, period, dev);
                record(&mut out, keys[0].clone(), last_or_zero(&upper));
                record(&mut out, keys[1].clone(), last_or_zero(&mid));
                record(&mut out, keys[2].clone(), last_or_zero(&lower));
            }
            _ => {}
        }
    }
    (out, warmup)
}

/// Build the full feature snapshot for one market window.
pub fn build_feature_snapshot(
    market: &MarketSnapshot,
    ideas: &[AuxiliarySignal],
    signals: &[AuxiliarySignal],
    news: &[AuxiliarySignal],
    ocr: &[AuxiliarySignal],
    technical: &TechnicalConfig,
) -> FeatureSnapshot {
    let closes: Vec<f64> = market.candles.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = market.candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = market.candles.iter().map(|c| c.low).collect();

    let mut features = market_features(market);
    let (indicator_values, warmup) = indicator_features(&closes, &highs, &lows, technical);
    features.extend(indicator_values);

    let ideas_score = resolve_signal_conflicts(ideas, NEUTRAL_BAND);
    let signals_score = resolve_signal_conflicts(signals, NEUTRAL_BAND);
    let news_score = resolve_signal_conflicts(news, NEUTRAL_BAND);
    let ocr_score = resolve_signal_conflicts(ocr, NEUTRAL_BAND);
    features.insert("ideas_score".to_string(), ideas_score);
    features.insert("signals_score".to_string(), signals_score);
    features.insert("news_score".to_string(), news_score);
    features.insert("ocr_score".to_string(), ocr_score);
    features.insert("news_confidence_avg".to_string(), avg_confidence(news));
    features.insert("ocr_confidence_avg".to_string(), avg_confidence(ocr));
    features.insert("ocr_text_length_avg".to_string(), avg_text_length(ocr));
    features.insert(
        "aux_score".to_string(),
        ideas_score + signals_score + news_score + ocr_score,
    );

    for value in features.values_mut() {
        if !value.is_finite() {
            *value = 0.0;
        }
    }

    FeatureSnapshot {
        features,
        feature_keys: technical.canonical_keys(),
        warmup,
        schema_fingerprint: technical.schema_fingerprint(),
    }
}

/// Project a feature map onto an explicit key order; missing keys become 0.0.
pub fn vectorize(features: &BTreeMap<String, f64>, feature_keys: &[String]) -> Vec<f64> {
    feature_keys
        .iter()
        .map(|key| features.get(key).copied().unwrap_or(0.0))
        .collect()
}

/// Observation vector for one window of bars. Both the training environment
/// and the evaluation replay use this, which keeps their features identical
/// by construction.
pub fn window_observation(
    pair: TradingPair,
    rows: &[FeatureRow],
    technical: &TechnicalConfig,
    feature_keys: &[String],
) -> Vec<f64> {
    let market = MarketSnapshot::from_rows(pair, rows);
    let snapshot = build_feature_snapshot(&market, &[], &[], &[], &[], technical);
    vectorize(&snapshot.features, feature_keys)
}
