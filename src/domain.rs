//! Core domain types shared across the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gold perpetual pairs this service trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradingPair {
    #[serde(rename = "Gold-USDT")]
    GoldUsdt,
    #[serde(rename = "XAUTUSDT")]
    XautUsdt,
    #[serde(rename = "PAXGUSDT")]
    PaxgUsdt,
}

impl std::fmt::Display for TradingPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TradingPair::GoldUsdt => "Gold-USDT",
            TradingPair::XautUsdt => "XAUTUSDT",
            TradingPair::PaxgUsdt => "PAXGUSDT",
        };
        f.write_str(label)
    }
}

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCandle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A pair's candle history plus the latest quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub pair: TradingPair,
    /// Candles ordered ascending by timestamp
    pub candles: Vec<MarketCandle>,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub spread: Option<f64>,
}

impl MarketSnapshot {
    /// Build a snapshot from raw feature rows, pricing off the last close
    pub fn from_rows(pair: TradingPair, rows: &[FeatureRow]) -> Self {
        let candles: Vec<MarketCandle> = rows.iter().map(FeatureRow::to_candle).collect();
        let last_price = candles.last().map(|candle| candle.close);
        Self {
            pair,
            candles,
            last_price,
            spread: None,
        }
    }
}

/// One scored external input (news/ideas/OCR/social)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxiliarySignal {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    /// Directional score: positive bullish, negative bearish
    pub score: f64,
    /// Confidence in [0, 1]; weight 1.0 is assumed when absent
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Direction of a simulated fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
}

/// One simulated fill derived from a policy decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub executed_at: DateTime<Utc>,
    pub side: TradeSide,
    /// Always positive; direction lives in `side`
    pub quantity: f64,
    pub price: f64,
    pub realized_pnl: f64,
}

/// One raw input bar as supplied by the warehouse loader
///
/// Rows double as candle data and per-bar auxiliary values (funding rate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub funding_rate: f64,
}

impl FeatureRow {
    pub fn to_candle(&self) -> MarketCandle {
        MarketCandle {
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}
