// =============================================================================
// Correlation Gate
// =============================================================================
//
// Each basket asset carries a correlation weight. The sign of the weight and
// the signal side give the trend the asset *should* show:
//
//   expected = sign(weight) * side      (+ bullish, - bearish)
//
// Per-asset alignment: 1.0 match, 0.0 mismatch, 0.5 unavailable.
// Gate score = sum(alignment * |weight|) / sum(|weight|), aligned at >= 0.6.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GateKind, GateResult};
use crate::indicators::ema::calculate_ema;
use crate::market_data::PriceSeries;
use crate::types::{Side, Timeframe};

/// Bars an asset series must exceed before its trend is read.
const MIN_ASSET_BARS: usize = 20;
const ALIGNED_SCORE: f64 = 0.6;

/// Timeframe the basket trends are read from.
pub const ASSET_TIMEFRAME: Timeframe = Timeframe::H4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedAsset {
    /// Short name used in notes (e.g. "DXY").
    pub name: String,
    /// Provider symbol to fetch.
    pub symbol: String,
    /// Correlation weight in [-1, 1].
    pub weight: f64,
    #[serde(default)]
    pub description: String,
}

impl CorrelatedAsset {
    fn new(name: &str, symbol: &str, weight: f64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            weight,
            description: description.to_string(),
        }
    }

    /// Trend this asset should show for a trade on `side`.
    pub fn expected_trend(&self, side: Side) -> AssetTrend {
        if self.weight * side.sign() > 0.0 {
            AssetTrend::Bullish
        } else {
            AssetTrend::Bearish
        }
    }
}

/// Dollar, yields, equities, euro and oil basket.
pub fn default_basket() -> Vec<CorrelatedAsset> {
    vec![
        CorrelatedAsset::new("DXY", "USDX", -0.8, "US Dollar Index"),
        CorrelatedAsset::new("US10Y", "USTEC", -0.6, "10-Year Treasury Yield"),
        CorrelatedAsset::new("SPX", "SPX500", -0.4, "S&P 500 Index"),
        CorrelatedAsset::new("EURUSD", "EURUSD", 0.7, "Euro vs Dollar"),
        CorrelatedAsset::new("OIL", "XBRUSD", 0.3, "Crude Oil"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetTrend {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for AssetTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// EMA20/EMA50 trend of an asset series. `None` when the series is too short
/// to read (unavailable), `Neutral` when the EMAs disagree or are not yet
/// defined for two consecutive bars.
pub fn asset_trend(series: &PriceSeries) -> Option<AssetTrend> {
    if series.len() <= MIN_ASSET_BARS {
        return None;
    }
    let closes = series.closes();
    let ema20 = calculate_ema(&closes, 20);
    let ema50 = calculate_ema(&closes, 50);
    let (Some(f), Some(s)) = (last_two(&ema20), last_two(&ema50)) else {
        return Some(AssetTrend::Neutral);
    };

    let trend = if f.1 > s.1 && f.1 > f.0 && s.1 > s.0 {
        AssetTrend::Bullish
    } else if f.1 < s.1 && f.1 < f.0 && s.1 < s.0 {
        AssetTrend::Bearish
    } else {
        AssetTrend::Neutral
    };
    Some(trend)
}

fn last_two(values: &[f64]) -> Option<(f64, f64)> {
    match values {
        [.., prev, last] => Some((*prev, *last)),
        _ => None,
    }
}

// =============================================================================
// CorrelationGate
// =============================================================================

#[derive(Debug, Clone)]
pub struct CorrelationGate {
    assets: Vec<CorrelatedAsset>,
}

impl Default for CorrelationGate {
    fn default() -> Self {
        Self::new(default_basket())
    }
}

impl CorrelationGate {
    pub fn new(assets: Vec<CorrelatedAsset>) -> Self {
        Self { assets }
    }

    pub fn assets(&self) -> &[CorrelatedAsset] {
        &self.assets
    }

    /// Evaluate the basket for a trade on `side`. `fetch` returns the asset's
    /// H4 series, or `None` when it cannot be had.
    pub fn evaluate<F>(&self, side: Side, mut fetch: F) -> GateResult
    where
        F: FnMut(&CorrelatedAsset) -> Option<PriceSeries>,
    {
        let total_weight: f64 = self.assets.iter().map(|a| a.weight.abs()).sum();
        if total_weight <= 0.0 {
            return GateResult::unavailable(GateKind::Correlation, "Correlation: empty basket");
        }

        let mut weighted = 0.0;
        let mut available = 0usize;
        let mut notes = Vec::with_capacity(self.assets.len());

        for asset in &self.assets {
            let trend = fetch(asset).as_ref().and_then(asset_trend);
            let alignment = match trend {
                Some(trend) => {
                    available += 1;
                    let matched = trend == asset.expected_trend(side);
                    notes.push(format!(
                        "{}: {} ({})",
                        asset.name,
                        trend,
                        if matched { "aligned" } else { "not aligned" }
                    ));
                    if matched {
                        1.0
                    } else {
                        0.0
                    }
                }
                None => {
                    notes.push(format!("{}: data unavailable", asset.name));
                    0.5
                }
            };
            weighted += alignment * asset.weight.abs();
        }

        if available == 0 {
            return GateResult {
                notes,
                ..GateResult::unavailable(GateKind::Correlation, "Correlation: no basket data")
            };
        }

        let score = weighted / total_weight;
        let aligned = score >= ALIGNED_SCORE;
        debug!(
            side = %side,
            score = format!("{:.2}", score),
            aligned,
            available,
            "Correlation gate evaluated"
        );
        GateResult::new(GateKind::Correlation, aligned, score, notes)
    }
}
