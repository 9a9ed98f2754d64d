// =============================================================================
// Market Regime Classifier
// =============================================================================
//
// Classifies the market from three independent readings:
//
//   Volatility: H1 ATR(14) / mean of the last 50 ATR values
//   Trend     : EMA slope alignment + structure + 10-bar change, D1 and H4
//                combined 0.6 / 0.4, direction from D1 EMA21 vs EMA50
//   Momentum  : H1 RSI(14)
//
// Combination hierarchy (first match wins):
//
//   1. HIGH_VOLATILITY / EXTREME_LOW_VOLATILITY: volatility overrides
//   2. TRENDING_BULLISH / TRENDING_BEARISH     : strong combined trend
//   3. RANGING_MARKET                          : trend strength < 0.3
//   4. MIXED_REGIME                            : everything else
//
// Confidence = 0.4 * volatility + 0.4 * trend + 0.2 * momentum confidences.
// Missing data yields UNKNOWN with conservative parameters.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::params::{adaptive_params, AdaptiveParams};
use crate::indicators::atr::atr_series;
use crate::indicators::ema::{calculate_ema, ema_last, slope};
use crate::indicators::rsi::calculate_rsi;
use crate::market_data::{PriceBar, PriceSeries};
use crate::types::Direction;

const ATR_PERIOD: usize = 14;
const RSI_PERIOD: usize = 14;
const VOLATILITY_WINDOW: usize = 50;
const TREND_MIN_BARS: usize = 50;
const STRUCTURE_BARS: usize = 10;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeKind {
    HighVolatility,
    ExtremeLowVolatility,
    TrendingBullish,
    TrendingBearish,
    RangingMarket,
    MixedRegime,
    Unknown,
}

impl RegimeKind {
    pub fn description(self) -> &'static str {
        match self {
            Self::HighVolatility => "High volatility - reduce size, raise score threshold",
            Self::ExtremeLowVolatility => "Extremely low volatility - range conditions",
            Self::TrendingBullish => "Strong bullish trend - favour long setups",
            Self::TrendingBearish => "Strong bearish trend - favour short setups",
            Self::RangingMarket => "Ranging market - trade reversals at the edges",
            Self::MixedRegime => "Mixed signals - wait for clearer conditions",
            Self::Unknown => "Unknown regime - conservative defaults",
        }
    }
}

impl std::fmt::Display for RegimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighVolatility => write!(f, "HIGH_VOLATILITY"),
            Self::ExtremeLowVolatility => write!(f, "EXTREME_LOW_VOLATILITY"),
            Self::TrendingBullish => write!(f, "TRENDING_BULLISH"),
            Self::TrendingBearish => write!(f, "TRENDING_BEARISH"),
            Self::RangingMarket => write!(f, "RANGING_MARKET"),
            Self::MixedRegime => write!(f, "MIXED_REGIME"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityKind {
    High,
    Elevated,
    Normal,
    Low,
    ExtremeLow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendKind {
    Strong,
    Moderate,
    Weak,
    Ranging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomentumKind {
    Overbought,
    Bullish,
    Neutral,
    Bearish,
    Oversold,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityState {
    pub kind: VolatilityKind,
    pub ratio: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendState {
    pub kind: TrendKind,
    pub direction: Option<Direction>,
    pub strength: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumState {
    pub kind: MomentumKind,
    pub rsi: f64,
    pub confidence: f64,
}

/// The three readings behind a classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeComponents {
    pub volatility: VolatilityState,
    pub trend: TrendState,
    pub momentum: MomentumState,
}

/// Classified regime plus the parameter set it maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeInfo {
    pub kind: RegimeKind,
    pub confidence: f64,
    pub params: AdaptiveParams,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<RegimeComponents>,
}

impl RegimeInfo {
    /// Fallback when the inputs cannot be classified.
    pub fn unknown() -> Self {
        Self {
            kind: RegimeKind::Unknown,
            confidence: 0.5,
            params: adaptive_params(RegimeKind::Unknown),
            description: RegimeKind::Unknown.description().to_string(),
            components: None,
        }
    }
}

// =============================================================================
// Readings
// =============================================================================

fn volatility_state(h1: &PriceSeries) -> Option<VolatilityState> {
    let atr = atr_series(h1.bars(), ATR_PERIOD);
    let current = atr.last().copied().filter(|v| v.is_finite())?;

    let recent: Vec<f64> = atr.iter().rev().filter(|v| v.is_finite()).take(VOLATILITY_WINDOW).copied().collect();
    let avg = recent.iter().sum::<f64>() / recent.len() as f64;
    let ratio = if avg > 0.0 { current / avg } else { 1.0 };

    let (kind, confidence) = if ratio >= 1.8 {
        (VolatilityKind::High, 0.9)
    } else if ratio >= 1.3 {
        (VolatilityKind::Elevated, 0.7)
    } else if ratio <= 0.5 {
        (VolatilityKind::ExtremeLow, 0.9)
    } else if ratio <= 0.7 {
        (VolatilityKind::Low, 0.8)
    } else {
        (VolatilityKind::Normal, 0.6)
    };

    Some(VolatilityState { kind, ratio, confidence })
}

/// Trend strength in [0, 1]; 0.5 when there is too little history to judge.
pub fn trend_strength(series: &PriceSeries) -> f64 {
    let bars = series.bars();
    let n = bars.len();
    if n < TREND_MIN_BARS {
        return 0.5;
    }

    let closes = series.closes();
    let mut strength = 0.0;

    // Structure: last 10 bars against the 10 before them.
    if n >= STRUCTURE_BARS * 2 {
        let recent = &bars[n - STRUCTURE_BARS..];
        let prior = &bars[n - 2 * STRUCTURE_BARS..n - STRUCTURE_BARS];
        let max_high = |s: &[PriceBar]| s.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let min_low = |s: &[PriceBar]| s.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

        let higher = max_high(recent) > max_high(prior) && min_low(recent) > min_low(prior);
        let lower = max_high(recent) < max_high(prior) && min_low(recent) < min_low(prior);
        if higher || lower {
            strength += 0.4;
        }
    }

    // EMA slope alignment.
    let ema20 = calculate_ema(&closes, 20);
    let ema50 = calculate_ema(&closes, 50);
    if let (Some(s20), Some(s50)) = (slope(&ema20, 5), slope(&ema50, 10)) {
        if (s20 > 0.0 && s50 > 0.0) || (s20 < 0.0 && s50 < 0.0) {
            strength += 0.3;
        }
    }

    // Normalised 10-bar change.
    let base = closes[n - STRUCTURE_BARS];
    if base != 0.0 {
        let change = (closes[n - 1] - base).abs() / base.abs();
        strength += (change * 10.0).min(0.3);
    }

    strength.min(1.0)
}

fn trend_state(d1: &PriceSeries, h4: &PriceSeries) -> TrendState {
    let combined = trend_strength(d1) * 0.6 + trend_strength(h4) * 0.4;

    let (kind, confidence) = if combined >= 0.7 {
        (TrendKind::Strong, 0.8)
    } else if combined >= 0.5 {
        (TrendKind::Moderate, 0.6)
    } else if combined >= 0.3 {
        (TrendKind::Weak, 0.4)
    } else {
        (TrendKind::Ranging, 0.7)
    };

    let closes = d1.closes();
    let direction = match (ema_last(&closes, 21), ema_last(&closes, 50)) {
        (Some(fast), Some(slow)) if fast > slow => Some(Direction::Bullish),
        (Some(_), Some(_)) => Some(Direction::Bearish),
        _ => None,
    };

    TrendState {
        kind,
        direction,
        strength: combined,
        confidence,
    }
}

fn momentum_state(h1: &PriceSeries) -> Option<MomentumState> {
    let rsi = calculate_rsi(&h1.closes(), RSI_PERIOD)?;
    let (kind, confidence) = if rsi >= 70.0 {
        (MomentumKind::Overbought, 0.8)
    } else if rsi >= 60.0 {
        (MomentumKind::Bullish, 0.6)
    } else if rsi <= 30.0 {
        (MomentumKind::Oversold, 0.8)
    } else if rsi <= 40.0 {
        (MomentumKind::Bearish, 0.6)
    } else {
        (MomentumKind::Neutral, 0.5)
    };
    Some(MomentumState { kind, rsi, confidence })
}

fn combine(components: &RegimeComponents) -> RegimeKind {
    match components.volatility.kind {
        VolatilityKind::High => return RegimeKind::HighVolatility,
        VolatilityKind::ExtremeLow => return RegimeKind::ExtremeLowVolatility,
        _ => {}
    }
    match (components.trend.kind, components.trend.direction) {
        (TrendKind::Strong, Some(Direction::Bullish)) => RegimeKind::TrendingBullish,
        (TrendKind::Strong, Some(Direction::Bearish)) => RegimeKind::TrendingBearish,
        (TrendKind::Ranging, _) => RegimeKind::RangingMarket,
        _ => RegimeKind::MixedRegime,
    }
}

// =============================================================================
// RegimeClassifier
// =============================================================================

/// Stateless regime classifier.
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier;

impl RegimeClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify from daily, 4-hour and hourly snapshots of one instrument.
    pub fn classify(&self, d1: &PriceSeries, h4: &PriceSeries, h1: &PriceSeries) -> RegimeInfo {
        if d1.is_empty() || h4.is_empty() {
            return RegimeInfo::unknown();
        }
        let (Some(volatility), Some(momentum)) = (volatility_state(h1), momentum_state(h1)) else {
            return RegimeInfo::unknown();
        };
        let trend = trend_state(d1, h4);
        let components = RegimeComponents {
            volatility,
            trend,
            momentum,
        };

        let kind = combine(&components);
        let confidence =
            (volatility.confidence * 0.4 + trend.confidence * 0.4 + momentum.confidence * 0.2).clamp(0.0, 1.0);

        debug!(
            regime = %kind,
            confidence = format!("{:.2}", confidence),
            vol_ratio = format!("{:.2}", volatility.ratio),
            trend_strength = format!("{:.2}", trend.strength),
            rsi = format!("{:.1}", momentum.rsi),
            "Regime classified"
        );

        RegimeInfo {
            kind,
            confidence,
            params: adaptive_params(kind),
            description: kind.description().to_string(),
            components: Some(components),
        }
    }
}
