// =============================================================================
// Liquidity zones and liquidity grabs
// =============================================================================
//
// Zones are price levels where resting orders cluster:
//   - equal highs / lows: an extreme printed at least twice inside a local
//     window of 3 bars left and 2 bars right;
//   - session high / low of the trailing 100 bars (fixed strength 0.8).
//
// A grab is the latest bar sweeping the 20-bar swing extreme before it and
// closing back inside, on above-average volume.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::FeatureDetector;
use crate::indicators::volume::{mean_volume, volume_ratio, VOLUME_WINDOW};
use crate::market_data::{PriceBar, PriceSeries};
use crate::types::{Direction, Timeframe};

const LEFT_BARS: usize = 3;
const RIGHT_BARS: usize = 2;
const SESSION_BARS: usize = 100;
const SESSION_STRENGTH: f64 = 0.8;
const GRAB_SWING_BARS: usize = 20;
const GRAB_MIN_BARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityKind {
    EqualHigh,
    EqualLow,
    SessionHigh,
    SessionLow,
}

impl LiquidityKind {
    /// Low-side zones hold sell stops that bullish setups run; high-side
    /// zones serve bearish setups.
    pub fn serves(self, direction: Direction) -> bool {
        match direction {
            Direction::Bullish => matches!(self, Self::EqualLow | Self::SessionLow),
            Direction::Bearish => matches!(self, Self::EqualHigh | Self::SessionHigh),
        }
    }
}

impl std::fmt::Display for LiquidityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EqualHigh => write!(f, "equal_high"),
            Self::EqualLow => write!(f, "equal_low"),
            Self::SessionHigh => write!(f, "session_high"),
            Self::SessionLow => write!(f, "session_low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityZone {
    pub price: f64,
    pub kind: LiquidityKind,
    pub strength: f64,
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrabKind {
    GrabHighs,
    GrabLows,
}

impl std::fmt::Display for GrabKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GrabHighs => write!(f, "grab_highs"),
            Self::GrabLows => write!(f, "grab_lows"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityGrab {
    pub kind: GrabKind,
    pub sweep_price: f64,
    /// Sweep distance in ATRs, capped at 2.0.
    pub strength: f64,
    /// Latest volume over the swing window's mean volume.
    pub volume_ratio: f64,
}

impl LiquidityGrab {
    /// Swept lows fuel longs, swept highs fuel shorts.
    pub fn direction(&self) -> Direction {
        match self.kind {
            GrabKind::GrabLows => Direction::Bullish,
            GrabKind::GrabHighs => Direction::Bearish,
        }
    }
}

fn zone_strength(bars: &[PriceBar], idx: usize, rejection: f64) -> f64 {
    let vr = volume_ratio(bars, idx, VOLUME_WINDOW);
    (vr * 0.6 + rejection * 0.4).clamp(0.0, 1.0)
}

impl FeatureDetector {
    /// Equal highs/lows plus session extremes, strongest first.
    pub fn liquidity_zones(&self, series: &PriceSeries, tf: Timeframe) -> Vec<LiquidityZone> {
        let bars = series.bars();
        let mut zones = Vec::new();

        if bars.len() > LEFT_BARS + RIGHT_BARS {
            for i in LEFT_BARS..bars.len() - RIGHT_BARS {
                let window = &bars[i - LEFT_BARS..=i + RIGHT_BARS];
                let bar = &bars[i];
                let range = bar.range();

                let max_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
                let high_prints = window.iter().filter(|b| b.high == bar.high).count();
                if bar.high == max_high && high_prints >= 2 {
                    let rejection = if range > 0.0 { (bar.high - bar.close) / range } else { 0.0 };
                    zones.push(LiquidityZone {
                        price: bar.high,
                        kind: LiquidityKind::EqualHigh,
                        strength: zone_strength(bars, i, rejection),
                        timeframe: tf,
                    });
                }

                let min_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
                let low_prints = window.iter().filter(|b| b.low == bar.low).count();
                if bar.low == min_low && low_prints >= 2 {
                    let rejection = if range > 0.0 { (bar.close - bar.low) / range } else { 0.0 };
                    zones.push(LiquidityZone {
                        price: bar.low,
                        kind: LiquidityKind::EqualLow,
                        strength: zone_strength(bars, i, rejection),
                        timeframe: tf,
                    });
                }
            }
        }

        if bars.len() >= SESSION_BARS {
            let session = series.tail(SESSION_BARS);
            let high = session.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let low = session.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            zones.push(LiquidityZone {
                price: high,
                kind: LiquidityKind::SessionHigh,
                strength: SESSION_STRENGTH,
                timeframe: tf,
            });
            zones.push(LiquidityZone {
                price: low,
                kind: LiquidityKind::SessionLow,
                strength: SESSION_STRENGTH,
                timeframe: tf,
            });
        }

        // Stable: equal strengths keep detection order.
        zones.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        debug!(timeframe = %tf, count = zones.len(), "Liquidity zones detected");
        zones
    }

    /// Sweep of the 20-bar swing extreme by the latest bar.
    pub fn liquidity_grab(&self, series: &PriceSeries) -> Option<LiquidityGrab> {
        let bars = series.bars();
        if bars.len() < GRAB_MIN_BARS {
            return None;
        }
        let atr = self.usable_atr(series)?;

        let n = bars.len();
        let current = &bars[n - 1];
        let swing = &bars[n.saturating_sub(GRAB_SWING_BARS + 1)..n - 1];
        let avg_volume = mean_volume(swing)?;

        let swing_high = swing.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let swing_low = swing.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let volume_ok = current.volume > avg_volume;
        let vr = if avg_volume > 0.0 { current.volume / avg_volume } else { 1.0 };

        if current.high > swing_high && current.close < swing_high && volume_ok {
            return Some(LiquidityGrab {
                kind: GrabKind::GrabHighs,
                sweep_price: swing_high,
                strength: ((current.high - swing_high) / atr).min(2.0),
                volume_ratio: vr,
            });
        }

        if current.low < swing_low && current.close > swing_low && volume_ok {
            return Some(LiquidityGrab {
                kind: GrabKind::GrabLows,
                sweep_price: swing_low,
                strength: ((swing_low - current.low) / atr).min(2.0),
                volume_ratio: vr,
            });
        }

        None
    }
}
