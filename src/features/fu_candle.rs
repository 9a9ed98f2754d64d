// =============================================================================
// FU (fakeout) candles
// =============================================================================
//
// The latest bar qualifies when:
//   1. body >= fu_body_atr * ATR
//   2. it sweeps the opposite extreme of the 10 bars before it
//   3. its close sits past the close-fraction threshold
//      (bullish: close_frac >= t, bearish: close_frac <= 1 - t)
//
// strength = min(0.4, body/ATR * 0.4)
//          + min(0.3, min(3, volume_ratio) * 0.1)
//          + min(0.3, rejection * 0.3)

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::FeatureDetector;
use crate::indicators::volume::{volume_ratio, VOLUME_WINDOW};
use crate::market_data::PriceSeries;
use crate::types::Direction;

const SWEEP_BARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuCandle {
    pub index: usize,
    pub direction: Direction,
    pub body_size: f64,
    pub range_size: f64,
    /// Close position in the range, 0 = low, 1 = high.
    pub close_frac: f64,
    pub volume_ratio: f64,
    pub strength: f64,
}

/// FU strength from its components. Non-decreasing in every argument except
/// `atr`.
pub fn fu_strength(body: f64, atr: f64, volume_ratio: f64, rejection: f64) -> f64 {
    let body_term = if atr > 0.0 { (body / atr * 0.4).min(0.4) } else { 0.0 };
    let volume_term = (volume_ratio.min(3.0) * 0.1).clamp(0.0, 0.3);
    let rejection_term = (rejection * 0.3).clamp(0.0, 0.3);
    body_term + volume_term + rejection_term
}

impl FeatureDetector {
    /// FU candle on the latest bar, if any.
    pub fn fu_candle(&self, series: &PriceSeries) -> Option<FuCandle> {
        let bars = series.bars();
        if bars.len() < SWEEP_BARS + 1 {
            return None;
        }
        let atr = self.usable_atr(series)?;

        let n = bars.len();
        let idx = n - 1;
        let current = &bars[idx];
        let body = current.body();
        let range = current.range();

        if body < self.config.fu_body_atr * atr {
            return None;
        }

        let prior = &bars[n - 1 - SWEEP_BARS..idx];
        let prior_high = prior.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let prior_low = prior.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let swept_high = current.high > prior_high;
        let swept_low = current.low < prior_low;

        let close_frac = current.close_fraction();
        let vr = volume_ratio(bars, idx, VOLUME_WINDOW);

        let direction = if swept_low && close_frac >= self.config.fu_close_frac {
            Direction::Bullish
        } else if swept_high && close_frac <= 1.0 - self.config.fu_close_frac {
            Direction::Bearish
        } else {
            return None;
        };

        let rejection = match direction {
            Direction::Bullish => close_frac,
            Direction::Bearish => 1.0 - close_frac,
        };
        let strength = fu_strength(body, atr, vr, rejection);

        debug!(
            direction = %direction,
            body_atr = format!("{:.2}", body / atr),
            close_frac = format!("{:.2}", close_frac),
            volume_ratio = format!("{:.2}", vr),
            strength = format!("{:.2}", strength),
            "FU candle detected"
        );

        Some(FuCandle {
            index: idx,
            direction,
            body_size: body,
            range_size: range,
            close_frac,
            volume_ratio: vr,
            strength,
        })
    }
}
