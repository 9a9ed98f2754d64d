// =============================================================================
// Imbalances (fair value gaps)
// =============================================================================
//
// Bullish FVG at i: low[i]  > high[i-1] + min_gap   (gap = low[i] - high[i-1])
// Bearish FVG at i: high[i] < low[i-1]  - min_gap   (gap = low[i-1] - high[i])
//
// An imbalance is `filled` when the latest close trades inside it.

use serde::{Deserialize, Serialize};

use super::FeatureDetector;
use crate::market_data::PriceSeries;
use crate::types::Direction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imbalance {
    pub index: usize,
    pub direction: Direction,
    pub low: f64,
    pub high: f64,
    pub gap_size: f64,
    pub filled: bool,
    pub strength: f64,
}

impl FeatureDetector {
    pub fn imbalances(&self, series: &PriceSeries) -> Vec<Imbalance> {
        let bars = series.bars();
        if bars.len() < 3 {
            return Vec::new();
        }

        let min_gap = self.config.min_gap_size;
        let atr = self.atr(series);
        let strength_of = |gap: f64, i: usize| {
            let a = atr[i];
            if a.is_finite() && a > 0.0 {
                (gap / a).min(1.0)
            } else {
                0.0
            }
        };

        let mut out = Vec::new();
        for i in 2..bars.len() - 1 {
            let (prev, cur) = (&bars[i - 1], &bars[i]);
            if cur.low > prev.high + min_gap {
                let gap = cur.low - prev.high;
                out.push(Imbalance {
                    index: i,
                    direction: Direction::Bullish,
                    low: prev.high,
                    high: cur.low,
                    gap_size: gap,
                    filled: false,
                    strength: strength_of(gap, i),
                });
            } else if cur.high < prev.low - min_gap {
                let gap = prev.low - cur.high;
                out.push(Imbalance {
                    index: i,
                    direction: Direction::Bearish,
                    low: cur.high,
                    high: prev.low,
                    gap_size: gap,
                    filled: false,
                    strength: strength_of(gap, i),
                });
            }
        }

        if let Some(close) = series.last_close() {
            for imb in &mut out {
                imb.filled = imb.low <= close && close <= imb.high;
            }
        }

        out
    }
}
