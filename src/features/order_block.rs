// =============================================================================
// Order Blocks
// =============================================================================
//
// An order block is the last opposite-coloured candle before a displacement
// (impulse) bar.
//
//   displacement = (body / ATR) * (range / ATR) * 0.5
//                + clamp((volume_ratio - 1) * 0.25, 0, 0.5)
//
//   quality      = 0.4 * body/range + 0.3 * min(2, volume_ratio) + 0.3 * 0.5
//                  (capped at 1.0; the last term is a fixed proximity score)
//
// The block takes the direction of the impulse that created it: a bullish
// impulse leaves a bullish (demand) block made of a bearish candle.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::FeatureDetector;
use crate::indicators::volume::{volume_ratio, VOLUME_WINDOW};
use crate::market_data::{PriceBar, PriceSeries};
use crate::types::{Direction, Timeframe};

/// Bars skipped at the start (volume average warm-up).
const SCAN_START: usize = 20;
/// Bars excluded at the end so every impulse has room to be retested.
const SCAN_END_GAP: usize = 10;
/// Fixed proximity placeholder inside the quality formula.
const PROXIMITY_SCORE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    /// Index of the block candle within its series.
    pub index: usize,
    pub direction: Direction,
    pub body_low: f64,
    pub body_high: f64,
    pub wick_low: f64,
    pub wick_high: f64,
    pub timeframe: Timeframe,
    /// Displacement of the impulse bar that qualified this block.
    pub displacement: f64,
    pub volume: f64,
    /// Block candle volume over the 20-bar average of its own timeframe.
    pub volume_ratio: f64,
    pub quality: f64,
}

impl OrderBlock {
    pub fn body_mid(&self) -> f64 {
        (self.body_high + self.body_low) / 2.0
    }

    /// Score used to pick one block across timeframes.
    pub fn selection_score(&self) -> f64 {
        self.quality * 0.4
            + (self.displacement / 5.0).min(1.0) * 0.3
            + self.timeframe.order_block_weight() * 0.3
    }
}

/// Displacement of bar `idx` given its ATR. Zero for degenerate ATR.
pub fn displacement(bars: &[PriceBar], idx: usize, atr: f64) -> f64 {
    let Some(bar) = bars.get(idx) else {
        return 0.0;
    };
    if !atr.is_finite() || atr <= 0.0 {
        return 0.0;
    }
    let base = (bar.body() / atr) * (bar.range() / atr) * 0.5;
    let vr = volume_ratio(bars, idx, VOLUME_WINDOW);
    let boost = ((vr - 1.0) * 0.25).clamp(0.0, 0.5);
    base + boost
}

/// Candle quality for a block candidate, in [0, 1].
pub fn candle_quality(bars: &[PriceBar], idx: usize) -> f64 {
    let Some(bar) = bars.get(idx) else {
        return 0.0;
    };
    let range = bar.range();
    let body_ratio = if range > 0.0 { bar.body() / range } else { 0.0 };
    let vr = volume_ratio(bars, idx, VOLUME_WINDOW);
    (body_ratio * 0.4 + vr.min(2.0) * 0.3 + PROXIMITY_SCORE * 0.3).min(1.0)
}

impl FeatureDetector {
    /// All order blocks in `series`, best first by (quality, displacement).
    pub fn order_blocks(&self, series: &PriceSeries, tf: Timeframe) -> Vec<OrderBlock> {
        let bars = series.bars();
        let end = bars.len().saturating_sub(SCAN_END_GAP);
        if end <= SCAN_START {
            return Vec::new();
        }

        let atr = self.atr(series);
        let mut blocks = Vec::new();

        for i in SCAN_START..end {
            let disp = displacement(bars, i, atr[i]);
            if disp < self.config.min_displacement {
                continue;
            }

            let impulse = if bars[i].is_bullish() {
                Direction::Bullish
            } else {
                Direction::Bearish
            };

            let Some(ob_idx) = self.nearest_opposite_candle(bars, i, impulse) else {
                continue;
            };

            let candle = &bars[ob_idx];
            blocks.push(OrderBlock {
                index: ob_idx,
                direction: impulse,
                body_low: candle.body_low(),
                body_high: candle.body_high(),
                wick_low: candle.low,
                wick_high: candle.high,
                timeframe: tf,
                displacement: disp,
                volume: candle.volume,
                volume_ratio: volume_ratio(bars, ob_idx, VOLUME_WINDOW),
                quality: candle_quality(bars, ob_idx),
            });
        }

        blocks.sort_by(|a, b| {
            b.quality
                .total_cmp(&a.quality)
                .then(b.displacement.total_cmp(&a.displacement))
        });

        debug!(timeframe = %tf, count = blocks.len(), "Order blocks detected");
        blocks
    }

    /// Nearest candle of the opposite colour within `ob_search_bars` before
    /// the impulse at `impulse_idx`.
    fn nearest_opposite_candle(
        &self,
        bars: &[PriceBar],
        impulse_idx: usize,
        impulse: Direction,
    ) -> Option<usize> {
        let earliest = impulse_idx.saturating_sub(self.config.ob_search_bars);
        (earliest..impulse_idx).rev().find(|&j| match impulse {
            Direction::Bullish => bars[j].is_bearish(),
            Direction::Bearish => bars[j].is_bullish(),
        })
    }

    /// Pick the single best block across two timeframes' candidates.
    ///
    /// Ties keep the earlier candidate, so `primary` wins over `secondary`.
    pub fn best_order_block(
        &self,
        primary: &[OrderBlock],
        secondary: &[OrderBlock],
    ) -> Option<OrderBlock> {
        primary
            .iter()
            .chain(secondary.iter())
            .fold(None::<(&OrderBlock, f64)>, |best, block| {
                let score = block.selection_score();
                match best {
                    Some((_, best_score)) if score <= best_score => best,
                    _ => Some((block, score)),
                }
            })
            .map(|(block, _)| block.clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{flat_series, scenario_a};

    fn block(tf: Timeframe, quality: f64, displacement: f64) -> OrderBlock {
        OrderBlock {
            index: 0,
            direction: Direction::Bullish,
            body_low: 1.0,
            body_high: 2.0,
            wick_low: 0.5,
            wick_high: 2.5,
            timeframe: tf,
            displacement,
            volume: 100.0,
            volume_ratio: 1.0,
            quality,
        }
    }

    #[test]
    fn scenario_a_yields_one_bullish_block_ten_bars_before_impulse() {
        let blocks = FeatureDetector::default().order_blocks(&scenario_a(), Timeframe::H1);
        assert_eq!(blocks.len(), 1);
        let ob = &blocks[0];
        assert_eq!(ob.index, 125);
        assert_eq!(ob.direction, Direction::Bullish);
        assert!((ob.body_low - 125.2).abs() < 1e-9);
        assert!((ob.body_high - 125.6).abs() < 1e-9);
        assert!(ob.body_low <= ob.body_high);
        assert!((ob.displacement - 4.757).abs() < 0.01, "disp = {}", ob.displacement);
        assert!((ob.volume_ratio - 200.0 / 105.0).abs() < 1e-9);
        assert!(ob.quality > 0.98 && ob.quality <= 1.0);
    }

    #[test]
    fn flat_series_has_no_blocks() {
        assert!(FeatureDetector::default()
            .order_blocks(&flat_series(150), Timeframe::H4)
            .is_empty());
    }

    #[test]
    fn displacement_is_zero_for_degenerate_atr() {
        let s = scenario_a();
        assert_eq!(displacement(s.bars(), 135, 0.0), 0.0);
        assert_eq!(displacement(s.bars(), 135, f64::NAN), 0.0);
        assert_eq!(displacement(s.bars(), 999, 1.0), 0.0);
    }

    #[test]
    fn best_block_prefers_higher_timeframe_on_equal_features() {
        let detector = FeatureDetector::default();
        let h4 = vec![block(Timeframe::H4, 0.7, 3.0)];
        let h1 = vec![block(Timeframe::H1, 0.7, 3.0)];
        let best = detector.best_order_block(&h4, &h1).unwrap();
        assert_eq!(best.timeframe, Timeframe::H4);
    }

    #[test]
    fn best_block_tie_keeps_first() {
        let detector = FeatureDetector::default();
        let mut a = block(Timeframe::H1, 0.9, 4.0);
        a.index = 1;
        let mut b = block(Timeframe::H1, 0.9, 4.0);
        b.index = 2;
        let best = detector.best_order_block(&[a], &[b]).unwrap();
        assert_eq!(best.index, 1);
        assert!(detector.best_order_block(&[], &[]).is_none());
    }

    #[test]
    fn strong_h1_block_can_beat_weak_h4_block() {
        let detector = FeatureDetector::default();
        let h4 = vec![block(Timeframe::H4, 0.2, 2.0)];
        let h1 = vec![block(Timeframe::H1, 1.0, 5.0)];
        // H4: 0.08 + 0.12 + 0.30 = 0.50; H1: 0.40 + 0.30 + 0.15 = 0.85
        assert_eq!(detector.best_order_block(&h4, &h1).unwrap().timeframe, Timeframe::H1);
    }
}
