// =============================================================================
// Synthetic price fixtures shared by unit tests
// =============================================================================

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::market_data::{PriceBar, PriceSeries};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Bar `i` of an hourly series starting at `t0()`.
pub fn bar(i: usize, o: f64, h: f64, l: f64, c: f64, v: f64) -> PriceBar {
    PriceBar {
        time: t0() + Duration::hours(i as i64),
        open: o,
        high: h,
        low: l,
        close: c,
        volume: v,
    }
}

/// Gently rising baseline bar: +0.2 per bar, 0.4 range, volume 100.
pub fn baseline_bar(i: usize) -> PriceBar {
    let open = 100.0 + 0.2 * i as f64;
    let close = open + 0.2;
    bar(i, open, close + 0.1, open - 0.1, close, 100.0)
}

/// Constant-OHLC series: zero ATR, zero range.
pub fn flat_series(n: usize) -> PriceSeries {
    PriceSeries::new((0..n).map(|i| bar(i, 100.0, 100.0, 100.0, 100.0, 100.0)).collect())
}

/// 150-bar bullish setup:
///
/// - bar 125: bearish candle (the order block), volume 200
/// - bar 135: bullish impulse, ~4.8 displacement, volume 300
/// - bars 136..=148: orderly retrace back into the block
/// - bar 149: bullish FU candle sweeping the retrace lows on volume 400,
///   closing inside the block body
pub fn scenario_a() -> PriceSeries {
    let mut bars = Vec::with_capacity(150);
    for i in 0..150 {
        let b = match i {
            125 => bar(i, 125.6, 125.7, 125.1, 125.2, 200.0),
            135 => bar(i, 127.0, 128.5, 126.9, 128.4, 300.0),
            136..=148 => {
                let open = bars
                    .last()
                    .map(|p: &PriceBar| p.close)
                    .unwrap_or(128.4);
                let close = open - 0.25;
                bar(i, open, open + 0.05, close - 0.05, close, 100.0)
            }
            149 => bar(i, 125.0, 125.7, 124.5, 125.6, 400.0),
            _ => baseline_bar(i),
        };
        bars.push(b);
    }
    PriceSeries::new(bars)
}

/// Steady trend from 100.0, `step` per bar, 0.1 wicks.
pub fn trending(n: usize, step: f64) -> PriceSeries {
    PriceSeries::new(
        (0..n)
            .map(|i| {
                let open = 100.0 + step * i as f64;
                let close = open + step;
                bar(i, open, open.max(close) + 0.1, open.min(close) - 0.1, close, 100.0)
            })
            .collect(),
    )
}

/// `series` reflected through `axis`: highs become lows and every candle
/// flips colour. Keep every price within [axis / 2, 2 * axis] so the
/// reflection is exact.
pub fn mirrored(series: &PriceSeries, axis: f64) -> PriceSeries {
    PriceSeries::new(
        series
            .bars()
            .iter()
            .map(|b| PriceBar {
                time: b.time,
                open: axis - b.open,
                high: axis - b.low,
                low: axis - b.high,
                close: axis - b.close,
                volume: b.volume,
            })
            .collect(),
    )
}

/// Scenario A at 14:00 UTC on a weekday (London/New York overlap).
pub fn overlap_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 14, 0, 0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_a_shape() {
        let s = scenario_a();
        assert_eq!(s.len(), 150);
        assert!((s.bars()[148].close - 125.15).abs() < 1e-9);
        assert!(s.bars()[125].is_bearish());
        assert!(s.bars()[135].is_bullish());
    }

    #[test]
    fn mirror_flips_candles() {
        let m = mirrored(&scenario_a(), 199.0);
        assert_eq!(m.len(), 150);
        assert!(m.bars()[125].is_bullish());
        assert!(m.bars()[135].is_bearish());
        assert_eq!(m.bars()[149].high, 199.0 - 124.5);
        assert_eq!(m.bars()[149].low, 199.0 - 125.7);
    }
}
