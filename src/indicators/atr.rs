// =============================================================================
// Average True Range (ATR): rolling-mean variant
// =============================================================================
//
// True Range (TR) for each bar:
//   TR_0 = H - L
//   TR_t = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR_t is the simple mean of the last `period` TR values. Indices before
// `period - 1` are NaN (warm-up); every value after warm-up is >= 0.
//
// Default period: 14
// =============================================================================

use crate::market_data::PriceBar;

/// True range per bar. The first bar has no previous close and uses H - L.
pub fn true_range(bars: &[PriceBar]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let hl = bar.high - bar.low;
        let tr = match i.checked_sub(1).and_then(|p| bars.get(p)) {
            Some(prev) => hl
                .max((bar.high - prev.close).abs())
                .max((bar.low - prev.close).abs()),
            None => hl,
        };
        out.push(tr.max(0.0));
    }
    out
}

/// ATR series aligned with `bars`. NaN during warm-up.
///
/// Returns all-NaN when `period` is zero or longer than the input.
pub fn atr_series(bars: &[PriceBar], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }

    let tr = true_range(bars);
    let period_f = period as f64;

    // Direct window sums: no running-sum drift.
    for (i, slot) in out.iter_mut().enumerate().skip(period - 1) {
        let window = &tr[i + 1 - period..=i];
        *slot = window.iter().sum::<f64>() / period_f;
    }

    out
}

/// Most recent ATR value, `None` during warm-up or for non-finite data.
pub fn latest_atr(bars: &[PriceBar], period: usize) -> Option<f64> {
    atr_series(bars, period)
        .last()
        .copied()
        .filter(|v| v.is_finite())
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    /// Helper: build a bar from OHLC with unit volume, one hour apart.
    fn candle(i: usize, o: f64, h: f64, l: f64, c: f64) -> PriceBar {
        PriceBar {
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 1.0,
        }
    }

    #[test]
    fn warm_up_is_nan() {
        let bars: Vec<PriceBar> = (0..5).map(|i| candle(i, 10.0, 11.0, 9.0, 10.0)).collect();
        let atr = atr_series(&bars, 3);
        assert!(atr[0].is_nan());
        assert!(atr[1].is_nan());
        assert!((atr[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn gap_uses_previous_close() {
        let bars = vec![
            candle(0, 10.0, 11.0, 9.0, 10.0),
            // Gap up: |H - prevClose| = 5 dominates H - L = 1.
            candle(1, 14.0, 15.0, 14.0, 14.5),
        ];
        let tr = true_range(&bars);
        assert_eq!(tr, vec![2.0, 5.0]);
        assert!((atr_series(&bars, 2)[1] - 3.5).abs() < 1e-12);
    }

    #[test]
    fn zero_period_and_short_input() {
        let bars: Vec<PriceBar> = (0..3).map(|i| candle(i, 1.0, 2.0, 0.5, 1.5)).collect();
        assert!(atr_series(&bars, 0).iter().all(|v| v.is_nan()));
        assert!(latest_atr(&bars, 14).is_none());
        assert!(atr_series(&[], 14).is_empty());
    }

    #[test]
    fn flat_series_has_zero_atr() {
        let bars: Vec<PriceBar> = (0..20).map(|i| candle(i, 5.0, 5.0, 5.0, 5.0)).collect();
        assert_eq!(latest_atr(&bars, 14), Some(0.0));
    }

    proptest! {
        #[test]
        fn atr_non_negative_after_warm_up(
            raw in prop::collection::vec((1.0f64..1000.0, 0.0f64..50.0, 0.0f64..1.0), 1..80),
            period in 1usize..20,
        ) {
            let bars: Vec<PriceBar> = raw
                .iter()
                .enumerate()
                .map(|(i, &(base, spread, frac))| {
                    let low = base;
                    let high = base + spread;
                    let close = low + spread * frac;
                    candle(i, low, high, low, close)
                })
                .collect();
            let atr = atr_series(&bars, period);
            for (i, v) in atr.iter().enumerate() {
                if i + 1 < period {
                    prop_assert!(v.is_nan());
                } else {
                    prop_assert!(v.is_finite() && *v >= 0.0);
                }
            }
        }
    }
}
