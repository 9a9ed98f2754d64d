// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The very first EMA value is seeded with the SMA of the first `period` closes.
// =============================================================================

use crate::types::Direction;

/// Compute the EMA series for the given `closes` slice and look-back `period`.
///
/// Returns an empty `Vec` when the input is too short or the period is zero.
/// Each output element corresponds to a close starting at index `period - 1`.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed: SMA of the first `period` values.
    let sma: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sma);

    let mut prev_ema = sma;
    for &close in &closes[period..] {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        result.push(ema);
        prev_ema = ema;
    }

    result
}

/// Latest EMA value, `None` when the series is too short.
pub fn ema_last(closes: &[f64], period: usize) -> Option<f64> {
    calculate_ema(closes, period).last().copied()
}

/// Average per-bar change of `values` over the last `span` steps, measured
/// between the final element and the one `span - 1` positions earlier.
pub fn slope(values: &[f64], span: usize) -> Option<f64> {
    if span < 2 || values.len() < span {
        return None;
    }
    let last = *values.last()?;
    let earlier = values[values.len() - span];
    Some((last - earlier) / span as f64)
}

/// Direction of a stacked EMA ribbon: fast > mid > slow is bullish, the mirror
/// ordering is bearish, anything else is `None`.
pub fn stacked_direction(closes: &[f64], fast: usize, mid: usize, slow: usize) -> Option<Direction> {
    let f = ema_last(closes, fast)?;
    let m = ema_last(closes, mid)?;
    let s = ema_last(closes, slow)?;

    if f > m && m > s {
        Some(Direction::Bullish)
    } else if f < m && m < s {
        Some(Direction::Bearish)
    } else {
        None
    }
}
