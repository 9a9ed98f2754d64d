// =============================================================================
// Relative Strength Index (RSI): simple rolling means
// =============================================================================
//
// Step 1: Price changes (deltas) from consecutive closes.
// Step 2: Average gain / average loss = plain mean over the last `period`
//          deltas (no Wilder smoothing).
// Step 3: RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// A window with no movement at all reads as neutral (50).
// =============================================================================

/// Most recent RSI over the last `period` deltas.
///
/// Returns `None` when `period == 0` or there are fewer than `period + 1`
/// closes.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let window = &closes[closes.len() - period - 1..];
    let (gain, loss) = window.windows(2).fold((0.0_f64, 0.0_f64), |(g, l), w| {
        let d = w[1] - w[0];
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l - d)
        }
    });

    let period_f = period as f64;
    let rsi = rsi_from_averages(gain / period_f, loss / period_f);
    rsi.is_finite().then_some(rsi)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
