// =============================================================================
// Volume ratios
// =============================================================================
//
// The detectors compare a bar's volume with the trailing average that
// *includes* the bar itself (a 20-bar rolling mean ending at the bar).
// When that average is unavailable or zero the ratio reads neutral (1.0).
// =============================================================================

use crate::market_data::PriceBar;

/// Default rolling window for volume averages.
pub const VOLUME_WINDOW: usize = 20;

/// Mean volume of the `window` bars ending at `idx` (inclusive).
///
/// `None` while fewer than `window` bars are available.
pub fn rolling_mean_volume(bars: &[PriceBar], idx: usize, window: usize) -> Option<f64> {
    if window == 0 || idx >= bars.len() || idx + 1 < window {
        return None;
    }
    let slice = &bars[idx + 1 - window..=idx];
    Some(slice.iter().map(|b| b.volume).sum::<f64>() / window as f64)
}

/// Volume of bar `idx` divided by its rolling mean; 1.0 when undefined.
pub fn volume_ratio(bars: &[PriceBar], idx: usize, window: usize) -> f64 {
    let Some(bar) = bars.get(idx) else {
        return 1.0;
    };
    match rolling_mean_volume(bars, idx, window) {
        Some(avg) if avg > 0.0 => bar.volume / avg,
        _ => 1.0,
    }
}

/// Plain mean volume of a slice, `None` for an empty slice.
pub fn mean_volume(bars: &[PriceBar]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    Some(bars.iter().map(|b| b.volume).sum::<f64>() / bars.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(volumes: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| PriceBar {
                time: start + Duration::hours(i as i64),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: v,
            })
            .collect()
    }

    #[test]
    fn ratio_includes_the_bar_itself() {
        let mut v = vec![100.0; 19];
        v.push(300.0);
        let b = bars(&v);
        // avg = (19*100 + 300) / 20 = 110
        assert!((volume_ratio(&b, 19, 20) - 300.0 / 110.0).abs() < 1e-12);
    }

    #[test]
    fn ratio_is_neutral_without_history() {
        let b = bars(&[5.0, 10.0]);
        assert_eq!(volume_ratio(&b, 1, 20), 1.0);
        assert_eq!(volume_ratio(&b, 7, 20), 1.0);
        assert_eq!(volume_ratio(&bars(&[0.0; 25]), 24, 20), 1.0);
    }

    #[test]
    fn mean_volume_of_slice() {
        assert_eq!(mean_volume(&bars(&[1.0, 3.0])), Some(2.0));
        assert_eq!(mean_volume(&[]), None);
    }
}
