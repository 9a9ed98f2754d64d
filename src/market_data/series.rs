use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PriceBar {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn body_high(&self) -> f64 {
        self.open.max(self.close)
    }

    pub fn body_low(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Where the close sits inside the bar's range, 0 = low, 1 = high.
    /// A zero-range bar reports the midpoint.
    pub fn close_fraction(&self) -> f64 {
        let range = self.range();
        if range > 0.0 {
            (self.close - self.low) / range
        } else {
            0.5
        }
    }

    fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
            && self.high >= self.low
            && self.volume >= 0.0
    }
}

// ---------------------------------------------------------------------------
// PriceSeries -- immutable, ascending, de-duplicated snapshot
// ---------------------------------------------------------------------------

/// Chronologically ascending bars with unique timestamps.
///
/// Every detector works on a `PriceSeries` snapshot; nothing mutates it after
/// construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PriceBar>", into = "Vec<PriceBar>")]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a snapshot from raw bars: drops malformed bars, sorts by time and
    /// keeps the latest copy of any repeated timestamp.
    pub fn new(raw: Vec<PriceBar>) -> Self {
        let before = raw.len();
        let mut bars: Vec<PriceBar> = raw.into_iter().filter(PriceBar::is_well_formed).collect();
        let malformed = before - bars.len();

        // Stable sort so a later copy of a timestamp stays after the earlier one.
        bars.sort_by_key(|b| b.time);

        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.time == bar.time => *last = bar,
                _ => deduped.push(bar),
            }
        }

        let dropped = before - deduped.len();
        if dropped > 0 {
            debug!(malformed, dropped, kept = deduped.len(), "Price series normalised");
        }

        Self { bars: deduped }
    }

    /// Keep only the most recent `max_bars` bars.
    pub fn trimmed(mut self, max_bars: usize) -> Self {
        if self.bars.len() > max_bars {
            let excess = self.bars.len() - max_bars;
            self.bars.drain(..excess);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn get(&self, idx: usize) -> Option<&PriceBar> {
        self.bars.get(idx)
    }

    /// The most recent `count` bars (fewer if the series is shorter).
    pub fn tail(&self, count: usize) -> &[PriceBar] {
        let start = self.bars.len().saturating_sub(count);
        &self.bars[start..]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

impl From<Vec<PriceBar>> for PriceSeries {
    fn from(bars: Vec<PriceBar>) -> Self {
        Self::new(bars)
    }
}

impl From<PriceSeries> for Vec<PriceBar> {
    fn from(series: PriceSeries) -> Self {
        series.bars
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(hour: u32, close: f64) -> PriceBar {
        PriceBar {
            time: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn sorts_and_keeps_latest_duplicate() {
        let series = PriceSeries::new(vec![bar(2, 3.0), bar(0, 1.0), bar(1, 2.0), bar(1, 2.5)]);
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.5, 3.0]);
    }

    #[test]
    fn drops_malformed_bars() {
        let mut inverted = bar(1, 5.0);
        inverted.high = 1.0;
        let mut nan = bar(2, 5.0);
        nan.close = f64::NAN;
        let series = PriceSeries::new(vec![bar(0, 1.0), inverted, nan]);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn trimmed_keeps_most_recent() {
        let series = PriceSeries::new((0..10).map(|h| bar(h, h as f64)).collect()).trimmed(3);
        assert_eq!(series.closes(), vec![7.0, 8.0, 9.0]);
        assert_eq!(series.tail(2).len(), 2);
        assert_eq!(series.tail(50).len(), 3);
    }

    #[test]
    fn close_fraction_guards_zero_range() {
        let mut flat = bar(0, 1.0);
        flat.high = 1.0;
        flat.low = 1.0;
        assert_eq!(flat.close_fraction(), 0.5);
    }

    #[test]
    fn serde_goes_through_normalisation() {
        let json = serde_json::to_string(&vec![bar(1, 2.0), bar(0, 1.0)]).unwrap();
        let series: PriceSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(series.closes(), vec![1.0, 2.0]);
    }
}
