// =============================================================================
// Market data provider
// =============================================================================
//
// `get_rates` returns an ascending, deduplicated series of at most `count`
// bars. Two implementations ship with the engine:
//
// - `ReplayProvider`: serves bars from memory, optionally loaded from
//   `<dir>/<SYMBOL>_<TF>.json` files (a JSON array of bars).
// - `RetryingProvider`: wraps another provider, retries failures and short
//   reads, and warns about holes in the returned series.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::market_data::PriceSeries;
use crate::types::Timeframe;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no data for {symbol} {timeframe}")]
    Unavailable { symbol: String, timeframe: Timeframe },

    #[error("only {got} of {wanted} bars for {symbol} {timeframe}")]
    Insufficient {
        symbol: String,
        timeframe: Timeframe,
        got: usize,
        wanted: usize,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Source of OHLCV history.
pub trait MarketDataProvider: Send + Sync {
    fn get_rates(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<PriceSeries, ProviderError>;
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for std::sync::Arc<P> {
    fn get_rates(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<PriceSeries, ProviderError> {
        (**self).get_rates(symbol, timeframe, count)
    }
}

// =============================================================================
// ReplayProvider
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReplayProvider {
    frames: HashMap<(String, Timeframe), PriceSeries>,
}

impl ReplayProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = (String, Timeframe, PriceSeries)>,
    {
        let mut provider = Self::new();
        for (symbol, tf, series) in frames {
            provider.insert(symbol, tf, series);
        }
        provider
    }

    pub fn insert(&mut self, symbol: impl Into<String>, timeframe: Timeframe, series: PriceSeries) {
        self.frames.insert((symbol.into(), timeframe), series);
    }

    /// Load every `<SYMBOL>_<TF>.json` file in `dir`. Files whose name does
    /// not end in a known timeframe are skipped.
    pub fn load_dir(dir: &Path) -> Result<Self, ProviderError> {
        let io_err = |source| ProviderError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut provider = Self::new();

        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some((symbol, tf)) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(parse_frame_name)
            else {
                debug!(path = %path.display(), "Skipping file without a timeframe suffix");
                continue;
            };

            let raw = std::fs::read_to_string(&path).map_err(|source| ProviderError::Io {
                path: path.clone(),
                source,
            })?;
            let series: PriceSeries = serde_json::from_str(&raw).map_err(|source| ProviderError::Parse {
                path: path.clone(),
                source,
            })?;
            debug!(symbol = %symbol, timeframe = %tf, bars = series.len(), "Replay frame loaded");
            provider.insert(symbol, tf, series);
        }

        info!(dir = %dir.display(), frames = provider.frames.len(), "Replay data loaded");
        Ok(provider)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.frames.keys().map(|(s, _)| s.as_str())
    }
}

/// `"XAUUSD_H4"` -> `("XAUUSD", H4)`.
fn parse_frame_name(stem: &str) -> Option<(String, Timeframe)> {
    let (symbol, tf) = stem.rsplit_once('_')?;
    if symbol.is_empty() {
        return None;
    }
    Some((symbol.to_string(), Timeframe::parse(tf)?))
}

impl MarketDataProvider for ReplayProvider {
    fn get_rates(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<PriceSeries, ProviderError> {
        let series = self
            .frames
            .get(&(symbol.to_string(), timeframe))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Unavailable {
                symbol: symbol.to_string(),
                timeframe,
            })?;
        Ok(series.clone().trimmed(count))
    }
}

// =============================================================================
// RetryingProvider
// =============================================================================

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

#[derive(Debug, Clone)]
pub struct RetryingProvider<P> {
    inner: P,
    max_retries: u32,
    min_coverage: f64,
    retry_delay: Duration,
}

impl<P: MarketDataProvider> RetryingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            max_retries: 3,
            min_coverage: 0.7,
            retry_delay: default_retry_delay(),
        }
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_min_coverage(mut self, min_coverage: f64) -> Self {
        self.min_coverage = min_coverage.clamp(0.0, 1.0);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn attempt(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<PriceSeries, ProviderError> {
        let series = self.inner.get_rates(symbol, timeframe, count)?;
        let wanted = (count as f64 * self.min_coverage).ceil() as usize;
        if series.len() < wanted {
            return Err(ProviderError::Insufficient {
                symbol: symbol.to_string(),
                timeframe,
                got: series.len(),
                wanted: count,
            });
        }
        Ok(series)
    }
}

/// Gaps between consecutive bars wider than four bar durations.
pub fn large_gaps(series: &PriceSeries, timeframe: Timeframe) -> usize {
    let limit = chrono::Duration::minutes(timeframe.minutes() * 4);
    series
        .bars()
        .windows(2)
        .filter(|w| w[1].time - w[0].time > limit)
        .count()
}

impl<P: MarketDataProvider> MarketDataProvider for RetryingProvider<P> {
    #[instrument(skip(self), name = "provider::get_rates")]
    fn get_rates(&self, symbol: &str, timeframe: Timeframe, count: usize) -> Result<PriceSeries, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.attempt(symbol, timeframe, count) {
                Ok(series) => {
                    let gaps = large_gaps(&series, timeframe);
                    if gaps > 0 {
                        warn!(symbol, timeframe = %timeframe, gaps, "Large time gaps in price data");
                    }
                    return Ok(series);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(symbol, timeframe = %timeframe, attempt, error = %e, "Price fetch failed, retrying");
                    if !self.retry_delay.is_zero() {
                        std::thread::sleep(self.retry_delay);
                    }
                }
                Err(e) => {
                    warn!(symbol, timeframe = %timeframe, attempts = attempt + 1, error = %e, "Price fetch gave up");
                    return Err(e);
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PriceBar;
    use crate::test_support::{bar, flat_series, scenario_a};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then serves `series`.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        series: PriceSeries,
    }

    impl MarketDataProvider for Flaky {
        fn get_rates(&self, symbol: &str, timeframe: Timeframe, _count: usize) -> Result<PriceSeries, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(ProviderError::Unavailable {
                    symbol: symbol.to_string(),
                    timeframe,
                });
            }
            Ok(self.series.clone())
        }
    }

    fn flaky(failures: u32, series: PriceSeries) -> Flaky {
        Flaky {
            failures,
            calls: AtomicU32::new(0),
            series,
        }
    }

    #[test]
    fn replay_serves_the_latest_bars() {
        let provider = ReplayProvider::from_frames([("XAUUSD".to_string(), Timeframe::H1, scenario_a())]);
        let s = provider.get_rates("XAUUSD", Timeframe::H1, 100).unwrap();
        assert_eq!(s.len(), 100);
        assert_eq!(s.last().unwrap().volume, 400.0);

        let err = provider.get_rates("XAUUSD", Timeframe::D1, 100).unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }));
        assert_eq!(err.to_string(), "no data for XAUUSD D1");
    }

    #[test]
    fn frame_names() {
        assert_eq!(parse_frame_name("XAUUSD_H4"), Some(("XAUUSD".to_string(), Timeframe::H4)));
        assert_eq!(parse_frame_name("US_500_d1"), Some(("US_500".to_string(), Timeframe::D1)));
        assert_eq!(parse_frame_name("XAUUSD"), None);
        assert_eq!(parse_frame_name("XAUUSD_M5"), None);
        assert_eq!(parse_frame_name("_H1"), None);
    }

    #[test]
    fn load_dir_reads_frames() {
        let dir = std::env::temp_dir().join(format!("smc_replay_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let bars: Vec<PriceBar> = scenario_a().into();
        std::fs::write(dir.join("XAUUSD_H1.json"), serde_json::to_string(&bars).unwrap()).unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.join("README.json"), "[]").unwrap();

        let provider = ReplayProvider::load_dir(&dir).unwrap();
        assert_eq!(provider.symbols().collect::<Vec<_>>(), vec!["XAUUSD"]);
        assert_eq!(provider.get_rates("XAUUSD", Timeframe::H1, 500).unwrap().len(), 150);

        std::fs::write(dir.join("BROKEN_H4.json"), "{not json").unwrap();
        assert!(matches!(ReplayProvider::load_dir(&dir), Err(ProviderError::Parse { .. })));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn retries_until_success() {
        let provider = RetryingProvider::new(flaky(2, flat_series(100))).with_retry_delay(Duration::ZERO);
        assert_eq!(provider.get_rates("X", Timeframe::H1, 100).unwrap().len(), 100);

        let provider = RetryingProvider::new(flaky(5, flat_series(100)))
            .with_retries(3)
            .with_retry_delay(Duration::ZERO);
        assert!(provider.get_rates("X", Timeframe::H1, 100).is_err());
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn short_reads_count_as_failures() {
        let provider = RetryingProvider::new(flaky(0, flat_series(60)))
            .with_retries(1)
            .with_retry_delay(Duration::ZERO);
        let err = provider.get_rates("X", Timeframe::H1, 100).unwrap_err();
        assert!(matches!(err, ProviderError::Insufficient { got: 60, wanted: 100, .. }));

        // 70 of 100 meets the default coverage.
        let provider = RetryingProvider::new(flaky(0, flat_series(70))).with_retry_delay(Duration::ZERO);
        assert!(provider.get_rates("X", Timeframe::H1, 100).is_ok());
    }

    #[test]
    fn gap_detection() {
        assert_eq!(large_gaps(&flat_series(50), Timeframe::H1), 0);
        let s = PriceSeries::new(vec![
            bar(0, 1.0, 1.0, 1.0, 1.0, 1.0),
            bar(1, 1.0, 1.0, 1.0, 1.0, 1.0),
            bar(9, 1.0, 1.0, 1.0, 1.0, 1.0),
        ]);
        assert_eq!(large_gaps(&s, Timeframe::H1), 1);
        assert_eq!(large_gaps(&s, Timeframe::H4), 0);
    }
}
