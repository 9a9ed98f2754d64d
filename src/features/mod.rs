// =============================================================================
// Feature Detection Module
// =============================================================================
//
// Smart-money building blocks computed from an immutable price window:
// - ATR (volatility normaliser)
// - Break of structure
// - Order blocks and best-block selection across timeframes
// - Liquidity zones and liquidity grabs
// - FU (fakeout) candles
// - Imbalances / fair value gaps
//
// `FeatureDetector` is stateless apart from its thresholds. One instance is
// built at startup and shared by the scorer and the pipeline.

pub mod fu_candle;
pub mod imbalance;
pub mod liquidity;
pub mod order_block;
pub mod structure;

use serde::{Deserialize, Serialize};

use crate::indicators::atr::atr_series;
use crate::market_data::PriceSeries;

pub use fu_candle::FuCandle;
pub use imbalance::Imbalance;
pub use liquidity::{GrabKind, LiquidityGrab, LiquidityKind, LiquidityZone};
pub use order_block::OrderBlock;
pub use structure::StructureBreak;

// =============================================================================
// Configuration
// =============================================================================

fn default_min_displacement() -> f64 {
    2.0
}

fn default_fu_body_atr() -> f64 {
    0.8
}

fn default_fu_close_frac() -> f64 {
    0.6
}

fn default_min_gap_size() -> f64 {
    0.0002
}

fn default_structure_lookback() -> usize {
    10
}

fn default_atr_period() -> usize {
    14
}

fn default_ob_search_bars() -> usize {
    15
}

/// Detector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum displacement for a bar to count as an impulse.
    #[serde(default = "default_min_displacement")]
    pub min_displacement: f64,

    /// FU candle body must be at least this many ATRs.
    #[serde(default = "default_fu_body_atr")]
    pub fu_body_atr: f64,

    /// Bullish FU must close in the top `fu_close_frac` of its range
    /// (bearish mirrored).
    #[serde(default = "default_fu_close_frac")]
    pub fu_close_frac: f64,

    /// Minimum price gap for an imbalance.
    #[serde(default = "default_min_gap_size")]
    pub min_gap_size: f64,

    /// Bars preceding the latest bar that define structure extremes.
    #[serde(default = "default_structure_lookback")]
    pub structure_lookback: usize,

    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// How far back an impulse may look for its opposite candle.
    #[serde(default = "default_ob_search_bars")]
    pub ob_search_bars: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_displacement: default_min_displacement(),
            fu_body_atr: default_fu_body_atr(),
            fu_close_frac: default_fu_close_frac(),
            min_gap_size: default_min_gap_size(),
            structure_lookback: default_structure_lookback(),
            atr_period: default_atr_period(),
            ob_search_bars: default_ob_search_bars(),
        }
    }
}

// =============================================================================
// FeatureDetector
// =============================================================================

/// Stateless detector. The individual detections live in the submodules as
/// additional `impl FeatureDetector` blocks.
#[derive(Debug, Clone, Default)]
pub struct FeatureDetector {
    config: DetectorConfig,
}

impl FeatureDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// ATR series aligned with the bars of `series` (NaN during warm-up).
    pub fn atr(&self, series: &PriceSeries) -> Vec<f64> {
        atr_series(series.bars(), self.config.atr_period)
    }

    /// Latest ATR, only when finite and strictly positive.
    pub fn usable_atr(&self, series: &PriceSeries) -> Option<f64> {
        self.atr(series)
            .last()
            .copied()
            .filter(|v| v.is_finite() && *v > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{flat_series, scenario_a};

    #[test]
    fn empty_json_uses_defaults() {
        let cfg: DetectorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.min_displacement, 2.0);
        assert_eq!(cfg.fu_body_atr, 0.8);
        assert_eq!(cfg.fu_close_frac, 0.6);
        assert_eq!(cfg.structure_lookback, 10);
        assert_eq!(cfg.ob_search_bars, 15);
    }

    #[test]
    fn usable_atr_rejects_degenerate_series() {
        let detector = FeatureDetector::default();
        assert!(detector.usable_atr(&flat_series(50)).is_none());
        assert!(detector.usable_atr(&PriceSeries::default()).is_none());
        let atr = detector.usable_atr(&scenario_a()).unwrap();
        assert!((atr - 5.75 / 14.0).abs() < 1e-9);
    }

    #[test]
    fn every_detector_abstains_on_short_input() {
        let detector = FeatureDetector::default();
        let short = scenario_a().trimmed(8);
        assert!(!detector.structure_break(&short).confirmed);
        assert!(detector.order_blocks(&short, crate::types::Timeframe::H1).is_empty());
        assert!(detector.liquidity_zones(&short, crate::types::Timeframe::H1).is_empty());
        assert!(detector.liquidity_grab(&short).is_none());
        assert!(detector.fu_candle(&short).is_none());
        assert!(detector.imbalances(&short).is_empty());
    }
}
