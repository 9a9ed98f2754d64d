// =============================================================================
// Adaptive parameters per regime
// =============================================================================

use serde::{Deserialize, Serialize};

use super::RegimeKind;

/// Trading thresholds that adapt to the classified regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveParams {
    /// Minimum integer score (1-10) a setup needs.
    pub score_threshold: u8,
    /// Scales the R multiples of the take-profit ladder.
    pub risk_multiplier: f64,
    /// Scales the per-trade risk allocation.
    pub position_size_multiplier: f64,
    pub max_trades_per_day: u32,
}

impl AdaptiveParams {
    pub const BASELINE: AdaptiveParams = AdaptiveParams {
        score_threshold: 6,
        risk_multiplier: 1.0,
        position_size_multiplier: 1.0,
        max_trades_per_day: 3,
    };

    /// Used when the regime cannot be classified.
    pub const CONSERVATIVE: AdaptiveParams = AdaptiveParams {
        score_threshold: 8,
        risk_multiplier: 0.5,
        position_size_multiplier: 0.5,
        max_trades_per_day: 1,
    };
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self::BASELINE
    }
}

/// Deterministic lookup from regime to its parameter set.
pub fn adaptive_params(kind: RegimeKind) -> AdaptiveParams {
    match kind {
        RegimeKind::HighVolatility => AdaptiveParams {
            score_threshold: 8,
            risk_multiplier: 0.5,
            position_size_multiplier: 0.7,
            max_trades_per_day: 2,
        },
        RegimeKind::ExtremeLowVolatility => AdaptiveParams {
            score_threshold: 7,
            risk_multiplier: 0.8,
            position_size_multiplier: 1.2,
            max_trades_per_day: 4,
        },
        RegimeKind::TrendingBullish => AdaptiveParams {
            score_threshold: 6,
            risk_multiplier: 1.2,
            position_size_multiplier: 1.1,
            max_trades_per_day: 5,
        },
        RegimeKind::TrendingBearish => AdaptiveParams {
            score_threshold: 6,
            risk_multiplier: 1.1,
            position_size_multiplier: 1.1,
            max_trades_per_day: 5,
        },
        RegimeKind::RangingMarket => AdaptiveParams {
            score_threshold: 7,
            risk_multiplier: 0.9,
            position_size_multiplier: 0.9,
            max_trades_per_day: 3,
        },
        RegimeKind::MixedRegime => AdaptiveParams::BASELINE,
        RegimeKind::Unknown => AdaptiveParams::CONSERVATIVE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_volatility_tightens_everything() {
        let p = adaptive_params(RegimeKind::HighVolatility);
        assert_eq!(p.score_threshold, 8);
        assert_eq!(p.risk_multiplier, 0.5);
        assert_eq!(p.position_size_multiplier, 0.7);
        assert_eq!(p.max_trades_per_day, 2);
    }

    #[test]
    fn mixed_is_baseline_and_unknown_is_conservative() {
        assert_eq!(adaptive_params(RegimeKind::MixedRegime), AdaptiveParams::BASELINE);
        let unknown = adaptive_params(RegimeKind::Unknown);
        assert!(unknown.score_threshold >= AdaptiveParams::BASELINE.score_threshold);
        assert!(unknown.position_size_multiplier < 1.0);
    }
}
