// =============================================================================
// Regime Detection Module
// =============================================================================
//
// Market regime classification from volatility, trend and momentum readings,
// and the adaptive parameter set each regime maps to.

pub mod classifier;
pub mod params;

pub use classifier::{
    MomentumKind, MomentumState, RegimeClassifier, RegimeComponents, RegimeInfo, RegimeKind, TrendKind, TrendState,
    VolatilityKind, VolatilityState,
};
pub use params::{adaptive_params, AdaptiveParams};
