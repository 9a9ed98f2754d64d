// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator math shared by the feature detector, the
// regime classifier and the alignment gates. Insufficient data surfaces as
// `None`, an empty vec, or NaN warm-up slots, never as a panic.

pub mod atr;
pub mod ema;
pub mod rsi;
pub mod volume;

pub use atr::{atr_series, latest_atr};
pub use ema::calculate_ema;
pub use rsi::calculate_rsi;
pub use volume::{volume_ratio, VOLUME_WINDOW};
