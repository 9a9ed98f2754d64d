pub mod series;

// Re-export for convenient access (e.g. `use crate::market_data::PriceBar`).
pub use series::{PriceBar, PriceSeries};
