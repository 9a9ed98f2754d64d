// =============================================================================
// Break of Structure (BOS)
// =============================================================================
//
// The latest bar breaks structure when both its extreme and its close clear
// the extreme of the `lookback` bars preceding it. Follow-through (higher
// high AND higher low than the previous bar, or the bearish mirror) lifts the
// strength from 0.5 to 1.0.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::FeatureDetector;
use crate::market_data::PriceSeries;
use crate::types::Direction;

/// Extra bars required beyond the lookback window.
const STRUCTURE_MARGIN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureBreak {
    pub confirmed: bool,
    pub direction: Option<Direction>,
    pub strength: f64,
}

impl StructureBreak {
    pub fn none() -> Self {
        Self {
            confirmed: false,
            direction: None,
            strength: 0.0,
        }
    }

    /// True when a break was confirmed in `direction`.
    pub fn confirms(&self, direction: Direction) -> bool {
        self.confirmed && self.direction == Some(direction)
    }
}

impl FeatureDetector {
    /// Break-of-structure check on the latest bar.
    pub fn structure_break(&self, series: &PriceSeries) -> StructureBreak {
        let lookback = self.config.structure_lookback;
        let bars = series.bars();
        if lookback == 0 || bars.len() < lookback + STRUCTURE_MARGIN {
            return StructureBreak::none();
        }

        let n = bars.len();
        let current = &bars[n - 1];
        let previous = &bars[n - 2];
        let window = &bars[n - 1 - lookback..n - 1];

        let resistance = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let support = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

        let bos_up = current.high > resistance && current.close > resistance;
        let bos_down = current.low < support && current.close < support;

        let result = if bos_up {
            let follow_through = current.high > previous.high && current.low > previous.low;
            StructureBreak {
                confirmed: true,
                direction: Some(Direction::Bullish),
                strength: if follow_through { 1.0 } else { 0.5 },
            }
        } else if bos_down {
            let follow_through = current.high < previous.high && current.low < previous.low;
            StructureBreak {
                confirmed: true,
                direction: Some(Direction::Bearish),
                strength: if follow_through { 1.0 } else { 0.5 },
            }
        } else {
            StructureBreak::none()
        };

        trace!(
            resistance = format!("{:.5}", resistance),
            support = format!("{:.5}", support),
            confirmed = result.confirmed,
            "Structure check"
        );

        result
    }
}
