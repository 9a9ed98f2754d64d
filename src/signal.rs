// =============================================================================
// Signal: the emitted trade idea
// =============================================================================
//
// Levels from an order block:
//
//   entry = OB body mid
//   stop  = wick low  - buffer * ATR     (BUY)
//           wick high + buffer * ATR     (SELL)
//   risk  = |entry - stop|
//   TP_k  = entry +/- risk * r_k * clamp(regime risk multiplier, 0.5, 2.0)
//
// Prices are rounded to the symbol's decimals after the levels are computed,
// and levels that rounding folds together are refused. The dedup hash is SHA-256 over "symbol:tf:side:entry".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::features::OrderBlock;
use crate::gates::{GateKind, GateResult};
use crate::regime::RegimeInfo;
use crate::scoring::{QualityRating, ScoreBreakdown};
use crate::types::{Side, Timeframe};

/// Deterministic dedup identity of a signal.
pub fn dedup_hash(symbol: &str, timeframe: Timeframe, side: Side, entry: f64) -> String {
    let key = format!("{}:{}:{}:{:.5}", symbol, timeframe, side, entry);
    hex::encode(Sha256::digest(key.as_bytes()))
}

pub fn round_price(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Entry, stop and take-profit ladder for one order block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub side: Side,
    pub entry: f64,
    pub stop_loss: f64,
    /// Ordered away from entry.
    pub take_profits: Vec<f64>,
    pub risk: f64,
}

impl TradeLevels {
    /// `None` when the ATR is unusable or the stop sits on the entry.
    pub fn from_order_block(
        ob: &OrderBlock,
        atr: f64,
        stop_atr_buffer: f64,
        r_multiples: &[f64],
        risk_multiplier: f64,
        decimals: u32,
    ) -> Option<Self> {
        if !atr.is_finite() || atr < 0.0 {
            return None;
        }
        let side = ob.direction.side();
        let entry = ob.body_mid();
        let stop = match side {
            Side::Buy => ob.wick_low - stop_atr_buffer * atr,
            Side::Sell => ob.wick_high + stop_atr_buffer * atr,
        };
        let risk = (entry - stop).abs();
        if !risk.is_finite() || risk <= 0.0 {
            return None;
        }

        let scale = risk_multiplier.clamp(0.5, 2.0);
        let mut multiples: Vec<f64> = r_multiples.iter().copied().filter(|r| r.is_finite() && *r > 0.0).collect();
        multiples.sort_by(|a, b| a.total_cmp(b));
        multiples.dedup();
        let take_profits: Vec<f64> = multiples
            .iter()
            .map(|r| round_price(entry + side.sign() * risk * r * scale, decimals))
            .collect();
        let entry = round_price(entry, decimals);
        let stop_loss = round_price(stop, decimals);

        // Rounding can collapse levels quoted finer than `decimals`.
        if !ordered_away(side, stop_loss, entry, &take_profits) {
            return None;
        }

        Some(Self {
            side,
            entry,
            stop_loss,
            take_profits,
            risk,
        })
    }
}

/// Stop strictly behind the entry and every TP strictly beyond the previous level.
fn ordered_away(side: Side, stop: f64, entry: f64, take_profits: &[f64]) -> bool {
    let sign = side.sign();
    if (entry - stop) * sign <= 0.0 {
        return false;
    }
    let mut prev = entry;
    for &tp in take_profits {
        if (tp - prev) * sign <= 0.0 {
            return false;
        }
        prev = tp;
    }
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Assigned by the store on save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub side: Side,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profits: Vec<f64>,
    pub risk: f64,
    pub score: u8,
    pub breakdown: ScoreBreakdown,
    pub notes: Vec<String>,
    pub quality: QualityRating,
    pub ob_timeframe: Timeframe,
    pub regime: RegimeInfo,
    #[serde(default)]
    pub gates: Vec<GateResult>,
    /// Final risk allocation, percent of the account risk unit.
    pub risk_percent: f64,
    pub position_size_multiplier: f64,
    pub created_at: DateTime<Utc>,
    pub dedup_hash: String,
}

impl Signal {
    /// Take-profit `level` (1-based).
    pub fn take_profit(&self, level: usize) -> Option<f64> {
        level.checked_sub(1).and_then(|i| self.take_profits.get(i)).copied()
    }

    pub fn gate(&self, kind: GateKind) -> Option<&GateResult> {
        self.gates.iter().find(|g| g.gate == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn block(direction: Direction) -> OrderBlock {
        OrderBlock {
            index: 125,
            direction,
            body_low: 125.2,
            body_high: 125.6,
            wick_low: 125.1,
            wick_high: 125.7,
            timeframe: Timeframe::H4,
            displacement: 4.0,
            volume: 200.0,
            volume_ratio: 1.9,
            quality: 0.98,
        }
    }

    #[test]
    fn buy_levels() {
        let l = TradeLevels::from_order_block(&block(Direction::Bullish), 0.4, 0.25, &[3.0, 1.0, 2.0], 1.0, 2).unwrap();
        assert_eq!(l.side, Side::Buy);
        assert_eq!(l.entry, 125.4);
        assert_eq!(l.stop_loss, 125.0);
        assert!((l.risk - 0.4).abs() < 1e-9);
        assert_eq!(l.take_profits, vec![125.8, 126.2, 126.6]);
    }

    #[test]
    fn sell_levels_mirror_and_scale() {
        let l = TradeLevels::from_order_block(&block(Direction::Bearish), 0.4, 0.25, &[1.0, 2.0], 5.0, 2).unwrap();
        assert_eq!(l.side, Side::Sell);
        assert_eq!(l.stop_loss, 125.8);
        // Multiplier clamps to 2.0: TP1 = 125.4 - 0.4 * 2
        assert_eq!(l.take_profits, vec![124.6, 123.8]);
        assert!(l.take_profits.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn degenerate_levels_are_rejected() {
        let mut ob = block(Direction::Bullish);
        assert!(TradeLevels::from_order_block(&ob, f64::NAN, 0.25, &[1.0], 1.0, 2).is_none());
        ob.body_low = 125.1;
        ob.body_high = 125.1;
        assert!(TradeLevels::from_order_block(&ob, 0.0, 0.25, &[1.0], 1.0, 2).is_none());
    }

    #[test]
    fn levels_collapsed_by_rounding_are_rejected() {
        let ob = OrderBlock {
            body_low: 1.0851,
            body_high: 1.0853,
            wick_low: 1.0850,
            wick_high: 1.0854,
            ..block(Direction::Bullish)
        };
        // Two decimals fold entry and every TP onto 1.09.
        assert!(TradeLevels::from_order_block(&ob, 0.0002, 0.25, &[1.0, 2.0, 3.0], 1.0, 2).is_none());

        let l = TradeLevels::from_order_block(&ob, 0.0002, 0.25, &[1.0, 2.0, 3.0], 1.0, 5).unwrap();
        assert!(l.stop_loss < l.entry);
        assert!(l.take_profits[0] > l.entry);
        assert!(l.take_profits.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn hash_is_stable_and_identity_sensitive() {
        let a = dedup_hash("XAUUSD", Timeframe::H1, Side::Buy, 125.4);
        assert_eq!(a, dedup_hash("XAUUSD", Timeframe::H1, Side::Buy, 125.4));
        assert_eq!(a.len(), 64);
        assert_ne!(a, dedup_hash("XAUUSD", Timeframe::H1, Side::Sell, 125.4));
        assert_ne!(a, dedup_hash("XAUUSD", Timeframe::H1, Side::Buy, 125.41));
    }
}
