// =============================================================================
// Institutional Flow Gate
// =============================================================================
//
// A block trade is a bar with both
//   volume_ratio >= volume_threshold   (20-bar rolling mean, inclusive)
//   body / ATR   >= atr_threshold
//
//   strength = min(2, 0.6 * volume_ratio + 0.4 * body/ATR)
//
// Blocks are kept per symbol in a rolling window keyed by bar timestamp, so
// re-observing the same bars is idempotent. Each update evicts blocks older
// than the last `window_bars` bars. Only blocks from the last `alignment_bars`
// vote:
//
//   score = 0.6 * (matching count / count) + 0.4 * (matching strength / strength)

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GateKind, GateResult, NEUTRAL_SCORE};
use crate::indicators::atr::atr_series;
use crate::indicators::volume::{volume_ratio, VOLUME_WINDOW};
use crate::market_data::PriceSeries;
use crate::types::Side;

const ATR_PERIOD: usize = 14;
const ALIGNED_SCORE: f64 = 0.6;

// =============================================================================
// Configuration
// =============================================================================

fn default_volume_threshold() -> f64 {
    2.0
}

fn default_atr_threshold() -> f64 {
    1.0
}

fn default_window_bars() -> usize {
    10
}

fn default_alignment_bars() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: f64,
    #[serde(default = "default_atr_threshold")]
    pub atr_threshold: f64,
    /// Blocks older than this many bars are evicted.
    #[serde(default = "default_window_bars")]
    pub window_bars: usize,
    /// Blocks within this many bars vote on alignment.
    #[serde(default = "default_alignment_bars")]
    pub alignment_bars: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            volume_threshold: default_volume_threshold(),
            atr_threshold: default_atr_threshold(),
            window_bars: default_window_bars(),
            alignment_bars: default_alignment_bars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTrade {
    pub time: DateTime<Utc>,
    pub side: Side,
    pub volume_ratio: f64,
    pub body_atr: f64,
    pub strength: f64,
    pub price: f64,
}

// =============================================================================
// FlowGate
// =============================================================================

#[derive(Debug, Default)]
pub struct FlowGate {
    config: FlowConfig,
    windows: HashMap<String, VecDeque<BlockTrade>>,
}

impl FlowGate {
    pub fn new(config: FlowConfig) -> Self {
        Self {
            config,
            windows: HashMap::new(),
        }
    }

    /// Block trades among the last `window_bars` bars of `series`.
    pub fn detect_blocks(&self, series: &PriceSeries) -> Vec<BlockTrade> {
        let bars = series.bars();
        let start = VOLUME_WINDOW.max(bars.len().saturating_sub(self.config.window_bars));
        if start >= bars.len() {
            return Vec::new();
        }
        let atr = atr_series(bars, ATR_PERIOD);

        (start..bars.len())
            .filter_map(|i| {
                let vr = volume_ratio(bars, i, VOLUME_WINDOW);
                if vr < self.config.volume_threshold {
                    return None;
                }
                let a = atr[i];
                if !a.is_finite() || a <= 0.0 {
                    return None;
                }
                let bar = &bars[i];
                let body_atr = bar.body() / a;
                if body_atr < self.config.atr_threshold {
                    return None;
                }
                Some(BlockTrade {
                    time: bar.time,
                    side: if bar.close > bar.open { Side::Buy } else { Side::Sell },
                    volume_ratio: vr,
                    body_atr,
                    strength: (vr * 0.6 + body_atr * 0.4).min(2.0),
                    price: bar.close,
                })
            })
            .collect()
    }

    /// Fold the latest bars of `symbol` into its window and evict stale blocks.
    pub fn observe(&mut self, symbol: &str, series: &PriceSeries) {
        let detected = self.detect_blocks(series);
        let bars = series.bars();
        let window = self.windows.entry(symbol.to_string()).or_default();

        for block in detected {
            if window.iter().all(|b| b.time != block.time) {
                let pos = window.partition_point(|b| b.time < block.time);
                window.insert(pos, block);
            }
        }

        if self.config.window_bars > 0 && bars.len() >= self.config.window_bars {
            let cutoff = bars[bars.len() - self.config.window_bars].time;
            while window.front().is_some_and(|b| b.time < cutoff) {
                window.pop_front();
            }
        }

        debug!(symbol, blocks = window.len(), "Flow window updated");
    }

    /// Blocks currently held for `symbol`, oldest first.
    pub fn window(&self, symbol: &str) -> impl Iterator<Item = &BlockTrade> {
        self.windows.get(symbol).into_iter().flatten()
    }

    /// Alignment of recent blocks with a trade on `side`.
    pub fn evaluate(&self, symbol: &str, side: Side, series: &PriceSeries) -> GateResult {
        let bars = series.bars();
        if bars.is_empty() {
            return GateResult::unavailable(GateKind::Flow, "Flow: no price data");
        }

        let from = bars[bars.len().saturating_sub(self.config.alignment_bars.max(1))].time;
        let recent: Vec<&BlockTrade> = self.window(symbol).filter(|b| b.time >= from).collect();
        if recent.is_empty() {
            return GateResult::new(
                GateKind::Flow,
                true,
                NEUTRAL_SCORE,
                vec!["Flow: no recent block trades".to_string()],
            );
        }

        let matching: Vec<&&BlockTrade> = recent.iter().filter(|b| b.side == side).collect();
        let count_ratio = matching.len() as f64 / recent.len() as f64;
        let total_strength: f64 = recent.iter().map(|b| b.strength).sum();
        let matching_strength: f64 = matching.iter().map(|b| b.strength).sum();
        let strength_ratio = if total_strength > 0.0 {
            matching_strength / total_strength
        } else {
            0.0
        };

        let score = count_ratio * 0.6 + strength_ratio * 0.4;
        let aligned = score >= ALIGNED_SCORE;

        let mut notes = vec![
            format!("Flow: {}/{} blocks aligned", matching.len(), recent.len()),
            format!("Flow: {:.0}% of strength aligned", strength_ratio * 100.0),
        ];
        if let Some(best) = matching.iter().max_by(|a, b| a.strength.total_cmp(&b.strength)) {
            notes.push(format!("Flow: strongest {} block ({:.2})", best.side, best.strength));
        }

        debug!(
            symbol,
            side = %side,
            score = format!("{:.2}", score),
            aligned,
            blocks = recent.len(),
            "Flow gate evaluated"
        );
        GateResult::new(GateKind::Flow, aligned, score, notes)
    }
}
