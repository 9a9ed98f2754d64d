// =============================================================================
// Signal Pipeline: one accept/reject decision per symbol per cycle
// =============================================================================
//
// Stage order (any rejection short-circuits the rest):
//
//   RegimeDetect -> FeatureDetect -> Score -> AdaptiveThresholdCheck -> Dedup
//   -> NewsBlackoutCheck -> CorrelationGate -> FlowGate -> SessionGate
//   -> AdaptiveSizing -> Emit
//
// The regime is classified once per cycle from the reference symbol. Each
// symbol then runs to completion before the next one starts, and open-signal
// outcomes are checked against its latest H1 bar.
//
// The flow window is the only state carried between cycles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::decision::{DecisionRecord, RejectReason, Stage};
use super::outcome::track_outcomes;
use super::sizing::{adaptive_risk, SizingInputs};
use crate::config::EngineConfig;
use crate::features::FeatureDetector;
use crate::gates::correlation::ASSET_TIMEFRAME;
use crate::gates::{CorrelationGate, FlowGate, GateResult, SessionGate};
use crate::market_data::PriceSeries;
use crate::ports::{MarketDataProvider, NewsCalendar, Notifier, SignalStore, StoreError};
use crate::regime::{RegimeClassifier, RegimeInfo};
use crate::scoring::{CompositeScorer, ScoreInput};
use crate::signal::{dedup_hash, Signal, TradeLevels};
use crate::types::Timeframe;

/// Timeframe signals are entered on.
const ENTRY_TIMEFRAME: Timeframe = Timeframe::H1;

/// D1, H4 and H1 snapshots of one symbol.
#[derive(Debug, Clone)]
pub struct Frames {
    pub d1: PriceSeries,
    pub h4: PriceSeries,
    pub h1: PriceSeries,
}

/// Collaborators the pipeline talks to.
#[derive(Clone)]
pub struct Ports {
    pub provider: Arc<dyn MarketDataProvider>,
    pub store: Arc<dyn SignalStore>,
    pub calendar: Arc<dyn NewsCalendar>,
    pub notifier: Arc<dyn Notifier>,
}

/// Everything one cycle produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub regime: RegimeInfo,
    pub decisions: Vec<DecisionRecord>,
    /// Outcomes newly recorded during the cycle.
    pub outcomes: usize,
}

impl CycleReport {
    pub fn accepted(&self) -> impl Iterator<Item = &Signal> {
        self.decisions.iter().filter_map(|d| d.signal.as_ref())
    }
}

pub struct SignalPipeline {
    config: EngineConfig,
    detector: Arc<FeatureDetector>,
    classifier: RegimeClassifier,
    scorer: CompositeScorer,
    correlation: CorrelationGate,
    flow: FlowGate,
    session: SessionGate,
    ports: Ports,
}

impl SignalPipeline {
    pub fn new(config: EngineConfig, ports: Ports) -> Self {
        let detector = Arc::new(FeatureDetector::new(config.detector.clone()));
        Self {
            scorer: CompositeScorer::new(Arc::clone(&detector)),
            classifier: RegimeClassifier::new(),
            correlation: CorrelationGate::new(config.correlation.clone()),
            flow: FlowGate::new(config.flow.clone()),
            session: SessionGate::new(),
            detector,
            config,
            ports,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn flow_gate(&self) -> &FlowGate {
        &self.flow
    }

    // -------------------------------------------------------------------------
    // Cycle
    // -------------------------------------------------------------------------

    /// Run every configured symbol once. Never fails: per-symbol problems are
    /// logged and recorded as rejections.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let regime = self.detect_regime();
        let symbols = self.config.symbols.clone();
        let mut decisions = Vec::with_capacity(symbols.len());
        let mut outcomes = 0;

        for symbol in &symbols {
            let frames = match self.fetch_frames(symbol) {
                Ok(frames) => frames,
                Err(reason) => {
                    error!(symbol = %symbol, reason = %reason, "Symbol skipped this cycle");
                    decisions.push(DecisionRecord::rejected(symbol.as_str(), Stage::FeatureDetect, reason, now));
                    continue;
                }
            };

            decisions.push(self.evaluate_frames(symbol, &frames, &regime, now));

            if let Some(last) = frames.h1.last() {
                outcomes += track_outcomes(self.ports.store.as_ref(), symbol, last);
            }
        }

        let accepted = decisions.iter().filter(|d| d.is_accepted()).count();
        info!(
            regime = %regime.kind,
            symbols = symbols.len(),
            accepted,
            outcomes,
            "Cycle complete"
        );
        CycleReport {
            regime,
            decisions,
            outcomes,
        }
    }

    /// Regime of the reference symbol, or the conservative unknown regime
    /// when its data cannot be had.
    pub fn detect_regime(&self) -> RegimeInfo {
        let Some(symbol) = self.config.regime_symbol() else {
            warn!("No regime symbol configured");
            return RegimeInfo::unknown();
        };
        match self.fetch_frames(symbol) {
            Ok(f) => self.classifier.classify(&f.d1, &f.h4, &f.h1),
            Err(reason) => {
                warn!(symbol, reason = %reason, "Regime data unavailable, using conservative defaults");
                RegimeInfo::unknown()
            }
        }
    }

    pub fn fetch_frames(&self, symbol: &str) -> Result<Frames, RejectReason> {
        let fetch = |tf: Timeframe| -> Result<PriceSeries, RejectReason> {
            let series = self
                .ports
                .provider
                .get_rates(symbol, tf, self.config.lookback)
                .map_err(|e| RejectReason::DataUnavailable {
                    timeframe: tf,
                    detail: e.to_string(),
                })?;
            if series.len() < self.config.min_bars {
                warn!(symbol, timeframe = %tf, bars = series.len(), need = self.config.min_bars, "Insufficient history");
                return Err(RejectReason::DataInsufficient {
                    timeframe: tf,
                    got: series.len(),
                    need: self.config.min_bars,
                });
            }
            Ok(series)
        };
        Ok(Frames {
            d1: fetch(Timeframe::D1)?,
            h4: fetch(Timeframe::H4)?,
            h1: fetch(Timeframe::H1)?,
        })
    }

    /// Fetch and evaluate one symbol.
    pub fn evaluate_symbol(&mut self, symbol: &str, regime: &RegimeInfo, now: DateTime<Utc>) -> DecisionRecord {
        match self.fetch_frames(symbol) {
            Ok(frames) => self.evaluate_frames(symbol, &frames, regime, now),
            Err(reason) => DecisionRecord::rejected(symbol, Stage::FeatureDetect, reason, now),
        }
    }

    // -------------------------------------------------------------------------
    // Stages
    // -------------------------------------------------------------------------

    pub fn evaluate_frames(
        &mut self,
        symbol: &str,
        frames: &Frames,
        regime: &RegimeInfo,
        now: DateTime<Utc>,
    ) -> DecisionRecord {
        let reject = |stage: Stage, reason: RejectReason| {
            debug!(symbol, stage = %stage, reason = %reason, "Candidate rejected");
            DecisionRecord::rejected(symbol, stage, reason, now)
        };

        // --- FeatureDetect ----------------------------------------------------
        self.flow.observe(symbol, &frames.h1);

        let detector = &self.detector;
        let Some(ob) = detector.best_order_block(
            &detector.order_blocks(&frames.h4, Timeframe::H4),
            &detector.order_blocks(&frames.h1, Timeframe::H1),
        ) else {
            return reject(Stage::FeatureDetect, RejectReason::NoOrderBlock);
        };
        let fu = detector.fu_candle(&frames.h1);
        let zones = detector.liquidity_zones(&frames.h1, Timeframe::H1);

        let atr = detector.usable_atr(&frames.h1).unwrap_or(f64::NAN);
        let trading = &self.config.trading;
        let Some(levels) = TradeLevels::from_order_block(
            &ob,
            atr,
            trading.stop_atr_buffer,
            &trading.risk_r_multiples,
            regime.params.risk_multiplier,
            trading.decimals_for(symbol),
        ) else {
            return reject(
                Stage::FeatureDetect,
                RejectReason::Degenerate(format!("ATR {:.5} gives no usable stop", atr)),
            );
        };

        // --- Score ------------------------------------------------------------
        let card = self.scorer.score(&ScoreInput {
            d1: &frames.d1,
            h4: &frames.h4,
            h1: &frames.h1,
            order_block: &ob,
            fu: fu.as_ref(),
            zones: &zones,
        });

        // --- AdaptiveThresholdCheck -------------------------------------------
        let threshold = regime.params.score_threshold.max(trading.min_score);
        if card.score < threshold {
            return reject(
                Stage::AdaptiveThresholdCheck,
                RejectReason::BelowThreshold {
                    score: card.score,
                    threshold,
                },
            );
        }

        // --- Dedup --------------------------------------------------------------
        let hash = dedup_hash(symbol, ENTRY_TIMEFRAME, levels.side, levels.entry);
        if self.ports.store.is_duplicate(&hash) {
            return reject(Stage::Dedup, RejectReason::Duplicate(hash));
        }

        // --- NewsBlackoutCheck ------------------------------------------------
        if self.config.news.enabled {
            let status = self.ports.calendar.is_blackout(self.config.currencies_for(symbol), now);
            if status.active {
                let event = status.event.map(|e| e.name).unwrap_or_default();
                warn!(symbol, event = %event, minutes_remaining = status.minutes_remaining, "News blackout");
                return reject(
                    Stage::NewsBlackoutCheck,
                    RejectReason::NewsBlackout {
                        event,
                        minutes_remaining: status.minutes_remaining,
                    },
                );
            }
        }

        let mut gates: Vec<GateResult> = Vec::with_capacity(3);

        // --- CorrelationGate ----------------------------------------------------
        let correlation_score = if trading.correlation_checks {
            let provider = &self.ports.provider;
            let lookback = self.config.lookback;
            let result = self.correlation.evaluate(levels.side, |asset| {
                provider
                    .get_rates(&asset.symbol, ASSET_TIMEFRAME, lookback)
                    .map_err(|e| debug!(asset = %asset.name, error = %e, "Correlated asset unavailable"))
                    .ok()
            });
            if result.vetoes() {
                return reject(
                    Stage::CorrelationGate,
                    RejectReason::GateVeto {
                        gate: result.gate,
                        score: result.score,
                    },
                );
            }
            let score = result.score;
            gates.push(result);
            Some(score)
        } else {
            None
        };

        // --- FlowGate -----------------------------------------------------------
        let flow_score = if trading.flow_checks {
            let result = self.flow.evaluate(symbol, levels.side, &frames.h1);
            if result.vetoes() {
                return reject(
                    Stage::FlowGate,
                    RejectReason::GateVeto {
                        gate: result.gate,
                        score: result.score,
                    },
                );
            }
            let score = result.score;
            gates.push(result);
            Some(score)
        } else {
            None
        };

        // --- SessionGate (advisory) ---------------------------------------------
        let session_score = if trading.session_aware {
            let result = self.session.evaluate(now, card.score, &card.notes);
            let score = result.score;
            gates.push(result);
            Some(score)
        } else {
            None
        };

        // --- AdaptiveSizing -----------------------------------------------------
        let risk = adaptive_risk(&SizingInputs {
            base_risk: trading.risk_per_trade,
            regime_multiplier: regime.params.position_size_multiplier,
            score: card.score,
            correlation: correlation_score,
            flow: flow_score,
            session: session_score,
        });
        let position_size_multiplier = if trading.risk_per_trade > 0.0 {
            risk / trading.risk_per_trade
        } else {
            0.0
        };

        // --- Emit ---------------------------------------------------------------
        let mut signal = Signal {
            id: None,
            symbol: symbol.to_string(),
            timeframe: ENTRY_TIMEFRAME,
            side: levels.side,
            entry: levels.entry,
            stop_loss: levels.stop_loss,
            take_profits: levels.take_profits,
            risk: levels.risk,
            score: card.score,
            breakdown: card.breakdown,
            notes: card.notes,
            quality: card.quality,
            ob_timeframe: ob.timeframe,
            regime: regime.clone(),
            gates,
            risk_percent: risk * 100.0,
            position_size_multiplier,
            created_at: now,
            dedup_hash: hash,
        };

        match self.ports.store.save(&signal) {
            Ok(id) => signal.id = Some(id),
            Err(StoreError::Duplicate(hash)) => return reject(Stage::Emit, RejectReason::Duplicate(hash)),
            Err(e) => {
                warn!(symbol, error = %e, "Store rejected signal");
                return reject(Stage::Emit, RejectReason::StoreRejected(e.to_string()));
            }
        }

        if let Err(e) = self.ports.notifier.notify(&signal, None) {
            warn!(symbol, error = %format!("{:#}", e), "Notification failed");
        }

        info!(
            symbol,
            side = %signal.side,
            score = signal.score,
            entry = signal.entry,
            stop = signal.stop_loss,
            risk_pct = format!("{:.2}", signal.risk_percent),
            regime = %signal.regime.kind,
            "Signal accepted"
        );
        DecisionRecord::accepted(symbol, signal, now)
    }
}
