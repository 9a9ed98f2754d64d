// =============================================================================
// Decision Record: auditable outcome of one symbol evaluation
// =============================================================================
//
// Every evaluation ends in exactly one terminal state: ACCEPTED with a signal,
// or REJECTED with a reason. The record names the last stage reached so a
// rejection can be traced to the stage that produced it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::gates::GateKind;
use crate::signal::Signal;
use crate::types::Timeframe;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    RegimeDetect,
    FeatureDetect,
    Score,
    AdaptiveThresholdCheck,
    Dedup,
    NewsBlackoutCheck,
    CorrelationGate,
    FlowGate,
    SessionGate,
    AdaptiveSizing,
    Emit,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RegimeDetect => "REGIME_DETECT",
            Self::FeatureDetect => "FEATURE_DETECT",
            Self::Score => "SCORE",
            Self::AdaptiveThresholdCheck => "ADAPTIVE_THRESHOLD_CHECK",
            Self::Dedup => "DEDUP",
            Self::NewsBlackoutCheck => "NEWS_BLACKOUT_CHECK",
            Self::CorrelationGate => "CORRELATION_GATE",
            Self::FlowGate => "FLOW_GATE",
            Self::SessionGate => "SESSION_GATE",
            Self::AdaptiveSizing => "ADAPTIVE_SIZING",
            Self::Emit => "EMIT",
        };
        f.write_str(name)
    }
}

/// Why a candidate did not become a signal.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    #[error("{timeframe}: {got} bars, need {need}")]
    DataInsufficient { timeframe: Timeframe, got: usize, need: usize },

    #[error("{timeframe}: {detail}")]
    DataUnavailable { timeframe: Timeframe, detail: String },

    #[error("no order block")]
    NoOrderBlock,

    #[error("score {score} below threshold {threshold}")]
    BelowThreshold { score: u8, threshold: u8 },

    #[error("degenerate computation: {0}")]
    Degenerate(String),

    #[error("duplicate signal {0}")]
    Duplicate(String),

    #[error("news blackout: {event} ({minutes_remaining} min left)")]
    NewsBlackout { event: String, minutes_remaining: i64 },

    #[error("{gate} gate veto (score {score:.2})")]
    GateVeto { gate: GateKind, score: f64 },

    #[error("store rejected signal: {0}")]
    StoreRejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

/// Complete record of one evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    /// UUID v4.
    pub id: String,
    pub symbol: String,
    /// Last stage reached.
    pub stage: Stage,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
    /// Cycle time, RFC 3339.
    pub created_at: String,
}

impl DecisionRecord {
    pub fn accepted(symbol: impl Into<String>, signal: Signal, at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            stage: Stage::Emit,
            verdict: Verdict::Accepted,
            signal: Some(signal),
            created_at: at.to_rfc3339(),
        }
    }

    pub fn rejected(symbol: impl Into<String>, stage: Stage, reason: RejectReason, at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            stage,
            verdict: Verdict::Rejected(reason),
            signal: None,
            created_at: at.to_rfc3339(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted)
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match &self.verdict {
            Verdict::Accepted => None,
            Verdict::Rejected(reason) => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::overlap_time as cycle_time;

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::RegimeDetect < Stage::Score);
        assert!(Stage::Dedup < Stage::NewsBlackoutCheck);
        assert!(Stage::SessionGate < Stage::Emit);
        assert_eq!(Stage::AdaptiveThresholdCheck.to_string(), "ADAPTIVE_THRESHOLD_CHECK");
    }

    #[test]
    fn rejected_record_serialises_reason() {
        let record = DecisionRecord::rejected(
            "XAUUSD",
            Stage::AdaptiveThresholdCheck,
            RejectReason::BelowThreshold { score: 5, threshold: 6 },
            cycle_time(),
        );
        assert!(!record.is_accepted());
        assert_eq!(record.reason().unwrap().to_string(), "score 5 below threshold 6");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["stage"], "ADAPTIVE_THRESHOLD_CHECK");
        assert_eq!(json["verdict"]["verdict"], "REJECTED");
        assert_eq!(json["verdict"]["reason"]["kind"], "BELOW_THRESHOLD");
        assert!(json.get("signal").is_none());
        assert_eq!(record.created_at, "2024-01-08T14:00:00+00:00");
    }

    #[test]
    fn records_carry_the_cycle_time() {
        let a = DecisionRecord::rejected("XAUUSD", Stage::FeatureDetect, RejectReason::NoOrderBlock, cycle_time());
        let b = DecisionRecord::rejected("XAUUSD", Stage::FeatureDetect, RejectReason::NoOrderBlock, cycle_time());
        assert_ne!(a.id, b.id);
        assert_eq!(a.created_at, b.created_at);
        assert_eq!(
            DateTime::parse_from_rfc3339(&a.created_at).unwrap(),
            cycle_time()
        );
    }

    #[test]
    fn veto_message_names_the_gate() {
        let r = RejectReason::GateVeto {
            gate: GateKind::Flow,
            score: 0.0,
        };
        assert_eq!(r.to_string(), "FLOW gate veto (score 0.00)");
    }
}
