// =============================================================================
// Alignment Gates
// =============================================================================
//
// Independent advisory / veto filters run on a scored candidate:
//
//   Correlation: weighted agreement of a macro basket (H4 EMA trends)
//   Flow       : rolling window of volume + body "block trades"
//   Session    : UTC session multiplier, informs sizing only
//
// Veto policy: Correlation and Flow reject only when `aligned == false` AND
// `score < 0.4`. Missing data always reads neutral and never vetoes.

pub mod correlation;
pub mod flow;
pub mod session;

use serde::{Deserialize, Serialize};

pub use correlation::{asset_trend, default_basket, AssetTrend, CorrelatedAsset, CorrelationGate};
pub use flow::{BlockTrade, FlowConfig, FlowGate};
pub use session::{session_at, Session, SessionGate};

/// Score below which a misaligned gate vetoes.
pub const VETO_SCORE: f64 = 0.4;

/// Neutral score used when a gate has nothing to go on.
pub const NEUTRAL_SCORE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateKind {
    Correlation,
    Flow,
    Session,
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Correlation => write!(f, "CORRELATION"),
            Self::Flow => write!(f, "FLOW"),
            Self::Session => write!(f, "SESSION"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Optimal,
    Strong,
    Good,
    Acceptable,
    Mixed,
    Suboptimal,
    Poor,
    Contrary,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimal => write!(f, "OPTIMAL"),
            Self::Strong => write!(f, "STRONG"),
            Self::Good => write!(f, "GOOD"),
            Self::Acceptable => write!(f, "ACCEPTABLE"),
            Self::Mixed => write!(f, "MIXED"),
            Self::Suboptimal => write!(f, "SUBOPTIMAL"),
            Self::Poor => write!(f, "POOR"),
            Self::Contrary => write!(f, "CONTRARY"),
        }
    }
}

/// Recommendation ladder for a gate's score.
pub fn recommend(gate: GateKind, score: f64) -> Recommendation {
    match gate {
        GateKind::Session => {
            if score >= 1.5 {
                Recommendation::Optimal
            } else if score >= 1.2 {
                Recommendation::Good
            } else if score >= 1.0 {
                Recommendation::Acceptable
            } else if score >= 0.8 {
                Recommendation::Suboptimal
            } else {
                Recommendation::Poor
            }
        }
        GateKind::Correlation | GateKind::Flow => {
            if score >= 0.8 {
                Recommendation::Strong
            } else if score >= 0.6 {
                Recommendation::Good
            } else if score >= VETO_SCORE {
                Recommendation::Mixed
            } else if gate == GateKind::Flow {
                Recommendation::Contrary
            } else {
                Recommendation::Poor
            }
        }
    }
}

/// Outcome of one gate on one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: GateKind,
    pub aligned: bool,
    pub score: f64,
    pub notes: Vec<String>,
    pub recommendation: Recommendation,
    /// False when the gate ran without usable data.
    pub available: bool,
}

impl GateResult {
    pub fn new(gate: GateKind, aligned: bool, score: f64, notes: Vec<String>) -> Self {
        Self {
            gate,
            aligned,
            score,
            notes,
            recommendation: recommend(gate, score),
            available: true,
        }
    }

    /// Fail-open result for a gate that had nothing to evaluate.
    pub fn unavailable(gate: GateKind, note: impl Into<String>) -> Self {
        let score = match gate {
            GateKind::Session => 1.0,
            GateKind::Correlation | GateKind::Flow => NEUTRAL_SCORE,
        };
        Self {
            available: false,
            ..Self::new(gate, true, score, vec![note.into()])
        }
    }

    /// Whether this result rejects the candidate. The session gate never does.
    pub fn vetoes(&self) -> bool {
        match self.gate {
            GateKind::Session => false,
            GateKind::Correlation | GateKind::Flow => !self.aligned && self.score < VETO_SCORE,
        }
    }
}
