// =============================================================================
// Session Gate
// =============================================================================
//
//   Session      UTC window   base   adjustment
//   ASIAN        00-08        0.8    x0.7
//   LONDON       08-13        1.2    x1.1 if score >= 7, else x0.9
//   OVERLAP      13-16        1.8    x1.2
//   NEW_YORK     16-21        1.5    x1.1 if a note mentions momentum
//   AFTER_HOURS  21-24        0.5    x0.5
//
// Time left in the session: >= 2h x1.1, otherwise x0.9. London is measured to
// its 16:00 close. After hours has no close and takes no time adjustment.
//
// The score is an unbounded multiplier for position sizing. It never vetoes.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GateKind, GateResult};

const OPTIMAL_SCORE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Session {
    Asian,
    London,
    Overlap,
    NewYork,
    AfterHours,
}

impl Session {
    pub fn base_multiplier(self) -> f64 {
        match self {
            Self::Asian => 0.8,
            Self::London => 1.2,
            Self::Overlap => 1.8,
            Self::NewYork => 1.5,
            Self::AfterHours => 0.5,
        }
    }

    /// UTC hour the session is measured to, if it has one.
    pub fn close_hour(self) -> Option<u32> {
        match self {
            Self::Asian => Some(8),
            Self::London | Self::Overlap => Some(16),
            Self::NewYork => Some(21),
            Self::AfterHours => None,
        }
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asian => write!(f, "ASIAN"),
            Self::London => write!(f, "LONDON"),
            Self::Overlap => write!(f, "OVERLAP"),
            Self::NewYork => write!(f, "NEW_YORK"),
            Self::AfterHours => write!(f, "AFTER_HOURS"),
        }
    }
}

/// Session in force at `now`. Overlap wins over London and New York.
pub fn session_at(now: DateTime<Utc>) -> Session {
    match now.hour() {
        0..=7 => Session::Asian,
        8..=12 => Session::London,
        13..=15 => Session::Overlap,
        16..=20 => Session::NewYork,
        _ => Session::AfterHours,
    }
}

/// Hours from `now` to the session close; 0 for sessions without one.
fn hours_remaining(session: Session, now: DateTime<Utc>) -> f64 {
    let Some(close) = session.close_hour() else {
        return 0.0;
    };
    let elapsed = now.hour() as f64 + now.minute() as f64 / 60.0 + now.second() as f64 / 3600.0;
    (close as f64 - elapsed).max(0.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionGate;

impl SessionGate {
    pub fn new() -> Self {
        Self
    }

    /// Session multiplier for a candidate with integer `score` and score `notes`.
    pub fn evaluate(&self, now: DateTime<Utc>, score: u8, notes: &[String]) -> GateResult {
        let session = session_at(now);
        let mut multiplier = session.base_multiplier();
        let mut out = vec![format!("Session: {}", session)];

        match session {
            Session::Overlap => {
                multiplier *= 1.2;
                out.push("Session: London/New York overlap".to_string());
            }
            Session::London if score >= 7 => {
                multiplier *= 1.1;
                out.push("Session: London favours high-quality setups".to_string());
            }
            Session::London => {
                multiplier *= 0.9;
                out.push("Session: London, below preferred quality".to_string());
            }
            Session::NewYork => {
                if notes.iter().any(|n| n.to_ascii_lowercase().contains("momentum")) {
                    multiplier *= 1.1;
                    out.push("Session: New York momentum".to_string());
                }
            }
            Session::Asian => {
                multiplier *= 0.7;
                out.push("Session: Asian range hours".to_string());
            }
            Session::AfterHours => {
                multiplier *= 0.5;
                out.push("Session: after hours".to_string());
            }
        }

        let remaining = hours_remaining(session, now);
        if remaining >= 2.0 {
            multiplier *= 1.1;
            out.push(format!("Session: {:.1}h remaining", remaining));
        } else if remaining > 0.0 {
            multiplier *= 0.9;
            out.push(format!("Session: only {:.1}h remaining", remaining));
        }

        let optimal = multiplier >= OPTIMAL_SCORE;
        debug!(
            session = %session,
            multiplier = format!("{:.2}", multiplier),
            optimal,
            "Session gate evaluated"
        );
        GateResult::new(GateKind::Session, optimal, multiplier, out)
    }
}
