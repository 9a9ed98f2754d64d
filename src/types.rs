// =============================================================================
// Shared types used across the signal engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Trade side of an emitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Price direction this side profits from.
    pub fn direction(self) -> Direction {
        match self {
            Self::Buy => Direction::Bullish,
            Self::Sell => Direction::Bearish,
        }
    }

    /// +1.0 for BUY, -1.0 for SELL. Used to project levels away from entry.
    pub fn sign(self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Direction of a price feature (impulse, sweep, gap, trend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    pub fn side(self) -> Side {
        match self {
            Self::Bullish => Side::Buy,
            Self::Bearish => Side::Sell,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Bullish => Self::Bearish,
            Self::Bearish => Self::Bullish,
        }
    }

    pub fn is_bullish(self) -> bool {
        matches!(self, Self::Bullish)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
        }
    }
}

/// Chart timeframes the engine reads.
///
/// Order-block selection weighs blocks by timeframe, so the weight lives on
/// the enum instead of being derived from string comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::D1, Timeframe::H4, Timeframe::H1];

    /// Weight used by best-order-block selection: higher timeframes count fully.
    pub fn order_block_weight(self) -> f64 {
        match self {
            Self::H4 | Self::D1 => 1.0,
            Self::H1 => 0.5,
        }
    }

    /// Nominal bar duration in minutes.
    pub fn minutes(self) -> i64 {
        match self {
            Self::H1 => 60,
            Self::H4 => 240,
            Self::D1 => 1440,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::H1 => "H1",
            Self::H4 => "H4",
            Self::D1 => "D1",
        }
    }

    /// Parse a label such as `"H4"` (case-insensitive).
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "H1" => Some(Self::H1),
            "H4" => Some(Self::H4),
            "D1" => Some(Self::D1),
            _ => None,
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::H1
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
