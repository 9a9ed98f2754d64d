// =============================================================================
// Score breakdown and score card
// =============================================================================

use serde::{Deserialize, Serialize};

/// The eight scoring categories. Caps sum to 10.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DailyBias,
    ObQuality,
    Liquidity,
    FuStrength,
    MarketStructure,
    InstitutionalZone,
    Volume,
    Imbalance,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::DailyBias,
        Category::ObQuality,
        Category::Liquidity,
        Category::FuStrength,
        Category::MarketStructure,
        Category::InstitutionalZone,
        Category::Volume,
        Category::Imbalance,
    ];

    pub fn cap(self) -> f64 {
        match self {
            Self::DailyBias
            | Self::ObQuality
            | Self::Liquidity
            | Self::FuStrength
            | Self::MarketStructure => 1.5,
            Self::InstitutionalZone | Self::Volume => 1.0,
            Self::Imbalance => 0.5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::DailyBias => "daily_bias",
            Self::ObQuality => "ob_quality",
            Self::Liquidity => "liquidity",
            Self::FuStrength => "fu_strength",
            Self::MarketStructure => "market_structure",
            Self::InstitutionalZone => "institutional_zone",
            Self::Volume => "volume",
            Self::Imbalance => "imbalance",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Points per category, each clamped to its cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub daily_bias: f64,
    pub ob_quality: f64,
    pub liquidity: f64,
    pub fu_strength: f64,
    pub market_structure: f64,
    pub institutional_zone: f64,
    pub volume: f64,
    pub imbalance: f64,
}

impl ScoreBreakdown {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::DailyBias => self.daily_bias,
            Category::ObQuality => self.ob_quality,
            Category::Liquidity => self.liquidity,
            Category::FuStrength => self.fu_strength,
            Category::MarketStructure => self.market_structure,
            Category::InstitutionalZone => self.institutional_zone,
            Category::Volume => self.volume,
            Category::Imbalance => self.imbalance,
        }
    }

    /// Store `points` for `category`, clamped to `[0, cap]`.
    pub fn set(&mut self, category: Category, points: f64) {
        let value = if points.is_finite() {
            points.clamp(0.0, category.cap())
        } else {
            0.0
        };
        let slot = match category {
            Category::DailyBias => &mut self.daily_bias,
            Category::ObQuality => &mut self.ob_quality,
            Category::Liquidity => &mut self.liquidity,
            Category::FuStrength => &mut self.fu_strength,
            Category::MarketStructure => &mut self.market_structure,
            Category::InstitutionalZone => &mut self.institutional_zone,
            Category::Volume => &mut self.volume,
            Category::Imbalance => &mut self.imbalance,
        };
        *slot = value;
    }

    pub fn total(&self) -> f64 {
        Category::ALL.iter().map(|&c| self.get(c)).sum()
    }

    pub fn entries(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.iter().map(move |&c| (c, self.get(c)))
    }
}

/// Human label attached to the integer score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityRating {
    #[serde(rename = "EXCEPTIONAL")]
    Exceptional,
    #[serde(rename = "ELITE")]
    Elite,
    #[serde(rename = "HIGH QUALITY")]
    HighQuality,
    #[serde(rename = "SOLID")]
    Solid,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "LOW CONFIDENCE")]
    LowConfidence,
    #[serde(rename = "POOR")]
    Poor,
}

impl QualityRating {
    pub fn from_score(score: u8) -> Self {
        match score {
            9.. => Self::Exceptional,
            8 => Self::Elite,
            7 => Self::HighQuality,
            6 => Self::Solid,
            5 => Self::Moderate,
            4 => Self::LowConfidence,
            _ => Self::Poor,
        }
    }
}

impl std::fmt::Display for QualityRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exceptional => write!(f, "EXCEPTIONAL"),
            Self::Elite => write!(f, "ELITE"),
            Self::HighQuality => write!(f, "HIGH QUALITY"),
            Self::Solid => write!(f, "SOLID"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::LowConfidence => write!(f, "LOW CONFIDENCE"),
            Self::Poor => write!(f, "POOR"),
        }
    }
}

/// Integer score in [1, 10] from a raw category total.
pub fn final_score(raw_total: f64) -> u8 {
    if !raw_total.is_finite() {
        return 1;
    }
    (raw_total * 2.0).round().clamp(1.0, 10.0) as u8
}

/// Complete scorer output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: u8,
    pub raw_total: f64,
    pub breakdown: ScoreBreakdown,
    pub notes: Vec<String>,
    pub quality: QualityRating,
}
