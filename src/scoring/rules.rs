// =============================================================================
// Scoring rule tables
// =============================================================================
//
// Every graded sub-rule is an ordered table of threshold -> points -> note.
// Tables are evaluated top-down and the first matching tier wins.

/// One rung of a threshold cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub threshold: f64,
    pub points: f64,
    pub note: &'static str,
}

impl Tier {
    pub const fn new(threshold: f64, points: f64, note: &'static str) -> Self {
        Self {
            threshold,
            points,
            note,
        }
    }

    /// Note text with the measured value appended.
    pub fn describe(&self, value: f64) -> String {
        format!("{} ({:.2})", self.note, value)
    }
}

/// First tier with `value >= threshold`. Tables are ordered high to low.
pub fn first_at_least(tiers: &[Tier], value: f64) -> Option<&Tier> {
    tiers.iter().find(|t| value >= t.threshold)
}

/// First tier with `value <= threshold`. Tables are ordered low to high.
pub fn first_at_most(tiers: &[Tier], value: f64) -> Option<&Tier> {
    tiers.iter().find(|t| value <= t.threshold)
}

// -- Order block --------------------------------------------------------------

pub const OB_DISPLACEMENT: &[Tier] = &[
    Tier::new(3.0, 0.5, "OB: strong displacement"),
    Tier::new(2.0, 0.3, "OB: good displacement"),
    Tier::new(1.5, 0.1, "OB: moderate displacement"),
];

pub const OB_VOLUME: &[Tier] = &[
    Tier::new(1.5, 0.25, "OB: high volume"),
    Tier::new(1.2, 0.15, "OB: above-average volume"),
];

pub const OB_QUALITY: &[Tier] = &[
    Tier::new(0.8, 0.25, "OB: clean formation"),
    Tier::new(0.6, 0.15, "OB: decent formation"),
];

// -- Liquidity ----------------------------------------------------------------

/// Distance from the H1 close to the strongest same-side zone, in ATRs.
pub const ZONE_PROXIMITY: &[Tier] = &[
    Tier::new(0.5, 0.5, "Liq: resting at zone"),
    Tier::new(1.0, 0.25, "Liq: approaching zone"),
];

// -- FU candle ----------------------------------------------------------------

pub const FU_BODY: &[Tier] = &[
    Tier::new(1.2, 0.5, "FU: very strong body"),
    Tier::new(0.8, 0.3, "FU: strong body"),
    Tier::new(0.5, 0.1, "FU: moderate body"),
];

/// Rejection = close fraction for bullish FUs, 1 - close fraction for bearish.
pub const FU_REJECTION: &[Tier] = &[
    Tier::new(0.7, 0.4, "FU: strong close rejection"),
    Tier::new(0.6, 0.2, "FU: good close rejection"),
];

pub const FU_VOLUME: &[Tier] = &[
    Tier::new(2.0, 0.3, "FU: high volume"),
    Tier::new(1.5, 0.15, "FU: above-average volume"),
];

// -- Institutional zone -------------------------------------------------------

/// Distance from the H1 close to the OB body mid, in ATRs.
pub const OB_PROXIMITY: &[Tier] = &[
    Tier::new(0.3, 1.0, "Zone: at OB mid"),
    Tier::new(0.5, 0.7, "Zone: close to OB mid"),
    Tier::new(0.8, 0.4, "Zone: near OB mid"),
    Tier::new(1.0, 0.2, "Zone: approaching OB mid"),
];

// -- Volume -------------------------------------------------------------------

/// Mean of the last 10 volumes over the 20-bar average.
pub const VOLUME_ACTIVITY: &[Tier] = &[
    Tier::new(1.5, 0.5, "Volume: high activity"),
    Tier::new(1.2, 0.3, "Volume: above-average activity"),
];
