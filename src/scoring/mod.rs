// =============================================================================
// Scoring Module
// =============================================================================
//
// Turns detector output for one order-block candidate into an integer 1-10
// score with a per-category breakdown and an ordered audit trail of notes.

pub mod breakdown;
pub mod composite;
pub mod rules;

pub use breakdown::{final_score, Category, QualityRating, ScoreBreakdown, ScoreCard};
pub use composite::{recent_momentum, CompositeScorer, ScoreInput};
