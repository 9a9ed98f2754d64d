pub mod decision;
pub mod engine;
pub mod outcome;
pub mod sizing;

pub use decision::{DecisionRecord, RejectReason, Stage, Verdict};
pub use engine::{CycleReport, Frames, Ports, SignalPipeline};
pub use outcome::{bar_outcomes, track_outcomes};
pub use sizing::{adaptive_risk, SizingInputs};
