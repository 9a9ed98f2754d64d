// =============================================================================
// Adaptive risk sizing
// =============================================================================
//
//   risk = base
//        x regime position-size multiplier
//        x score / 10
//        x (0.5 + correlation score)
//        x (0.5 + flow score)
//        x min(1.2, session score)
//
// clamped to [0.5 %, 5 %]. A gate skipped by configuration contributes its
// neutral default.

use tracing::debug;

pub const MIN_RISK: f64 = 0.005;
pub const MAX_RISK: f64 = 0.05;

pub const DEFAULT_CORRELATION_SCORE: f64 = 0.5;
pub const DEFAULT_FLOW_SCORE: f64 = 0.5;
pub const DEFAULT_SESSION_SCORE: f64 = 1.0;

const SESSION_CAP: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingInputs {
    pub base_risk: f64,
    pub regime_multiplier: f64,
    pub score: u8,
    pub correlation: Option<f64>,
    pub flow: Option<f64>,
    pub session: Option<f64>,
}

/// Final risk fraction for a signal.
pub fn adaptive_risk(inputs: &SizingInputs) -> f64 {
    let correlation = inputs.correlation.unwrap_or(DEFAULT_CORRELATION_SCORE);
    let flow = inputs.flow.unwrap_or(DEFAULT_FLOW_SCORE);
    let session = inputs.session.unwrap_or(DEFAULT_SESSION_SCORE);

    let raw = inputs.base_risk
        * inputs.regime_multiplier
        * (inputs.score as f64 / 10.0)
        * (0.5 + correlation)
        * (0.5 + flow)
        * session.min(SESSION_CAP);

    let risk = if raw.is_finite() { raw.clamp(MIN_RISK, MAX_RISK) } else { MIN_RISK };
    debug!(
        raw = format!("{:.4}", raw),
        risk = format!("{:.4}", risk),
        correlation = format!("{:.2}", correlation),
        flow = format!("{:.2}", flow),
        session = format!("{:.2}", session),
        "Adaptive risk"
    );
    risk
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn inputs() -> SizingInputs {
        SizingInputs {
            base_risk: 0.01,
            regime_multiplier: 1.0,
            score: 10,
            correlation: None,
            flow: None,
            session: None,
        }
    }

    #[test]
    fn neutral_gates_keep_base_risk() {
        // 0.01 * 1 * 1 * 1.0 * 1.0 * 1.0
        assert!((adaptive_risk(&inputs()) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn scenario_a_sizing() {
        // Correlation unavailable (0.5), flow 1.0, overlap session 2.376 capped to 1.2.
        let r = adaptive_risk(&SizingInputs {
            regime_multiplier: 1.1,
            correlation: Some(0.5),
            flow: Some(1.0),
            session: Some(2.376),
            ..inputs()
        });
        assert!((r - 0.01 * 1.1 * 1.0 * 1.5 * 1.2).abs() < 1e-12);
    }

    #[test]
    fn clamps() {
        let low = adaptive_risk(&SizingInputs {
            score: 1,
            flow: Some(0.0),
            session: Some(0.25),
            ..inputs()
        });
        assert_eq!(low, MIN_RISK);
        let high = adaptive_risk(&SizingInputs {
            base_risk: 0.05,
            correlation: Some(1.0),
            flow: Some(1.0),
            session: Some(2.0),
            ..inputs()
        });
        assert_eq!(high, MAX_RISK);
        assert_eq!(adaptive_risk(&SizingInputs { base_risk: f64::NAN, ..inputs() }), MIN_RISK);
    }

    proptest! {
        #[test]
        fn always_within_bounds(
            base in 0.0f64..0.1,
            regime in 0.0f64..2.0,
            score in 1u8..=10,
            corr in 0.0f64..=1.0,
            flow in 0.0f64..=1.0,
            session in 0.0f64..3.0,
        ) {
            let r = adaptive_risk(&SizingInputs {
                base_risk: base,
                regime_multiplier: regime,
                score,
                correlation: Some(corr),
                flow: Some(flow),
                session: Some(session),
            });
            prop_assert!((MIN_RISK..=MAX_RISK).contains(&r));
        }
    }
}
