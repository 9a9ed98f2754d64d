// =============================================================================
// Notifier
// =============================================================================
//
// Delivery of accepted signals. The engine ships a log-only notifier; a chat
// or webhook notifier plugs in behind the same trait.

use tracing::info;

use crate::signal::Signal;

pub trait Notifier: Send + Sync {
    /// Deliver `signal`, optionally with a rendered chart image.
    fn notify(&self, signal: &Signal, chart: Option<&[u8]>) -> anyhow::Result<()>;
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn notify(&self, signal: &Signal, chart: Option<&[u8]>) -> anyhow::Result<()> {
        (**self).notify(signal, chart)
    }
}

/// Multi-line text rendering of a signal.
pub fn format_message(signal: &Signal) -> String {
    let mut lines = vec![
        format!(
            "{} {} {} | score {}/10 ({})",
            signal.symbol, signal.timeframe, signal.side, signal.score, signal.quality
        ),
        format!("Entry: {}", signal.entry),
        format!("Stop: {}", signal.stop_loss),
    ];
    for (i, tp) in signal.take_profits.iter().enumerate() {
        lines.push(format!("TP{}: {}", i + 1, tp));
    }
    lines.push(format!(
        "Regime: {} ({:.0}%)",
        signal.regime.kind,
        signal.regime.confidence * 100.0
    ));
    for gate in &signal.gates {
        lines.push(format!("{}: {} ({:.2})", gate.gate, gate.recommendation, gate.score));
    }
    lines.push(format!("Risk: {:.2}%", signal.risk_percent));
    lines.join("\n")
}

/// Writes each signal to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, signal: &Signal, chart: Option<&[u8]>) -> anyhow::Result<()> {
        info!(
            symbol = %signal.symbol,
            side = %signal.side,
            score = signal.score,
            chart_bytes = chart.map_or(0, <[u8]>::len),
            "\n{}",
            format_message(signal)
        );
        Ok(())
    }
}
