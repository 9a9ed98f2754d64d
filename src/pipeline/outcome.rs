// =============================================================================
// Outcome tracking for open signals
// =============================================================================
//
// Each open signal is compared with the latest H1 bar:
//
//   SL   needs the bar to breach the stop AND close beyond it
//   TPk  needs only an intrabar touch (high for BUY, low for SELL)
//
// A stop hit ends the check for that bar; no take-profit is recorded on it.

use tracing::{info, warn};

use crate::market_data::PriceBar;
use crate::ports::{OutcomeKind, SignalStore};
use crate::signal::Signal;
use crate::types::Side;

/// Outcomes `bar` triggers for `signal`, stop first.
pub fn bar_outcomes(signal: &Signal, bar: &PriceBar) -> Vec<(OutcomeKind, f64)> {
    let stop = signal.stop_loss;
    let stop_hit = match signal.side {
        Side::Buy => bar.low <= stop && bar.close <= stop,
        Side::Sell => bar.high >= stop && bar.close >= stop,
    };
    if stop_hit {
        return vec![(OutcomeKind::StopLoss, stop)];
    }

    signal
        .take_profits
        .iter()
        .copied()
        .enumerate()
        .filter(|&(_, tp)| match signal.side {
            Side::Buy => bar.high >= tp,
            Side::Sell => bar.low <= tp,
        })
        .filter_map(|(i, tp)| OutcomeKind::take_profit(i + 1).map(|kind| (kind, tp)))
        .collect()
}

/// Record what `bar` triggers for every open signal of `symbol`. Returns the
/// number of newly recorded outcomes.
pub fn track_outcomes(store: &dyn SignalStore, symbol: &str, bar: &PriceBar) -> usize {
    let mut recorded = 0;
    for signal in store.get_open(symbol) {
        let Some(id) = signal.id.as_deref() else {
            continue;
        };
        for (kind, price) in bar_outcomes(&signal, bar) {
            if store.is_outcome_recorded(id, kind) {
                continue;
            }
            match store.record_outcome(id, kind, price, bar.time) {
                Ok(true) => {
                    recorded += 1;
                    info!(symbol, id, outcome = %kind, price, "Signal outcome recorded");
                }
                Ok(false) => {}
                Err(e) => warn!(symbol, id, outcome = %kind, error = %e, "Failed to record outcome"),
            }
        }
    }
    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::store::tests::sample_signal;
    use crate::ports::MemorySignalStore;
    use crate::test_support::bar;

    // sample_signal(.., 100.0): BUY, stop 99, TPs 101 / 102 / 103.

    #[test]
    fn stop_needs_a_close_beyond_the_level() {
        let s = sample_signal("XAUUSD", 100.0);
        // Wick through the stop, close back above: no outcome.
        assert!(bar_outcomes(&s, &bar(0, 100.0, 100.5, 98.5, 99.5, 1.0)).is_empty());
        assert_eq!(
            bar_outcomes(&s, &bar(0, 100.0, 100.5, 98.5, 98.8, 1.0)),
            vec![(OutcomeKind::StopLoss, 99.0)]
        );
    }

    #[test]
    fn take_profit_needs_only_a_touch() {
        let s = sample_signal("XAUUSD", 100.0);
        assert_eq!(
            bar_outcomes(&s, &bar(0, 100.0, 102.0, 99.8, 100.2, 1.0)),
            vec![(OutcomeKind::Tp1, 101.0), (OutcomeKind::Tp2, 102.0)]
        );
    }

    #[test]
    fn stop_suppresses_take_profits_on_the_same_bar() {
        let s = sample_signal("XAUUSD", 100.0);
        let wide = bar(0, 100.0, 103.5, 98.0, 98.5, 1.0);
        assert_eq!(bar_outcomes(&s, &wide), vec![(OutcomeKind::StopLoss, 99.0)]);
    }

    #[test]
    fn sell_side_mirrors() {
        let mut s = sample_signal("XAUUSD", 100.0);
        s.side = Side::Sell;
        s.stop_loss = 101.0;
        s.take_profits = vec![99.0, 98.0, 97.0];
        assert!(bar_outcomes(&s, &bar(0, 100.0, 101.5, 99.5, 100.8, 1.0)).is_empty());
        assert_eq!(
            bar_outcomes(&s, &bar(0, 100.0, 101.5, 99.5, 101.2, 1.0)),
            vec![(OutcomeKind::StopLoss, 101.0)]
        );
        assert_eq!(
            bar_outcomes(&s, &bar(0, 100.0, 100.1, 98.9, 99.5, 1.0)),
            vec![(OutcomeKind::Tp1, 99.0)]
        );
    }

    #[test]
    fn tracking_records_each_level_once() {
        let store = MemorySignalStore::new();
        store.save(&sample_signal("XAUUSD", 100.0)).unwrap();

        let touch = bar(0, 100.0, 101.2, 99.8, 100.5, 1.0);
        assert_eq!(track_outcomes(&store, "XAUUSD", &touch), 1);
        assert_eq!(track_outcomes(&store, "XAUUSD", &touch), 0);

        let run = bar(1, 100.5, 103.1, 100.4, 103.0, 1.0);
        assert_eq!(track_outcomes(&store, "XAUUSD", &run), 2);
        // TP3 closed the signal.
        assert!(store.get_open("XAUUSD").is_empty());
        assert_eq!(track_outcomes(&store, "XAUUSD", &bar(2, 99.0, 99.0, 90.0, 90.0, 1.0)), 0);
    }

    #[test]
    fn outcomes_are_stamped_with_the_triggering_bar() {
        let store = MemorySignalStore::new();
        let id = store.save(&sample_signal("XAUUSD", 100.0)).unwrap();

        let touch = bar(7, 100.0, 101.2, 99.8, 100.5, 1.0);
        track_outcomes(&store, "XAUUSD", &touch);
        let outcomes = store.outcomes(&id);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].recorded_at, touch.time);
    }
}
