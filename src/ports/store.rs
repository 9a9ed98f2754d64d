// =============================================================================
// Signal store
// =============================================================================
//
// Persistence and deduplication of emitted signals plus their outcomes.
//
// Outcome rules:
//   - SL or TP3 deactivates the signal (it no longer shows in `get_open`)
//   - each outcome kind is recorded at most once per signal
//
// `MemorySignalStore` keeps everything behind a `parking_lot::RwLock` and can
// snapshot itself to a JSON file (atomic write: `.tmp` then rename).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    #[serde(rename = "SL")]
    StopLoss,
    #[serde(rename = "TP1")]
    Tp1,
    #[serde(rename = "TP2")]
    Tp2,
    #[serde(rename = "TP3")]
    Tp3,
}

impl OutcomeKind {
    /// Take-profit outcome for `level` (1-based).
    pub fn take_profit(level: usize) -> Option<Self> {
        match level {
            1 => Some(Self::Tp1),
            2 => Some(Self::Tp2),
            3 => Some(Self::Tp3),
            _ => None,
        }
    }

    pub fn closes_signal(self) -> bool {
        matches!(self, Self::StopLoss | Self::Tp3)
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopLoss => write!(f, "SL"),
            Self::Tp1 => write!(f, "TP1"),
            Self::Tp2 => write!(f, "TP2"),
            Self::Tp3 => write!(f, "TP3"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub signal_id: String,
    pub kind: OutcomeKind,
    pub price: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("signal with hash {0} already stored")]
    Duplicate(String),

    #[error("unknown signal id {0}")]
    UnknownSignal(String),

    #[error("store snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store snapshot is not valid JSON: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub trait SignalStore: Send + Sync {
    fn is_duplicate(&self, dedup_hash: &str) -> bool;

    /// Persist `signal` and return its id.
    fn save(&self, signal: &Signal) -> Result<String, StoreError>;

    /// Active signals for `symbol`, oldest first.
    fn get_open(&self, symbol: &str) -> Vec<Signal>;

    /// Record an outcome triggered by the bar at `at`. `Ok(false)` when that
    /// outcome was already recorded.
    fn record_outcome(
        &self,
        signal_id: &str,
        kind: OutcomeKind,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    fn is_outcome_recorded(&self, signal_id: &str, kind: OutcomeKind) -> bool;
}

impl<S: SignalStore + ?Sized> SignalStore for std::sync::Arc<S> {
    fn is_duplicate(&self, dedup_hash: &str) -> bool {
        (**self).is_duplicate(dedup_hash)
    }

    fn save(&self, signal: &Signal) -> Result<String, StoreError> {
        (**self).save(signal)
    }

    fn get_open(&self, symbol: &str) -> Vec<Signal> {
        (**self).get_open(symbol)
    }

    fn record_outcome(
        &self,
        signal_id: &str,
        kind: OutcomeKind,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        (**self).record_outcome(signal_id, kind, price, at)
    }

    fn is_outcome_recorded(&self, signal_id: &str, kind: OutcomeKind) -> bool {
        (**self).is_outcome_recorded(signal_id, kind)
    }
}

// =============================================================================
// MemorySignalStore
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSignal {
    signal: Signal,
    active: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    signals: Vec<StoredSignal>,
    #[serde(default)]
    outcomes: Vec<OutcomeRecord>,
}

#[derive(Debug, Default)]
pub struct MemorySignalStore {
    inner: RwLock<Snapshot>,
    path: Option<PathBuf>,
}

impl MemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a JSON snapshot at `path`. A missing file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshot = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&raw)?
        } else {
            Snapshot::default()
        };
        info!(
            path = %path.display(),
            signals = snapshot.signals.len(),
            outcomes = snapshot.outcomes.len(),
            "Signal store opened"
        );
        Ok(Self {
            inner: RwLock::new(snapshot),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.inner.read().signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn outcomes(&self, signal_id: &str) -> Vec<OutcomeRecord> {
        self.inner
            .read()
            .outcomes
            .iter()
            .filter(|o| o.signal_id == signal_id)
            .cloned()
            .collect()
    }

    /// Write the snapshot to disk. A store without a path does nothing.
    pub fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(&*self.inner.read())?;
        let tmp_path = path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        std::fs::write(&tmp_path, content).map_err(io_err)?;
        std::fs::rename(&tmp_path, path).map_err(io_err)?;
        info!(path = %path.display(), "Signal store flushed (atomic)");
        Ok(())
    }
}

impl SignalStore for MemorySignalStore {
    fn is_duplicate(&self, dedup_hash: &str) -> bool {
        self.inner.read().signals.iter().any(|s| s.signal.dedup_hash == dedup_hash)
    }

    fn save(&self, signal: &Signal) -> Result<String, StoreError> {
        let mut inner = self.inner.write();
        if inner.signals.iter().any(|s| s.signal.dedup_hash == signal.dedup_hash) {
            return Err(StoreError::Duplicate(signal.dedup_hash.clone()));
        }
        let id = Uuid::new_v4().to_string();
        let mut stored = signal.clone();
        stored.id = Some(id.clone());
        inner.signals.push(StoredSignal {
            signal: stored,
            active: true,
        });
        debug!(id = %id, symbol = %signal.symbol, "Signal stored");
        Ok(id)
    }

    fn get_open(&self, symbol: &str) -> Vec<Signal> {
        self.inner
            .read()
            .signals
            .iter()
            .filter(|s| s.active && s.signal.symbol == symbol)
            .map(|s| s.signal.clone())
            .collect()
    }

    fn record_outcome(
        &self,
        signal_id: &str,
        kind: OutcomeKind,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        if inner.outcomes.iter().any(|o| o.signal_id == signal_id && o.kind == kind) {
            return Ok(false);
        }
        let stored = inner
            .signals
            .iter_mut()
            .find(|s| s.signal.id.as_deref() == Some(signal_id))
            .ok_or_else(|| StoreError::UnknownSignal(signal_id.to_string()))?;
        if kind.closes_signal() {
            stored.active = false;
        }
        inner.outcomes.push(OutcomeRecord {
            signal_id: signal_id.to_string(),
            kind,
            price,
            recorded_at: at,
        });
        Ok(true)
    }

    fn is_outcome_recorded(&self, signal_id: &str, kind: OutcomeKind) -> bool {
        self.inner
            .read()
            .outcomes
            .iter()
            .any(|o| o.signal_id == signal_id && o.kind == kind)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::regime::RegimeInfo;
    use crate::scoring::{QualityRating, ScoreBreakdown};
    use crate::signal::dedup_hash;
    use crate::test_support::t0;
    use crate::types::{Side, Timeframe};

    pub(crate) fn sample_signal(symbol: &str, entry: f64) -> Signal {
        Signal {
            id: None,
            symbol: symbol.to_string(),
            timeframe: Timeframe::H1,
            side: Side::Buy,
            entry,
            stop_loss: entry - 1.0,
            take_profits: vec![entry + 1.0, entry + 2.0, entry + 3.0],
            risk: 1.0,
            score: 8,
            breakdown: ScoreBreakdown::default(),
            notes: vec!["OB: strong displacement (3.20)".to_string()],
            quality: QualityRating::from_score(8),
            ob_timeframe: Timeframe::H4,
            regime: RegimeInfo::unknown(),
            gates: Vec::new(),
            risk_percent: 1.0,
            position_size_multiplier: 1.0,
            created_at: t0(),
            dedup_hash: dedup_hash(symbol, Timeframe::H1, Side::Buy, entry),
        }
    }

    #[test]
    fn save_assigns_ids_and_dedups() {
        let store = MemorySignalStore::new();
        let s = sample_signal("XAUUSD", 100.0);
        assert!(!store.is_duplicate(&s.dedup_hash));

        let id = store.save(&s).unwrap();
        assert!(store.is_duplicate(&s.dedup_hash));
        assert!(matches!(store.save(&s), Err(StoreError::Duplicate(_))));

        let open = store.get_open("XAUUSD");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id.as_deref(), Some(id.as_str()));
        assert!(store.get_open("EURUSD").is_empty());
    }

    #[test]
    fn outcomes_recorded_once_and_close_on_sl_or_tp3() {
        let store = MemorySignalStore::new();
        let a = store.save(&sample_signal("XAUUSD", 100.0)).unwrap();
        let b = store.save(&sample_signal("XAUUSD", 110.0)).unwrap();

        assert!(store.record_outcome(&a, OutcomeKind::Tp1, 101.0, t0()).unwrap());
        assert!(!store.record_outcome(&a, OutcomeKind::Tp1, 101.5, t0()).unwrap());
        assert!(store.is_outcome_recorded(&a, OutcomeKind::Tp1));
        assert_eq!(store.get_open("XAUUSD").len(), 2);

        store.record_outcome(&a, OutcomeKind::Tp3, 103.0, t0()).unwrap();
        store.record_outcome(&b, OutcomeKind::StopLoss, 109.0, t0()).unwrap();
        assert!(store.get_open("XAUUSD").is_empty());
        assert_eq!(store.outcomes(&a).len(), 2);

        assert!(matches!(
            store.record_outcome("missing", OutcomeKind::Tp2, 1.0, t0()),
            Err(StoreError::UnknownSignal(_))
        ));
    }

    #[test]
    fn snapshot_roundtrip() {
        let path = std::env::temp_dir().join(format!("smc_store_{}.json", Uuid::new_v4()));
        let store = MemorySignalStore::open(&path).unwrap();
        assert!(store.is_empty());
        let id = store.save(&sample_signal("XAUUSD", 100.0)).unwrap();
        store.record_outcome(&id, OutcomeKind::Tp1, 101.0, t0()).unwrap();
        store.flush().unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = MemorySignalStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.is_outcome_recorded(&id, OutcomeKind::Tp1));
        assert_eq!(reopened.get_open("XAUUSD")[0], store.get_open("XAUUSD")[0]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(serde_json::to_string(&OutcomeKind::StopLoss).unwrap(), "\"SL\"");
        assert_eq!(OutcomeKind::take_profit(2), Some(OutcomeKind::Tp2));
        assert_eq!(OutcomeKind::take_profit(4), None);
        assert!(OutcomeKind::Tp3.closes_signal() && !OutcomeKind::Tp2.closes_signal());
    }
}
