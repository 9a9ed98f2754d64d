use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled economic release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    #[serde(default)]
    pub source: String,
    pub currency: String,
    pub time: DateTime<Utc>,
    pub name: String,
    #[serde(default = "default_impact")]
    pub impact: String,
}

fn default_impact() -> String {
    "high".to_string()
}

/// Result of a blackout check.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlackoutStatus {
    pub active: bool,
    pub event: Option<NewsEvent>,
    /// Minutes until the window closes; at least 1 while active, 0 otherwise.
    pub minutes_remaining: i64,
}

impl BlackoutStatus {
    pub fn clear() -> Self {
        Self::default()
    }
}

pub trait NewsCalendar: Send + Sync {
    /// Whether `now` falls inside the blackout window of an event for any of
    /// `currencies`.
    fn is_blackout(&self, currencies: &[String], now: DateTime<Utc>) -> BlackoutStatus;
}

impl<C: NewsCalendar + ?Sized> NewsCalendar for std::sync::Arc<C> {
    fn is_blackout(&self, currencies: &[String], now: DateTime<Utc>) -> BlackoutStatus {
        (**self).is_blackout(currencies, now)
    }
}

/// Calendar with no events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNews;

impl NewsCalendar for NoNews {
    fn is_blackout(&self, _currencies: &[String], _now: DateTime<Utc>) -> BlackoutStatus {
        BlackoutStatus::clear()
    }
}
