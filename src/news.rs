// =============================================================================
// News blackout calendar
// =============================================================================
//
// Events come from a JSON list (`[{ "currency", "time", "name", ... }]`).
// A blackout runs from `before` minutes ahead of an event to `after` minutes
// past it. Events whose name contains a critical keyword (case-insensitive)
// get a wider window:
//
//   before x 2
//   after  x 1.5
//
// Critical events are checked first, so they are the ones reported when
// windows overlap.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::ports::{BlackoutStatus, NewsCalendar, NewsEvent};

// =============================================================================
// Configuration
// =============================================================================

fn default_enabled() -> bool {
    true
}

fn default_blackout_min_before() -> i64 {
    30
}

fn default_blackout_min_after() -> i64 {
    30
}

fn default_critical_keywords() -> Vec<String> {
    [
        "NFP",
        "Nonfarm Payrolls",
        "CPI",
        "FOMC",
        "Federal Reserve",
        "Interest Rate",
        "Inflation",
        "PCE",
        "Retail Sales",
        "GDP",
        "Unemployment",
        "Jobs Report",
        "Central Bank",
        "Monetary Policy",
        "Gold",
        "XAU",
        "Precious Metals",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// JSON event list. No path means no events.
    #[serde(default)]
    pub calendar_path: Option<PathBuf>,
    #[serde(default = "default_blackout_min_before")]
    pub blackout_min_before: i64,
    #[serde(default = "default_blackout_min_after")]
    pub blackout_min_after: i64,
    #[serde(default = "default_critical_keywords")]
    pub critical_keywords: Vec<String>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            calendar_path: None,
            blackout_min_before: default_blackout_min_before(),
            blackout_min_after: default_blackout_min_after(),
            critical_keywords: default_critical_keywords(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("failed to read calendar {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse calendar {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// EventCalendar
// =============================================================================

#[derive(Debug, Clone)]
pub struct EventCalendar {
    events: Vec<NewsEvent>,
    before: Duration,
    after: Duration,
    /// Upper-cased.
    critical_keywords: Vec<String>,
}

impl EventCalendar {
    pub fn new(config: &NewsConfig, events: Vec<NewsEvent>) -> Self {
        Self {
            events,
            before: Duration::minutes(config.blackout_min_before.max(0)),
            after: Duration::minutes(config.blackout_min_after.max(0)),
            critical_keywords: config.critical_keywords.iter().map(|k| k.to_uppercase()).collect(),
        }
    }

    /// Calendar for `config`, reading its event file when one is set.
    pub fn load(config: &NewsConfig) -> Result<Self, CalendarError> {
        let events = match &config.calendar_path {
            Some(path) => read_events(path)?,
            None => Vec::new(),
        };
        Ok(Self::new(config, events))
    }

    pub fn events(&self) -> &[NewsEvent] {
        &self.events
    }

    pub fn is_critical(&self, event: &NewsEvent) -> bool {
        let name = event.name.to_uppercase();
        self.critical_keywords.iter().any(|k| name.contains(k.as_str()))
    }

    /// Blackout window around `event`.
    pub fn window(&self, event: &NewsEvent) -> (DateTime<Utc>, DateTime<Utc>) {
        if self.is_critical(event) {
            (event.time - self.before * 2, event.time + self.after * 3 / 2)
        } else {
            (event.time - self.before, event.time + self.after)
        }
    }
}

fn read_events(path: &Path) -> Result<Vec<NewsEvent>, CalendarError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CalendarError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let events: Vec<NewsEvent> = serde_json::from_str(&raw).map_err(|source| CalendarError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), events = events.len(), "News calendar loaded");
    Ok(events)
}

impl NewsCalendar for EventCalendar {
    fn is_blackout(&self, currencies: &[String], now: DateTime<Utc>) -> BlackoutStatus {
        let relevant = self
            .events
            .iter()
            .filter(|e| currencies.iter().any(|c| c.eq_ignore_ascii_case(&e.currency)));
        let (critical, other): (Vec<&NewsEvent>, Vec<&NewsEvent>) = relevant.partition(|e| self.is_critical(e));

        for event in critical.into_iter().chain(other) {
            let (start, end) = self.window(event);
            if start <= now && now <= end {
                let minutes_remaining = ((end - now).num_seconds() / 60).max(1);
                debug!(event = %event.name, currency = %event.currency, minutes_remaining, "News blackout");
                return BlackoutStatus {
                    active: true,
                    event: Some(event.clone()),
                    minutes_remaining,
                };
            }
        }
        BlackoutStatus::clear()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, h, m, 0).unwrap()
    }

    fn event(currency: &str, name: &str, h: u32, m: u32) -> NewsEvent {
        NewsEvent {
            source: "test".to_string(),
            currency: currency.to_string(),
            time: at(h, m),
            name: name.to_string(),
            impact: "high".to_string(),
        }
    }

    fn usd() -> Vec<String> {
        vec!["USD".to_string()]
    }

    #[test]
    fn ordinary_event_window() {
        let cal = EventCalendar::new(&NewsConfig::default(), vec![event("USD", "ISM Services", 15, 0)]);
        assert!(!cal.is_blackout(&usd(), at(14, 29)).active);
        let s = cal.is_blackout(&usd(), at(14, 30));
        assert!(s.active);
        assert_eq!(s.minutes_remaining, 60);
        assert!(cal.is_blackout(&usd(), at(15, 30)).active);
        assert!(!cal.is_blackout(&usd(), at(15, 31)).active);
        assert!(!cal.is_blackout(&["EUR".to_string()], at(15, 0)).active);
    }

    #[test]
    fn critical_event_widens_window() {
        let cal = EventCalendar::new(&NewsConfig::default(), vec![event("USD", "Nonfarm Payrolls", 13, 30)]);
        assert!(cal.is_critical(&cal.events()[0]));
        // 60 minutes before, 45 after.
        assert!(cal.is_blackout(&usd(), at(12, 30)).active);
        assert!(!cal.is_blackout(&usd(), at(12, 29)).active);
        let s = cal.is_blackout(&usd(), at(14, 15));
        assert!(s.active);
        assert_eq!(s.minutes_remaining, 1);
        assert!(!cal.is_blackout(&usd(), at(14, 16)).active);
    }

    #[test]
    fn keywords_are_case_insensitive_and_critical_reported_first() {
        let cal = EventCalendar::new(
            &NewsConfig::default(),
            vec![event("USD", "Jobless Claims", 13, 30), event("usd", "core cpi m/m", 13, 30)],
        );
        let s = cal.is_blackout(&usd(), at(13, 30));
        assert_eq!(s.event.unwrap().name, "core cpi m/m");
        assert_eq!(s.minutes_remaining, 45);
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("smc_news_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"[{"currency":"USD","time":"2024-01-05T13:30:00Z","name":"FOMC Statement"}]"#,
        )
        .unwrap();
        let config = NewsConfig {
            calendar_path: Some(path.clone()),
            ..NewsConfig::default()
        };
        let cal = EventCalendar::load(&config).unwrap();
        assert_eq!(cal.events().len(), 1);
        assert_eq!(cal.events()[0].impact, "high");
        std::fs::remove_file(&path).ok();

        assert!(matches!(EventCalendar::load(&config), Err(CalendarError::Io { .. })));
        assert!(EventCalendar::load(&NewsConfig::default()).unwrap().events().is_empty());
    }
}
