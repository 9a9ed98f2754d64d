// =============================================================================
// Engine Configuration: JSON settings with atomic save
// =============================================================================
//
// Every tunable of the signal engine lives here. All fields carry a serde
// default so a partial (or empty) file loads, and adding fields never breaks
// an older config.
//
// Persistence uses the tmp + rename pattern. Environment overrides:
//   SMC_CONFIG   path of the config file (read by the binary)
//   SMC_SYMBOLS  comma-separated symbol list
// =============================================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::features::DetectorConfig;
use crate::gates::{default_basket, CorrelatedAsset, FlowConfig};
use crate::news::NewsConfig;

pub const DEFAULT_CONFIG_PATH: &str = "smc_config.json";

// =============================================================================
// Default-value helpers
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbols() -> Vec<String> {
    vec!["XAUUSD".to_string()]
}

fn default_symbol_currencies() -> HashMap<String, Vec<String>> {
    HashMap::from([("XAUUSD".to_string(), vec!["USD".to_string(), "XAU".to_string()])])
}

fn default_poll_seconds() -> u64 {
    60
}

fn default_lookback() -> usize {
    200
}

fn default_min_bars() -> usize {
    100
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_store_path() -> PathBuf {
    PathBuf::from("signals.json")
}

fn default_min_score() -> u8 {
    6
}

fn default_risk_per_trade() -> f64 {
    0.01
}

fn default_risk_r_multiples() -> Vec<f64> {
    vec![1.0, 2.0, 3.0]
}

fn default_price_decimals() -> u32 {
    2
}

fn default_stop_atr_buffer() -> f64 {
    0.25
}

fn default_max_retries() -> u32 {
    3
}

fn default_min_coverage() -> f64 {
    0.7
}

fn default_retry_delay_ms() -> u64 {
    500
}

// =============================================================================
// TradingConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Floor on the integer score, applied on top of the regime threshold.
    #[serde(default = "default_min_score")]
    pub min_score: u8,

    /// Base risk fraction before adaptive sizing (0.01 = 1 %).
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: f64,

    /// R multiples of the take-profit ladder.
    #[serde(default = "default_risk_r_multiples")]
    pub risk_r_multiples: Vec<f64>,

    /// Run the correlation gate. Off means it is skipped and sizing uses 0.5.
    #[serde(default = "default_true")]
    pub correlation_checks: bool,

    /// Run the session gate. Off means sizing uses 1.0.
    #[serde(default = "default_true")]
    pub session_aware: bool,

    /// Run the flow gate. Off means sizing uses 0.5.
    #[serde(default = "default_true")]
    pub flow_checks: bool,

    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,

    /// Per-symbol rounding, e.g. `{"EURUSD": 5}`. Falls back to `price_decimals`.
    #[serde(default)]
    pub symbol_decimals: HashMap<String, u32>,

    /// Stop distance past the OB wick, in H1 ATRs.
    #[serde(default = "default_stop_atr_buffer")]
    pub stop_atr_buffer: f64,
}

impl TradingConfig {
    pub fn decimals_for(&self, symbol: &str) -> u32 {
        self.symbol_decimals.get(symbol).copied().unwrap_or(self.price_decimals)
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            risk_per_trade: default_risk_per_trade(),
            risk_r_multiples: default_risk_r_multiples(),
            correlation_checks: true,
            session_aware: true,
            flow_checks: true,
            price_decimals: default_price_decimals(),
            symbol_decimals: HashMap::new(),
            stop_atr_buffer: default_stop_atr_buffer(),
        }
    }
}

// =============================================================================
// ProviderConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fraction of the requested bars a fetch must return.
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl ProviderConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            min_coverage: default_min_coverage(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Symbols & polling --------------------------------------------------

    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// News currencies per symbol. Symbols without an entry never black out.
    #[serde(default = "default_symbol_currencies")]
    pub symbol_currencies: HashMap<String, Vec<String>>,

    /// Symbol the regime is classified from. Defaults to the first symbol.
    #[serde(default)]
    pub regime_symbol: Option<String>,

    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,

    /// Bars requested per timeframe.
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    /// Fewer bars than this on any timeframe abstains.
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,

    /// Replay data directory (`<SYMBOL>_<TF>.json`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    // --- Sections -----------------------------------------------------------

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub trading: TradingConfig,

    #[serde(default)]
    pub news: NewsConfig,

    /// Correlated asset basket.
    #[serde(default = "default_basket")]
    pub correlation: Vec<CorrelatedAsset>,

    #[serde(default)]
    pub flow: FlowConfig,

    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            symbol_currencies: default_symbol_currencies(),
            regime_symbol: None,
            poll_seconds: default_poll_seconds(),
            lookback: default_lookback(),
            min_bars: default_min_bars(),
            data_dir: default_data_dir(),
            store_path: default_store_path(),
            detector: DetectorConfig::default(),
            trading: TradingConfig::default(),
            news: NewsConfig::default(),
            correlation: default_basket(),
            flow: FlowConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            poll_seconds = config.poll_seconds,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Like `load`, but falls back to defaults with a warning.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "using default engine config");
                Self::default()
            }
        }
    }

    /// Persist to `path` atomically (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise engine config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }

    /// Apply `SMC_SYMBOLS` when set and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var("SMC_SYMBOLS") {
            self.apply_symbols_override(&raw);
        }
    }

    fn apply_symbols_override(&mut self, raw: &str) {
        let symbols: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            warn!(value = raw, "ignoring empty SMC_SYMBOLS");
            return;
        }
        info!(symbols = ?symbols, "symbols overridden from environment");
        self.symbols = symbols;
    }

    /// Reference symbol for regime classification.
    pub fn regime_symbol(&self) -> Option<&str> {
        self.regime_symbol
            .as_deref()
            .or_else(|| self.symbols.first().map(String::as_str))
    }

    pub fn currencies_for(&self, symbol: &str) -> &[String] {
        self.symbol_currencies.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }
}
