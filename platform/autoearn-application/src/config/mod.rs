use autoearn_domain::errors::ConfigError;
use autoearn_domain::services::candle_book::DEFAULT_HISTORY_CAPACITY;
use autoearn_domain::services::pipeline::consecutive_reversal::{
    ConsecutiveReversalParams, DEFAULT_THRESHOLD,
};
use autoearn_domain::services::pipeline::current_candle::{
    CurrentCandleParams, ShortProfitScale, DEFAULT_LONG_OPEN, DEFAULT_LONG_TAKE_PROFIT,
    DEFAULT_SHORT_OPEN, DEFAULT_SHORT_TAKE_PROFIT,
};
use autoearn_domain::services::pipeline::PipelineParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CANDLE_INTERVAL: &str = "5m";
pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 250;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 10_000;
pub const DEFAULT_TRADE_TABLE: &str = "operation";
/// One year.
pub const MAX_RUNTIME_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub trade: TradeConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub stream: Option<StreamConfig>,
    pub trade_log: Option<TradeLogConfig>,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TradeConfig {
    pub instrument: String,
    pub balance: f64,
    pub candle_interval: Option<String>,
    pub history_capacity: Option<usize>,
    /// Stop the session after this many seconds. Unlimited when absent.
    pub runtime_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub consecutive_reversal: ConsecutiveReversalConfig,
    #[serde(default)]
    pub current_candle: CurrentCandleConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ConsecutiveReversalConfig {
    pub threshold: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct CurrentCandleConfig {
    pub long_take_profit: Option<f64>,
    pub short_take_profit: Option<f64>,
    pub long_open: Option<f64>,
    pub short_open: Option<f64>,
    pub long_take_profit_burst: Option<f64>,
    pub short_take_profit_burst: Option<f64>,
    pub short_profit_scale: Option<ShortProfitScale>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub replay_path: Option<String>,
    pub ws_url: Option<String>,
    pub rest_url: Option<String>,
    pub seed_history: Option<bool>,
    /// Append every raw websocket frame here; the file replays with `replay_path`.
    pub capture_path: Option<String>,
    pub reconnect_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeLogKind {
    None,
    Csv,
    Postgres,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TradeLogConfig {
    pub kind: TradeLogKind,
    pub path: Option<String>,
    pub url: Option<String>,
    pub table: Option<String>,
    pub pool_max_size: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
}

/// Reconnect delays for the stream session: starts at `initial_ms`, doubles on
/// every failed attempt up to `max_ms`, and resets after a successful reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub max_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_ms: DEFAULT_RECONNECT_BACKOFF_MS,
            max_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl Config {
    pub fn candle_interval(&self) -> &str {
        self.trade
            .candle_interval
            .as_deref()
            .unwrap_or(DEFAULT_CANDLE_INTERVAL)
    }

    pub fn history_capacity(&self) -> usize {
        self.trade
            .history_capacity
            .unwrap_or(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn pipeline_params(&self) -> PipelineParams {
        let cc = &self.pipeline.current_candle;
        let long_take_profit = cc.long_take_profit.unwrap_or(DEFAULT_LONG_TAKE_PROFIT);
        let short_take_profit = cc.short_take_profit.unwrap_or(DEFAULT_SHORT_TAKE_PROFIT);
        PipelineParams {
            consecutive_reversal: ConsecutiveReversalParams {
                threshold: self
                    .pipeline
                    .consecutive_reversal
                    .threshold
                    .unwrap_or(DEFAULT_THRESHOLD),
            },
            current_candle: CurrentCandleParams {
                long_take_profit,
                short_take_profit,
                long_open: cc.long_open.unwrap_or(DEFAULT_LONG_OPEN),
                short_open: cc.short_open.unwrap_or(DEFAULT_SHORT_OPEN),
                long_take_profit_burst: cc.long_take_profit_burst.unwrap_or(long_take_profit),
                short_take_profit_burst: cc.short_take_profit_burst.unwrap_or(short_take_profit),
                short_profit_scale: cc.short_profit_scale.unwrap_or_default(),
            },
        }
    }

    pub fn backoff(&self) -> BackoffPolicy {
        let defaults = BackoffPolicy::default();
        let Some(stream) = &self.stream else {
            return defaults;
        };
        BackoffPolicy {
            initial_ms: stream.reconnect_backoff_ms.unwrap_or(defaults.initial_ms),
            max_ms: stream.max_backoff_ms.unwrap_or(defaults.max_ms),
        }
    }

    pub fn replay_path(&self) -> Option<&str> {
        self.stream.as_ref().and_then(|s| s.replay_path.as_deref())
    }

    pub fn capture_path(&self) -> Option<&str> {
        self.stream.as_ref().and_then(|s| s.capture_path.as_deref())
    }

    pub fn seed_history(&self) -> bool {
        self.stream
            .as_ref()
            .and_then(|s| s.seed_history)
            .unwrap_or(true)
    }

    pub fn runtime(&self) -> Option<Duration> {
        self.trade.runtime_secs.map(Duration::from_secs)
    }

    pub fn log_level(&self) -> &str {
        self.log
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    pub fn log_format(&self) -> LogFormat {
        self.log.as_ref().and_then(|l| l.format).unwrap_or_default()
    }

    /// Checks every value the engine relies on. Run once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trade.instrument.trim().is_empty() {
            return Err(ConfigError::invalid("trade.instrument", "must not be empty"));
        }
        if !self.trade.balance.is_finite() || self.trade.balance <= 0.0 {
            return Err(ConfigError::invalid(
                "trade.balance",
                format!("must be finite and > 0, got {}", self.trade.balance),
            ));
        }
        if self.candle_interval().trim().is_empty() {
            return Err(ConfigError::invalid("trade.candle_interval", "must not be empty"));
        }
        if self.history_capacity() < 1 {
            return Err(ConfigError::invalid("trade.history_capacity", "must be >= 1"));
        }
        match self.trade.runtime_secs {
            Some(0) => {
                return Err(ConfigError::invalid(
                    "trade.runtime_secs",
                    "must be > 0; omit it to run until stopped",
                ));
            }
            Some(secs) if secs > MAX_RUNTIME_SECS => {
                return Err(ConfigError::invalid(
                    "trade.runtime_secs",
                    format!("must be <= {MAX_RUNTIME_SECS}; omit it to run until stopped"),
                ));
            }
            _ => {}
        }

        let params = self.pipeline_params();
        if params.consecutive_reversal.threshold < 1 {
            return Err(ConfigError::invalid(
                "pipeline.consecutive_reversal.threshold",
                "must be >= 1",
            ));
        }
        let cc = &params.current_candle;
        for (field, value) in [
            ("long_take_profit", cc.long_take_profit),
            ("short_take_profit", cc.short_take_profit),
            ("long_take_profit_burst", cc.long_take_profit_burst),
            ("short_take_profit_burst", cc.short_take_profit_burst),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    format!("pipeline.current_candle.{field}"),
                    format!("must be finite and >= 0, got {value}"),
                ));
            }
        }
        for (field, value) in [("long_open", cc.long_open), ("short_open", cc.short_open)] {
            if !value.is_finite() {
                return Err(ConfigError::invalid(
                    format!("pipeline.current_candle.{field}"),
                    format!("must be finite, got {value}"),
                ));
            }
        }

        let backoff = self.backoff();
        if backoff.initial_ms == 0 {
            return Err(ConfigError::invalid(
                "stream.reconnect_backoff_ms",
                "must be > 0",
            ));
        }
        if backoff.max_ms < backoff.initial_ms {
            return Err(ConfigError::invalid(
                "stream.max_backoff_ms",
                format!("must be >= reconnect_backoff_ms ({})", backoff.initial_ms),
            ));
        }

        if let Some(trade_log) = &self.trade_log {
            match trade_log.kind {
                TradeLogKind::None => {}
                TradeLogKind::Csv => {
                    if trade_log.path.as_deref().map_or(true, |p| p.trim().is_empty()) {
                        return Err(ConfigError::invalid(
                            "trade_log.path",
                            "required when kind = \"csv\"",
                        ));
                    }
                }
                TradeLogKind::Postgres => {
                    if trade_log.table.as_deref().is_some_and(|t| t.trim().is_empty()) {
                        return Err(ConfigError::invalid("trade_log.table", "must not be empty"));
                    }
                    if trade_log.pool_max_size == Some(0) {
                        return Err(ConfigError::invalid("trade_log.pool_max_size", "must be > 0"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Reads, parses and validates a config file, returning the raw source too.
pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = parse_config(&contents)
        .map_err(|err| format!("{}: {}", path.display(), err))?;
    Ok((config, contents))
}

pub fn parse_config(contents: &str) -> Result<Config, String> {
    let config: Config =
        toml::from_str(contents).map_err(|err| format!("failed to parse TOML: {err}"))?;
    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[trade]
instrument = "OL-USDT"
balance = 1000.0
"#;

    #[test]
    fn minimal_config_takes_documented_defaults() {
        let config = parse_config(MINIMAL).expect("config should parse");
        assert_eq!(config.trade.instrument, "OL-USDT");
        assert_eq!(config.candle_interval(), "5m");
        assert_eq!(config.history_capacity(), 30);
        assert_eq!(config.backoff(), BackoffPolicy::default());
        assert_eq!(config.log_format(), LogFormat::Text);

        let params = config.pipeline_params();
        assert_eq!(params.consecutive_reversal.threshold, 3);
        let cc = params.current_candle;
        assert_eq!(
            (cc.long_take_profit, cc.short_take_profit, cc.long_open, cc.short_open),
            (2.0, 2.0, 3.0, 3.0)
        );
        assert_eq!(cc.short_profit_scale, ShortProfitScale::Ratio);
    }

    #[test]
    fn burst_thresholds_default_to_take_profit() {
        let config = parse_config(
            r#"
[trade]
instrument = "OL-USDT"
balance = 10.0

[pipeline.current_candle]
long_take_profit = 1.5
short_take_profit = 4.0
short_take_profit_burst = 6.0
short_profit_scale = "percent"
"#,
        )
        .expect("config should parse");
        let cc = config.pipeline_params().current_candle;
        assert_eq!(cc.long_take_profit_burst, 1.5);
        assert_eq!(cc.short_take_profit_burst, 6.0);
        assert_eq!(cc.short_profit_scale, ShortProfitScale::Percent);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = parse_config(
            r#"
[trade]
instrument = "OL-USDT"
balance = 10.0
leverage = 3
"#,
        )
        .expect_err("unknown field should fail");
        assert!(err.to_lowercase().contains("unknown field"));
    }

    #[test]
    fn rejects_non_positive_balance() {
        let err = parse_config(
            r#"
[trade]
instrument = "OL-USDT"
balance = 0.0
"#,
        )
        .expect_err("zero balance");
        assert!(err.contains("trade.balance"));
    }

    #[test]
    fn rejects_zero_threshold_and_negative_take_profit() {
        let err = parse_config(
            r#"
[trade]
instrument = "OL-USDT"
balance = 10.0

[pipeline.consecutive_reversal]
threshold = 0
"#,
        )
        .expect_err("zero threshold");
        assert!(err.contains("threshold"));

        let err = parse_config(
            r#"
[trade]
instrument = "OL-USDT"
balance = 10.0

[pipeline.current_candle]
long_take_profit = -1.0
"#,
        )
        .expect_err("negative take profit");
        assert!(err.contains("long_take_profit"));
    }

    #[test]
    fn negative_open_thresholds_are_allowed() {
        let config = parse_config(
            r#"
[trade]
instrument = "OL-USDT"
balance = 10.0

[pipeline.current_candle]
long_open = -1.0
short_open = -1.0
"#,
        )
        .expect("negative open thresholds");
        assert_eq!(config.pipeline_params().current_candle.long_open, -1.0);
    }

    #[test]
    fn csv_trade_log_requires_path() {
        let err = parse_config(
            r#"
[trade]
instrument = "OL-USDT"
balance = 10.0

[trade_log]
kind = "csv"
"#,
        )
        .expect_err("csv without path");
        assert!(err.contains("trade_log.path"));
    }

    #[test]
    fn backoff_must_not_exceed_its_cap() {
        let err = parse_config(
            r#"
[trade]
instrument = "OL-USDT"
balance = 10.0

[stream]
reconnect_backoff_ms = 500
max_backoff_ms = 100
"#,
        )
        .expect_err("inverted backoff");
        assert!(err.contains("max_backoff_ms"));
    }

    #[test]
    fn runtime_and_capture_are_optional() {
        let config = parse_config(MINIMAL).expect("config should parse");
        assert_eq!(config.runtime(), None);
        assert_eq!(config.capture_path(), None);
        assert!(config.seed_history());

        let config = parse_config(
            r#"
[trade]
instrument = "OL-USDT"
balance = 10.0
runtime_secs = 3600

[stream]
capture_path = "testdata/capture.jsonl"
seed_history = false
"#,
        )
        .expect("config should parse");
        assert_eq!(config.runtime(), Some(Duration::from_secs(3600)));
        assert_eq!(config.capture_path(), Some("testdata/capture.jsonl"));
        assert!(!config.seed_history());
    }

    #[test]
    fn rejects_zero_or_huge_runtime() {
        for secs in [0, MAX_RUNTIME_SECS + 1, i64::MAX as u64] {
            let err = parse_config(&format!(
                "[trade]\ninstrument = \"OL-USDT\"\nbalance = 10.0\nruntime_secs = {secs}\n"
            ))
            .expect_err("runtime out of range");
            assert!(err.contains("trade.runtime_secs"), "{err}");
        }
        let config = parse_config(&format!(
            "[trade]\ninstrument = \"OL-USDT\"\nbalance = 10.0\nruntime_secs = {MAX_RUNTIME_SECS}\n"
        ))
        .expect("one year is accepted");
        assert_eq!(config.runtime(), Some(Duration::from_secs(MAX_RUNTIME_SECS)));

        let err = parse_config(
            r#"
[trade]
instrument = "OL-USDT"
balance = 10.0
runtime_secs = 0
"#,
        )
        .expect_err("zero runtime");
        assert!(err.contains("trade.runtime_secs"));
    }

    #[test]
    fn serialized_config_parses_back() {
        let config = parse_config(MINIMAL).expect("config should parse");
        let rendered = to_toml_pretty(&config).expect("render");
        let again = parse_config(&rendered).expect("reparse");
        assert_eq!(again.trade.instrument, config.trade.instrument);
    }
}
