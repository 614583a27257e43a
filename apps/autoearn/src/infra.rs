use autoearn_application::config::{Config, TradeLogKind, DEFAULT_TRADE_TABLE};
use autoearn_domain::repositories::market_stream::{CandleHistory, CandleStream};
use autoearn_domain::repositories::trade_log::{NoopTradeLog, TradeLog};
use autoearn_domain::value_objects::candle::Candle;
use autoearn_infrastructure::market_data::okx_history::{OkxHistoryClient, OKX_REST_BASE};
use autoearn_infrastructure::market_stream::replay::ReplayCandleStream;
use autoearn_infrastructure::persistence::csv_trade_log::CsvTradeLog;
use autoearn_infrastructure::persistence::postgres_trade_log::PostgresTradeLog;
use std::path::Path;

pub const DB_URL_ENV: &str = "AUTOEARN_DB_URL";
const DEFAULT_POOL_MAX_SIZE: u32 = 4;

pub type BoxedTradeLog = Box<dyn TradeLog + Send>;

fn resolve_db_url(config: &Config) -> Result<String, String> {
    match config.trade_log.as_ref().and_then(|t| t.url.as_deref()) {
        Some(url) if !url.trim().is_empty() => Ok(url.to_string()),
        _ => std::env::var(DB_URL_ENV).map_err(|_| {
            format!("missing trade_log.url in config and env {DB_URL_ENV} is not set")
        }),
    }
}

pub fn build_trade_log(config: &Config) -> Result<BoxedTradeLog, String> {
    let Some(trade_log) = &config.trade_log else {
        return Ok(Box::new(NoopTradeLog));
    };
    match trade_log.kind {
        TradeLogKind::None => Ok(Box::new(NoopTradeLog)),
        TradeLogKind::Csv => {
            let path = trade_log
                .path
                .as_deref()
                .ok_or_else(|| "trade_log.path is required for kind = \"csv\"".to_string())?;
            Ok(Box::new(CsvTradeLog::open(Path::new(path))?))
        }
        TradeLogKind::Postgres => {
            let db_url = resolve_db_url(config)?;
            let table = trade_log.table.as_deref().unwrap_or(DEFAULT_TRADE_TABLE);
            let pool_max_size = trade_log.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE);
            let log = PostgresTradeLog::new(&db_url, table, pool_max_size)?;
            // A missing table surfaces again as per-record insert failures.
            if let Err(err) = log.create_table() {
                tracing::warn!(error = %err, table, "trade table not ready at startup");
            }
            Ok(Box::new(log))
        }
    }
}

pub fn trade_log_label(config: &Config) -> &'static str {
    match config.trade_log.as_ref().map(|t| t.kind) {
        None | Some(TradeLogKind::None) => "none",
        Some(TradeLogKind::Csv) => "csv",
        Some(TradeLogKind::Postgres) => "postgres",
    }
}

pub fn open_replay(path: &Path) -> Result<Box<dyn CandleStream>, String> {
    Ok(Box::new(ReplayCandleStream::open(path)?))
}

#[cfg(feature = "realtime-okx")]
pub fn connect_live(config: &Config) -> Result<Box<dyn CandleStream>, String> {
    use autoearn_infrastructure::market_stream::okx::OkxCandleStream;
    use autoearn_infrastructure::market_stream::okx_codec::OKX_PUBLIC_BUSINESS_WS;

    let ws_url = config
        .stream
        .as_ref()
        .and_then(|s| s.ws_url.as_deref())
        .unwrap_or(OKX_PUBLIC_BUSINESS_WS);
    let stream = OkxCandleStream::connect(ws_url, &config.trade.instrument, config.candle_interval())?;
    match config.capture_path() {
        Some(path) => Ok(Box::new(stream.with_capture(Path::new(path))?)),
        None => Ok(Box::new(stream)),
    }
}

#[cfg(not(feature = "realtime-okx"))]
pub fn connect_live(_config: &Config) -> Result<Box<dyn CandleStream>, String> {
    Err("autoearn was built without feature realtime-okx".to_string())
}

/// Fetches recent finished candles for the history warm-up. Failures are
/// returned so the caller can decide to start cold.
pub fn fetch_seed_history(config: &Config) -> Result<Vec<Candle>, String> {
    let rest_url = config
        .stream
        .as_ref()
        .and_then(|s| s.rest_url.as_deref())
        .unwrap_or(OKX_REST_BASE);
    let client = OkxHistoryClient::new(rest_url, config.candle_interval())?;
    // One extra row: the newest one is usually the in-progress bar.
    client.recent_candles(&config.trade.instrument, config.history_capacity() + 1)
}
