use crate::infra;
use autoearn_application::config::Config;
use autoearn_application::meta;
use autoearn_application::trading::{
    run_session, CycleOutcome, Deadline, EngineSettings, SessionEnd, SessionStatus, TradingEngine,
};
use autoearn_infrastructure::execution::paper::PaperOrderExecutor;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const HEARTBEAT_EVERY: Duration = Duration::from_secs(60);

/// Where candles come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    Live,
    Replay(PathBuf),
}

impl Feed {
    pub fn mode(&self) -> &'static str {
        match self {
            Feed::Live => "run",
            Feed::Replay(_) => "replay",
        }
    }
}

pub fn run_validate(config: &Config, config_source: &str) -> Value {
    let params = config.pipeline_params();
    let cc = &params.current_candle;
    json!({
        "status": "ok",
        "mode": "validate",
        "engine": meta::engine_name(),
        "version": meta::engine_version(),
        "config_fingerprint": meta::config_fingerprint(config_source),
        "instrument": config.trade.instrument,
        "balance": config.trade.balance,
        "candle_interval": config.candle_interval(),
        "history_capacity": config.history_capacity(),
        "runtime_secs": config.trade.runtime_secs,
        "replay_path": config.replay_path(),
        "trade_log": infra::trade_log_label(config),
        "pipeline": {
            "consecutive_reversal_threshold": params.consecutive_reversal.threshold,
            "long_take_profit": cc.long_take_profit,
            "short_take_profit": cc.short_take_profit,
            "long_open": cc.long_open,
            "short_open": cc.short_open,
            "long_take_profit_burst": cc.long_take_profit_burst,
            "short_take_profit_burst": cc.short_take_profit_burst,
            "short_profit_scale": cc.short_profit_scale,
        },
    })
}

/// Runs one trading session to completion on a fresh runtime and returns its
/// JSON summary.
pub fn run_trading(config: Config, config_source: String, feed: Feed) -> Result<Value, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("failed to init tokio runtime: {err}"))?;
    runtime.block_on(run_trading_async(config, config_source, feed))
}

async fn run_trading_async(
    config: Config,
    config_source: String,
    feed: Feed,
) -> Result<Value, String> {
    let fingerprint = meta::config_fingerprint(&config_source);
    tracing::info!(
        engine = meta::engine_name(),
        version = meta::engine_version(),
        config_fingerprint = %fingerprint,
        mode = feed.mode(),
        instrument = %config.trade.instrument,
        "starting session"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let stop_on_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current cycle");
            stop_on_signal.store(true, Ordering::Relaxed);
        }
    });

    let latest = Arc::new(Mutex::new(SessionStatus::default()));
    let mut handle = tokio::task::spawn_blocking({
        let latest = latest.clone();
        let control = Deadline::new(stop, config.runtime());
        move || drive(&config, &feed, &control, &latest)
    });

    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + HEARTBEAT_EVERY,
        HEARTBEAT_EVERY,
    );
    let mut summary = loop {
        tokio::select! {
            joined = &mut handle => {
                break joined.map_err(|err| format!("session task failed: {err}"))??;
            }
            _ = heartbeat.tick() => {
                let status = latest.lock().clone();
                tracing::info!(
                    connected = status.connected,
                    reconnects = status.reconnects,
                    candles = status.candles,
                    rejected = status.rejected,
                    invalid_messages = status.invalid_messages,
                    last_candle_ts = ?status.last_candle_timestamp,
                    last_error = ?status.last_error,
                    "session heartbeat"
                );
            }
        }
    };
    summary["config_fingerprint"] = json!(fingerprint);
    Ok(summary)
}

fn drive(
    config: &Config,
    feed: &Feed,
    control: &Deadline<Arc<AtomicBool>>,
    latest: &Mutex<SessionStatus>,
) -> Result<Value, String> {
    let started_at = Utc::now();
    let trade_log = infra::build_trade_log(config)?;
    let mut engine = TradingEngine::new(
        EngineSettings::from_config(config),
        PaperOrderExecutor::new(),
        trade_log,
    );

    if *feed == Feed::Live && config.seed_history() {
        match infra::fetch_seed_history(config) {
            Ok(candles) => {
                engine.seed_history(candles);
            }
            Err(err) => tracing::warn!(error = %err, "history seeding failed, starting cold"),
        }
    }

    let mut connect = || match feed {
        Feed::Live => infra::connect_live(config),
        Feed::Replay(path) => infra::open_replay(path),
    };
    let mut on_status = |status: &SessionStatus| {
        metrics::gauge!("autoearn.session.connected").set(if status.connected { 1.0 } else { 0.0 });
        *latest.lock() = status.clone();
    };
    let mut signals: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut on_cycle = |outcome: &CycleOutcome| {
        *signals.entry(outcome.operation.as_str()).or_default() += 1;
    };

    let report = run_session(
        &mut engine,
        &mut connect,
        config.backoff(),
        control,
        &mut on_status,
        &mut on_cycle,
    )?;

    let end = match report.end {
        SessionEnd::Exhausted => "exhausted",
        SessionEnd::Cancelled if control.expired() => "deadline",
        SessionEnd::Cancelled => "cancelled",
    };
    let stats = engine.stats();
    let position = engine.position();
    let balance = engine.account().available_balance();
    tracing::info!(
        end,
        cycles = stats.cycles,
        orders_filled = stats.orders_filled,
        balance,
        position = %position.side,
        "session finished"
    );

    Ok(json!({
        "status": "ok",
        "mode": feed.mode(),
        "end": end,
        "engine": meta::engine_name(),
        "version": meta::engine_version(),
        "instrument": config.trade.instrument,
        "started_at": started_at.to_rfc3339(),
        "finished_at": Utc::now().to_rfc3339(),
        "candles": stats.candles,
        "rejected": stats.rejected,
        "invalid_messages": report.status.invalid_messages,
        "reconnects": report.status.reconnects,
        "cycles": stats.cycles,
        "signals": signals,
        "orders_filled": stats.orders_filled,
        "orders_failed": stats.orders_failed,
        "trade_log": infra::trade_log_label(config),
        "trade_log_failures": stats.trade_log_failures,
        "initial_balance": config.trade.balance,
        "balance": balance,
        "position": position,
    }))
}
