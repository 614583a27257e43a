use crate::config::BackoffPolicy;
use crate::trading::engine::{CycleOutcome, TradingEngine};
use autoearn_domain::repositories::market_stream::CandleStream;
use autoearn_domain::repositories::order_execution::OrderExecutor;
use autoearn_domain::repositories::trade_log::TradeLog;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info_span;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub connected: bool,
    pub reconnects: u64,
    pub last_error: Option<String>,
    pub last_candle_timestamp: Option<i64>,
    pub candles: u64,
    pub rejected: u64,
    pub invalid_messages: u64,
}

/// Polled between cycles, never inside one.
pub trait SessionControl {
    fn should_cancel(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopControl;

impl SessionControl for NoopControl {
    fn should_cancel(&self) -> bool {
        false
    }
}

impl SessionControl for AtomicBool {
    fn should_cancel(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<C: SessionControl + ?Sized> SessionControl for Arc<C> {
    fn should_cancel(&self) -> bool {
        (**self).should_cancel()
    }
}

/// Cancels once `runtime` has elapsed since construction, or when `inner` does.
/// A runtime too large to represent as an `Instant` never expires.
#[derive(Debug)]
pub struct Deadline<C> {
    inner: C,
    deadline: Option<Instant>,
}

impl<C: SessionControl> Deadline<C> {
    pub fn new(inner: C, runtime: Option<Duration>) -> Self {
        Self {
            inner,
            deadline: runtime.and_then(|r| Instant::now().checked_add(r)),
        }
    }

    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

impl<C: SessionControl> SessionControl for Deadline<C> {
    fn should_cancel(&self) -> bool {
        self.expired() || self.inner.should_cancel()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The stream reported the end of a finite feed.
    Exhausted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub end: SessionEnd,
    pub status: SessionStatus,
}

/// Pulls candles from a stream and feeds them to the engine until the stream
/// ends or `control` asks to stop.
///
/// A disconnected or protocol-broken stream is replaced through `connect`,
/// sleeping with exponential backoff between attempts. Bad payloads
/// (`StreamError::InvalidData`) and rejected candles are counted and skipped.
/// Only a failed *initial* connect is returned as an error.
pub fn run_session<E: OrderExecutor, L: TradeLog>(
    engine: &mut TradingEngine<E, L>,
    connect: &mut dyn FnMut() -> Result<Box<dyn CandleStream>, String>,
    backoff: BackoffPolicy,
    control: &dyn SessionControl,
    on_status: &mut dyn FnMut(&SessionStatus),
    on_cycle: &mut dyn FnMut(&CycleOutcome),
) -> Result<SessionReport, String> {
    let _span = info_span!(
        "session",
        instrument = %engine.settings().instrument,
        backoff_ms = backoff.initial_ms,
        max_backoff_ms = backoff.max_ms
    )
    .entered();

    let mut stream = connect()?;
    let mut status = SessionStatus {
        connected: true,
        ..SessionStatus::default()
    };
    on_status(&status);
    tracing::info!("stream connected");

    loop {
        if control.should_cancel() {
            tracing::info!(candles = status.candles, "session cancelled");
            return Ok(finish(SessionEnd::Cancelled, status));
        }

        match stream.next_candle() {
            Ok(Some(candle)) => {
                let timestamp = candle.timestamp;
                status.candles += 1;
                match engine.on_candle(candle) {
                    Ok(outcome) => {
                        status.last_candle_timestamp = Some(timestamp);
                        on_cycle(&outcome);
                    }
                    Err(_) => status.rejected += 1,
                }
                on_status(&status);
            }
            Ok(None) => {
                tracing::info!(candles = status.candles, "stream exhausted");
                return Ok(finish(SessionEnd::Exhausted, status));
            }
            Err(err) if !err.is_recoverable() => {
                status.invalid_messages += 1;
                metrics::counter!("autoearn.stream.invalid_messages").increment(1);
                tracing::warn!(error = %err, "skipping invalid stream message");
            }
            Err(err) => {
                metrics::counter!("autoearn.stream.disconnects").increment(1);
                tracing::warn!(error = %err, "stream lost, reconnecting");
                status.connected = false;
                status.last_error = Some(err.to_string());
                on_status(&status);

                match reconnect(connect, backoff, control, &mut status, on_status) {
                    Some(next) => stream = next,
                    None => {
                        tracing::info!(candles = status.candles, "session cancelled while reconnecting");
                        return Ok(finish(SessionEnd::Cancelled, status));
                    }
                }
            }
        }
    }
}

/// Retries `connect` until it succeeds. Returns `None` if cancelled first.
fn reconnect(
    connect: &mut dyn FnMut() -> Result<Box<dyn CandleStream>, String>,
    backoff: BackoffPolicy,
    control: &dyn SessionControl,
    status: &mut SessionStatus,
    on_status: &mut dyn FnMut(&SessionStatus),
) -> Option<Box<dyn CandleStream>> {
    let mut delay_ms = backoff.initial_ms;
    loop {
        if control.should_cancel() {
            return None;
        }
        thread::sleep(Duration::from_millis(delay_ms.min(backoff.max_ms)));
        delay_ms = delay_ms.saturating_mul(2).min(backoff.max_ms);

        status.reconnects = status.reconnects.saturating_add(1);
        metrics::counter!("autoearn.stream.reconnects").increment(1);
        match connect() {
            Ok(stream) => {
                status.connected = true;
                status.last_error = None;
                on_status(status);
                tracing::info!(reconnects = status.reconnects, "stream reconnected");
                return Some(stream);
            }
            Err(err) => {
                tracing::warn!(error = %err, next_delay_ms = delay_ms, "reconnect failed");
                status.last_error = Some(err);
                on_status(status);
            }
        }
    }
}

fn finish(end: SessionEnd, mut status: SessionStatus) -> SessionReport {
    status.connected = false;
    SessionReport { end, status }
}
