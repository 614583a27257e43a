use autoearn_application::config::{parse_config, BackoffPolicy};
use autoearn_application::trading::{
    run_session, EngineSettings, NoopControl, OrderOutcome, SessionEnd, TradingEngine,
};
use autoearn_domain::errors::OrderError;
use autoearn_domain::repositories::market_stream::{CandleStream, StreamError};
use autoearn_domain::repositories::order_execution::OrderExecutor;
use autoearn_domain::repositories::trade_log::TradeLog;
use autoearn_domain::value_objects::candle::Candle;
use autoearn_domain::value_objects::operation::Operation;
use autoearn_domain::value_objects::order::{OrderFill, OrderRequest};
use autoearn_domain::value_objects::side::{OrderSide, PositionSide};
use autoearn_domain::value_objects::trade_record::TradeRecord;
use autoearn_infrastructure::execution::paper::PaperOrderExecutor;
use autoearn_infrastructure::market_stream::replay::ReplayCandleStream;
use autoearn_infrastructure::persistence::memory_trade_log::MemoryTradeLog;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};

const CONFIG: &str = r#"
[trade]
instrument = "OL-USDT"
balance = 1000.0
"#;

fn settings() -> EngineSettings {
    EngineSettings::from_config(&parse_config(CONFIG).expect("config"))
}

fn finished(ts: i64, open: f64, close: f64) -> Candle {
    Candle::new(ts, open, open.max(close), open.min(close), close, true)
}

fn partial(ts: i64, open: f64, close: f64) -> Candle {
    Candle::new(ts, open, open.max(close), open.min(close), close, false)
}

/// Three red candles followed by a green one: a reversal long entry at 97.5.
fn reversal_setup() -> Vec<Candle> {
    vec![
        finished(1, 100.0, 99.0),
        finished(2, 99.0, 98.0),
        finished(3, 98.0, 97.0),
        finished(4, 97.0, 97.5),
    ]
}

fn push_line(candle: &Candle) -> String {
    format!(
        r#"{{"arg":{{"channel":"index-candle5m","instId":"OL-USDT"}},"data":[["{}","{}","{}","{}","{}","{}"]]}}"#,
        candle.timestamp,
        candle.open,
        candle.high,
        candle.low,
        candle.close,
        if candle.finished { "1" } else { "0" }
    )
}

struct RejectingExecutor;

impl OrderExecutor for RejectingExecutor {
    fn place_order(&self, _request: &OrderRequest) -> Result<OrderFill, OrderError> {
        Err(OrderError::Rejected("insufficient margin".to_string()))
    }
}

struct AnonymousFillExecutor;

impl OrderExecutor for AnonymousFillExecutor {
    fn place_order(&self, request: &OrderRequest) -> Result<OrderFill, OrderError> {
        Ok(OrderFill {
            order_id: String::new(),
            price: request.reference_price,
            filled_quantity: 1.0,
        })
    }
}

struct BrokenTradeLog;

impl TradeLog for BrokenTradeLog {
    fn record(&self, _trade: &TradeRecord) -> Result<(), String> {
        Err("database unavailable".to_string())
    }
}

struct Scripted {
    steps: VecDeque<Result<Option<Candle>, StreamError>>,
}

impl Scripted {
    fn boxed(steps: Vec<Result<Option<Candle>, StreamError>>) -> Box<dyn CandleStream> {
        Box::new(Self {
            steps: steps.into(),
        })
    }
}

impl CandleStream for Scripted {
    fn next_candle(&mut self) -> Result<Option<Candle>, StreamError> {
        self.steps.pop_front().unwrap_or(Ok(None))
    }
}

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        initial_ms: 1,
        max_ms: 4,
    }
}

#[test]
fn replayed_capture_enters_and_takes_profit() {
    let mut capture = String::from(
        r#"{"event":"subscribe","arg":{"channel":"index-candle5m","instId":"OL-USDT"}}"#,
    );
    capture.push('\n');
    for candle in reversal_setup()
        .iter()
        .chain([partial(5, 98.5, 99.5)].iter())
    {
        capture.push_str(&push_line(candle));
        capture.push('\n');
    }

    let mut engine = TradingEngine::new(settings(), PaperOrderExecutor::new(), MemoryTradeLog::new());
    let mut connected = false;
    let mut connect = || -> Result<Box<dyn CandleStream>, String> {
        if connected {
            return Err("replay already consumed".to_string());
        }
        connected = true;
        Ok(Box::new(ReplayCandleStream::from_reader(
            Cursor::new(capture.clone()),
            "capture",
        )))
    };
    let mut operations = Vec::new();
    let report = run_session(
        &mut engine,
        &mut connect,
        fast_backoff(),
        &NoopControl,
        &mut |_| {},
        &mut |outcome| operations.push(outcome.operation),
    )
    .expect("session");

    assert_eq!(report.end, SessionEnd::Exhausted);
    assert_eq!(report.status.candles, 5);
    assert_eq!(report.status.reconnects, 0);
    assert_eq!(operations[3], Operation::Long);
    assert_eq!(operations[4], Operation::Exit);

    let trades = engine.trade_log().records();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].side, OrderSide::Buy);
    assert_eq!(trades[0].price, 97.5);
    assert_eq!(trades[0].balance_change, -1000.0);
    assert_eq!(trades[1].side, OrderSide::Sell);
    assert_eq!(trades[1].price, 99.5);
    assert!(trades[1].resulting_balance > 1000.0);

    assert!(engine.position().is_flat());
    assert_eq!(engine.executor().fills(), 2);
    assert_eq!(engine.stats().orders_filled, 2);
}

#[test]
fn rejected_order_leaves_account_untouched() {
    let mut engine = TradingEngine::new(settings(), RejectingExecutor, MemoryTradeLog::new());
    let mut last = None;
    for candle in reversal_setup() {
        last = Some(engine.on_candle(candle).expect("valid candle"));
    }

    let outcome = last.expect("outcome");
    assert_eq!(outcome.operation, Operation::Long);
    assert!(matches!(
        outcome.order,
        Some(OrderOutcome::Failed(OrderError::Rejected(_)))
    ));
    assert!(engine.position().is_flat());
    assert_eq!(engine.account().available_balance(), 1000.0);
    assert!(engine.trade_log().is_empty());
    assert_eq!(engine.stats().orders_failed, 1);
}

#[test]
fn fill_without_order_id_is_treated_as_failed() {
    let mut engine = TradingEngine::new(settings(), AnonymousFillExecutor, MemoryTradeLog::new());
    let mut last = None;
    for candle in reversal_setup() {
        last = Some(engine.on_candle(candle).expect("valid candle"));
    }

    let outcome = last.expect("outcome");
    let Some(OrderOutcome::Failed(OrderError::MissingOrderId { client_order_id })) = &outcome.order
    else {
        panic!("expected a missing order id failure, got {:?}", outcome.order);
    };
    assert!(client_order_id.starts_with("buy"), "{client_order_id}");
    assert!(engine.position().is_flat());
    assert_eq!(engine.account().available_balance(), 1000.0);
    assert!(engine.trade_log().is_empty());
    assert_eq!(engine.stats().orders_failed, 1);
}

#[test]
fn trade_log_failure_does_not_block_trading() {
    let mut engine = TradingEngine::new(settings(), PaperOrderExecutor::new(), BrokenTradeLog);
    for candle in reversal_setup() {
        engine.on_candle(candle).expect("valid candle");
    }

    assert_eq!(engine.position().side, PositionSide::Long);
    assert_eq!(engine.stats().orders_filled, 1);
    assert_eq!(engine.stats().trade_log_failures, 1);
    assert_eq!(engine.account().available_balance(), 0.0);
}

#[test]
fn session_reconnects_and_skips_invalid_messages() {
    let mut engine = TradingEngine::new(settings(), PaperOrderExecutor::new(), MemoryTradeLog::new());
    let mut scripts = VecDeque::from(vec![
        vec![
            Ok(Some(finished(1, 1.0, 1.1))),
            Err(StreamError::Disconnected("connection reset".to_string())),
        ],
        vec![
            Err(StreamError::InvalidData("bad json".to_string())),
            Ok(Some(finished(2, 1.1, 1.2))),
            Ok(None),
        ],
    ]);
    let mut connect = || -> Result<Box<dyn CandleStream>, String> {
        scripts
            .pop_front()
            .map(Scripted::boxed)
            .ok_or_else(|| "no more streams".to_string())
    };
    let mut saw_disconnect = false;
    let report = run_session(
        &mut engine,
        &mut connect,
        fast_backoff(),
        &NoopControl,
        &mut |status| saw_disconnect |= !status.connected,
        &mut |_| {},
    )
    .expect("session");

    assert!(saw_disconnect);
    assert_eq!(report.end, SessionEnd::Exhausted);
    assert_eq!(report.status.reconnects, 1);
    assert_eq!(report.status.invalid_messages, 1);
    assert_eq!(report.status.candles, 2);
    assert_eq!(report.status.last_candle_timestamp, Some(2));
    assert_eq!(engine.book().history_len(), 2);
}

#[test]
fn rejected_candles_are_counted_by_the_session() {
    let mut engine = TradingEngine::new(settings(), PaperOrderExecutor::new(), MemoryTradeLog::new());
    let mut once = Some(Scripted::boxed(vec![
        Ok(Some(Candle::new(1, 0.0, 1.0, 0.0, 1.0, true))),
        Ok(Some(finished(2, 1.0, 1.1))),
    ]));
    let mut connect = || once.take().ok_or_else(|| "gone".to_string());
    let report = run_session(
        &mut engine,
        &mut connect,
        fast_backoff(),
        &NoopControl,
        &mut |_| {},
        &mut |_| {},
    )
    .expect("session");

    assert_eq!(report.status.candles, 2);
    assert_eq!(report.status.rejected, 1);
    assert_eq!(engine.book().history_len(), 1);
}

#[test]
fn cancellation_stops_between_cycles() {
    let mut engine = TradingEngine::new(settings(), PaperOrderExecutor::new(), MemoryTradeLog::new());
    let stop = AtomicBool::new(false);
    let mut once = Some(Scripted::boxed(vec![
        Ok(Some(finished(1, 1.0, 1.1))),
        Ok(Some(finished(2, 1.1, 1.2))),
        Ok(Some(finished(3, 1.2, 1.3))),
    ]));
    let mut connect = || once.take().ok_or_else(|| "gone".to_string());
    let report = run_session(
        &mut engine,
        &mut connect,
        fast_backoff(),
        &stop,
        &mut |_| {},
        &mut |_| stop.store(true, Ordering::Relaxed),
    )
    .expect("session");

    assert_eq!(report.end, SessionEnd::Cancelled);
    assert_eq!(report.status.candles, 1);
    assert!(!report.status.connected);
}

#[test]
fn cancellation_interrupts_reconnect_loop() {
    let mut engine = TradingEngine::new(settings(), PaperOrderExecutor::new(), MemoryTradeLog::new());
    let stop = AtomicBool::new(false);
    let mut first = Some(Scripted::boxed(vec![Err(StreamError::Protocol(
        "subscription refused".to_string(),
    ))]));
    let mut attempts = 0u32;
    let mut connect = || -> Result<Box<dyn CandleStream>, String> {
        if let Some(stream) = first.take() {
            return Ok(stream);
        }
        attempts += 1;
        Err(format!("refused #{attempts}"))
    };
    let report = run_session(
        &mut engine,
        &mut connect,
        fast_backoff(),
        &stop,
        &mut |status| {
            if status.reconnects >= 3 {
                stop.store(true, Ordering::Relaxed);
            }
        },
        &mut |_| {},
    )
    .expect("session");

    assert_eq!(report.end, SessionEnd::Cancelled);
    assert_eq!(report.status.reconnects, 3);
    assert_eq!(report.status.last_error.as_deref(), Some("refused #3"));
}

#[test]
fn initial_connect_failure_is_an_error() {
    let mut engine = TradingEngine::new(settings(), PaperOrderExecutor::new(), MemoryTradeLog::new());
    let mut connect = || -> Result<Box<dyn CandleStream>, String> { Err("dns failure".to_string()) };
    let err = run_session(
        &mut engine,
        &mut connect,
        fast_backoff(),
        &NoopControl,
        &mut |_| {},
        &mut |_| {},
    )
    .expect_err("connect should fail");
    assert_eq!(err, "dns failure");
}
