use crate::config::Config;
use autoearn_domain::aggregates::trading_account::{OrderIntent, TradingAccount};
use autoearn_domain::errors::{CandleError, OrderError};
use autoearn_domain::repositories::order_execution::OrderExecutor;
use autoearn_domain::repositories::trade_log::TradeLog;
use autoearn_domain::services::candle_book::CandleBook;
use autoearn_domain::services::context::DecisionContext;
use autoearn_domain::services::pipeline::{Pipeline, PipelineParams};
use autoearn_domain::value_objects::candle::Candle;
use autoearn_domain::value_objects::operation::Operation;
use autoearn_domain::value_objects::order::OrderRequest;
use autoearn_domain::value_objects::position::PositionSnapshot;
use autoearn_domain::value_objects::side::OrderSide;
use autoearn_domain::value_objects::trade_record::TradeRecord;
use chrono::Utc;
use std::time::Instant;
use tracing::info_span;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub instrument: String,
    pub initial_balance: f64,
    pub history_capacity: usize,
    pub pipeline: PipelineParams,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            instrument: config.trade.instrument.clone(),
            initial_balance: config.trade.balance,
            history_capacity: config.history_capacity(),
            pipeline: config.pipeline_params(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Filled(TradeRecord),
    Failed(OrderError),
}

/// Result of one decision cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub operation: Operation,
    pub score: f64,
    pub skip: bool,
    pub order: Option<OrderOutcome>,
}

impl CycleOutcome {
    pub fn trade(&self) -> Option<&TradeRecord> {
        match &self.order {
            Some(OrderOutcome::Filled(record)) => Some(record),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub candles: u64,
    pub rejected: u64,
    pub cycles: u64,
    pub orders_filled: u64,
    pub orders_failed: u64,
    pub trade_log_failures: u64,
}

/// Owns the candle book and trading account for one instrument and runs the
/// decision cycle for every candle update. Cycles are strictly sequential:
/// `on_candle` takes `&mut self`.
pub struct TradingEngine<E, L> {
    settings: EngineSettings,
    book: CandleBook,
    account: TradingAccount,
    pipeline: Pipeline,
    executor: E,
    trade_log: L,
    order_sequence: u64,
    stats: EngineStats,
}

impl<E: OrderExecutor, L: TradeLog> TradingEngine<E, L> {
    pub fn new(settings: EngineSettings, executor: E, trade_log: L) -> Self {
        let book = CandleBook::new(settings.history_capacity);
        let account = TradingAccount::new(settings.instrument.clone(), settings.initial_balance);
        let pipeline = Pipeline::standard(&settings.pipeline);
        metrics::gauge!("autoearn.balance.available").set(settings.initial_balance);
        Self {
            settings,
            book,
            account,
            pipeline,
            executor,
            trade_log,
            order_sequence: 0,
            stats: EngineStats::default(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn book(&self) -> &CandleBook {
        &self.book
    }

    pub fn account(&self) -> &TradingAccount {
        &self.account
    }

    pub fn position(&self) -> PositionSnapshot {
        self.account.position()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn trade_log(&self) -> &L {
        &self.trade_log
    }

    /// Warms the history without running any decision cycle. Invalid candles are dropped.
    pub fn seed_history(&mut self, candles: Vec<Candle>) -> usize {
        let valid: Vec<Candle> = candles
            .into_iter()
            .filter(|c| match c.validate() {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(error = %err, candle = %c, "dropping invalid seed candle");
                    false
                }
            })
            .collect();
        self.book.seed(valid);
        tracing::info!(
            instrument = %self.settings.instrument,
            history = self.book.history_len(),
            "seeded candle history"
        );
        self.book.history_len()
    }

    /// Folds one candle update in and runs a full decision cycle.
    ///
    /// A rejected candle leaves every piece of state untouched. Order and
    /// trade-log failures are reported in the outcome, never returned as errors.
    pub fn on_candle(&mut self, candle: Candle) -> Result<CycleOutcome, CandleError> {
        let started = Instant::now();
        self.stats.candles += 1;
        metrics::counter!("autoearn.candles.received").increment(1);

        if let Err(err) = candle.validate() {
            self.stats.rejected += 1;
            metrics::counter!("autoearn.candles.rejected").increment(1);
            tracing::warn!(error = %err, candle = %candle, "rejected candle update");
            return Err(err);
        }

        let _span = info_span!(
            "cycle",
            instrument = %self.settings.instrument,
            ts = candle.timestamp,
            finished = candle.finished
        )
        .entered();

        self.book.push(candle);
        let context = DecisionContext::new(
            self.book.history_snapshot(),
            self.book.in_progress().to_vec(),
            self.account.position(),
        );
        let context = self.pipeline.execute(context);
        self.stats.cycles += 1;
        metrics::counter!("autoearn.cycles").increment(1);
        metrics::counter!("autoearn.signals", "operation" => context.operation().as_str())
            .increment(1);

        let mut outcome = CycleOutcome {
            operation: context.operation(),
            score: context.score(),
            skip: context.is_skip(),
            order: None,
        };

        match self.account.decide(outcome.operation, outcome.score) {
            Some(intent) => outcome.order = Some(self.execute(intent)),
            None => tracing::debug!(context = %context, "no trade this cycle"),
        }

        metrics::gauge!("autoearn.balance.available").set(self.account.available_balance());
        metrics::histogram!("autoearn.cycle.latency_us")
            .record(started.elapsed().as_micros() as f64);
        Ok(outcome)
    }

    fn execute(&mut self, intent: OrderIntent) -> OrderOutcome {
        let side = intent.order_side();
        let Some(reference_price) = self.book.latest_close() else {
            return self.order_failed(side, OrderError::Rejected("no reference price".to_string()));
        };
        let request = OrderRequest {
            client_order_id: self.next_client_order_id(side),
            instrument: self.settings.instrument.clone(),
            side,
            size: intent.size(),
            reference_price,
        };
        tracing::info!(
            client_order_id = %request.client_order_id,
            side = %side,
            size = ?request.size,
            reference_price,
            "placing order"
        );

        let fill = match self.executor.place_order(&request) {
            Ok(fill) if fill.order_id.trim().is_empty() => {
                let err = OrderError::MissingOrderId {
                    client_order_id: request.client_order_id,
                };
                return self.order_failed(side, err);
            }
            Ok(fill) => fill,
            Err(err) => return self.order_failed(side, err),
        };
        let record = match self.account.apply_fill(&intent, &fill, Utc::now()) {
            Ok(record) => record,
            Err(err) => return self.order_failed(side, err),
        };

        self.stats.orders_filled += 1;
        metrics::counter!("autoearn.orders", "side" => side.as_str(), "result" => "filled")
            .increment(1);
        tracing::info!(
            order_id = %fill.order_id,
            side = %side,
            price = fill.price,
            quantity = fill.filled_quantity,
            balance = record.resulting_balance,
            balance_change = record.balance_change,
            position = %self.account.position().side,
            "order filled"
        );

        if let Err(err) = self.trade_log.record(&record) {
            self.stats.trade_log_failures += 1;
            metrics::counter!("autoearn.trade_log.failures").increment(1);
            tracing::warn!(error = %err, "failed to persist trade record");
        }
        OrderOutcome::Filled(record)
    }

    fn order_failed(&mut self, side: OrderSide, err: OrderError) -> OrderOutcome {
        self.stats.orders_failed += 1;
        metrics::counter!("autoearn.orders", "side" => side.as_str(), "result" => "failed")
            .increment(1);
        tracing::error!(side = %side, error = %err, "order failed, position unchanged");
        OrderOutcome::Failed(err)
    }

    fn next_client_order_id(&mut self, side: OrderSide) -> String {
        self.order_sequence += 1;
        format!(
            "{}{}{}",
            side.as_str(),
            Utc::now().format("%Y%m%d%H%M%S"),
            self.order_sequence
        )
    }
}
