use autoearn_domain::repositories::trade_log::TradeLog;
use autoearn_domain::value_objects::trade_record::TradeRecord;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use std::time::{Duration, Instant};

const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

type PgPool = Pool<PostgresConnectionManager<NoTls>>;

/// Writes trades to a Postgres table through a small r2d2 pool.
///
/// Columns: `recorded_at, insid, side, price, quantity, available_balance,
/// diff_balance`. `side` is stored as `buy`/`sell`.
#[derive(Debug, Clone)]
pub struct PostgresTradeLog {
    pool: PgPool,
    pub table: String,
}

impl PostgresTradeLog {
    /// Returns without waiting for a connection; an unreachable server surfaces
    /// as errors from `create_table` and `record`.
    pub fn new(db_url: &str, table: &str, pool_max_size: u32) -> Result<Self, String> {
        if let Err(err) = validate_table_name(table) {
            return Err(format!("invalid trade table '{}': {}", table, err));
        }
        let config = db_url
            .parse::<postgres::Config>()
            .map_err(|err| format!("invalid postgres db url: {err}"))?;
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_max_size.max(1))
            .connection_timeout(CHECKOUT_TIMEOUT)
            .build_unchecked(manager);
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn create_table(&self) -> Result<(), String> {
        let mut client = checkout(&self.pool, "create_table")?;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             id BIGSERIAL PRIMARY KEY, \
             recorded_at TIMESTAMPTZ NOT NULL, \
             insid TEXT NOT NULL, \
             side TEXT NOT NULL, \
             price DOUBLE PRECISION NOT NULL, \
             quantity DOUBLE PRECISION NOT NULL, \
             available_balance DOUBLE PRECISION NOT NULL, \
             diff_balance DOUBLE PRECISION NOT NULL)",
            self.table
        );
        client.batch_execute(&ddl).map_err(|err| {
            metrics::counter!("autoearn.infra.postgres.trade_log.errors_total", "stage" => "create_table")
                .increment(1);
            format!("failed to create trade table {}: {err}", self.table)
        })?;
        tracing::info!(table = %self.table, "trade table ready");
        Ok(())
    }
}

impl TradeLog for PostgresTradeLog {
    fn record(&self, trade: &TradeRecord) -> Result<(), String> {
        insert_trade(&self.pool, &self.table, trade)
    }
}

fn checkout(
    pool: &PgPool,
    stage: &'static str,
) -> Result<r2d2::PooledConnection<PostgresConnectionManager<NoTls>>, String> {
    let get_start = Instant::now();
    match pool.get() {
        Ok(client) => {
            metrics::histogram!("autoearn.infra.postgres.pool.get_ms")
                .record(get_start.elapsed().as_secs_f64() * 1000.0);
            Ok(client)
        }
        Err(err) => {
            metrics::counter!("autoearn.infra.postgres.trade_log.errors_total", "stage" => "pool_get")
                .increment(1);
            tracing::error!(error = %err, stage, "failed to checkout postgres connection");
            Err(format!("failed to checkout postgres connection: {err}"))
        }
    }
}

pub fn insert_trade(pool: &PgPool, table: &str, trade: &TradeRecord) -> Result<(), String> {
    let start = Instant::now();
    let _span = tracing::info_span!(
        "infra.postgres.insert_trade",
        table = %table,
        side = %trade.side
    )
    .entered();

    if let Err(err) = validate_table_name(table) {
        metrics::counter!("autoearn.infra.postgres.trade_log.writes_total", "result" => "err")
            .increment(1);
        metrics::counter!(
            "autoearn.infra.postgres.trade_log.errors_total",
            "stage" => "validate_table"
        )
        .increment(1);
        tracing::warn!(error = %err, "invalid table name");
        return Err(err);
    }

    let mut client = checkout(pool, "insert").inspect_err(|_| {
        metrics::counter!("autoearn.infra.postgres.trade_log.writes_total", "result" => "err")
            .increment(1);
    })?;

    let statement = format!(
        "INSERT INTO {} (recorded_at, insid, side, price, quantity, available_balance, diff_balance) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
        table
    );
    let side = trade.side.as_str();
    if let Err(err) = client.execute(
        &statement,
        &[
            &trade.recorded_at,
            &trade.instrument,
            &side,
            &trade.price,
            &trade.quantity,
            &trade.resulting_balance,
            &trade.balance_change,
        ],
    ) {
        metrics::counter!("autoearn.infra.postgres.trade_log.writes_total", "result" => "err")
            .increment(1);
        metrics::counter!("autoearn.infra.postgres.trade_log.errors_total", "stage" => "insert")
            .increment(1);
        tracing::error!(error = %err, "failed to insert trade");
        return Err(format!("failed to insert trade: {err}"));
    }

    metrics::counter!("autoearn.infra.postgres.trade_log.writes_total", "result" => "ok")
        .increment(1);
    metrics::histogram!("autoearn.infra.postgres.insert_ms")
        .record(start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

fn validate_table_name(table: &str) -> Result<(), String> {
    if table.is_empty() {
        return Err("table name is empty".to_string());
    }
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 {
        return Err(format!("invalid table name: {table}"));
    }
    for part in parts {
        let mut chars = part.chars();
        let valid_first = chars
            .next()
            .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_');
        if !valid_first || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(format!("invalid table name: {table}"));
        }
    }
    Ok(())
}
