use autoearn_domain::repositories::trade_log::TradeLog;
use autoearn_domain::value_objects::side::OrderSide;
use autoearn_domain::value_objects::trade_record::TradeRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

const HEADER: [&str; 7] = [
    "recorded_at",
    "instrument",
    "side",
    "price",
    "quantity",
    "resulting_balance",
    "balance_change",
];

/// Appends trades to a CSV file, writing the header only when the file is new
/// or empty. Every row is flushed before `record` returns.
pub struct CsvTradeLog {
    path: PathBuf,
    writer: Mutex<csv::Writer<File>>,
}

impl CsvTradeLog {
    pub fn open(path: &Path) -> Result<Self, String> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                format!("failed to create trade log dir {}: {}", parent.display(), err)
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| format!("failed to open trade log {}: {}", path.display(), err))?;
        let is_empty = file
            .metadata()
            .map(|meta| meta.len() == 0)
            .map_err(|err| format!("failed to stat trade log {}: {}", path.display(), err))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_empty {
            writer
                .write_record(HEADER)
                .and_then(|_| writer.flush().map_err(csv::Error::from))
                .map_err(|err| format!("failed to write trade log header: {}", err))?;
        }
        tracing::info!(path = %path.display(), "csv trade log ready");

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TradeLog for CsvTradeLog {
    fn record(&self, trade: &TradeRecord) -> Result<(), String> {
        let mut writer = self.writer.lock();
        let result = writer
            .write_record([
                trade.recorded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                trade.instrument.clone(),
                trade.side.as_str().to_string(),
                trade.price.to_string(),
                trade.quantity.to_string(),
                trade.resulting_balance.to_string(),
                trade.balance_change.to_string(),
            ])
            .map_err(|err| format!("failed to write trade row: {}", err))
            .and_then(|_| {
                writer
                    .flush()
                    .map_err(|err| format!("failed to flush trade log: {}", err))
            });
        let label = if result.is_ok() { "ok" } else { "err" };
        metrics::counter!("autoearn.infra.csv.trade_log.writes_total", "result" => label)
            .increment(1);
        result
    }
}

#[derive(Debug, serde::Deserialize)]
struct TradeRow {
    recorded_at: DateTime<Utc>,
    instrument: String,
    side: String,
    price: f64,
    quantity: f64,
    resulting_balance: f64,
    balance_change: f64,
}

pub fn read_trade_log(path: &Path) -> Result<Vec<TradeRecord>, String> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|err| format!("failed to open trade log {}: {}", path.display(), err))?;
    let mut trades = Vec::new();
    for result in rdr.deserialize::<TradeRow>() {
        let row = result.map_err(|err| format!("failed to parse trade row: {}", err))?;
        let side = match row.side.to_ascii_lowercase().as_str() {
            "buy" => OrderSide::Buy,
            "sell" => OrderSide::Sell,
            other => return Err(format!("invalid side '{}'", other)),
        };
        trades.push(TradeRecord {
            recorded_at: row.recorded_at,
            instrument: row.instrument,
            side,
            price: row.price,
            quantity: row.quantity,
            resulting_balance: row.resulting_balance,
            balance_change: row.balance_change,
        });
    }
    Ok(trades)
}
