use autoearn_domain::repositories::trade_log::TradeLog;
use autoearn_domain::value_objects::trade_record::TradeRecord;
use parking_lot::Mutex;

/// Keeps records in memory so tests can assert on what the engine logged.
#[derive(Debug, Default)]
pub struct MemoryTradeLog {
    records: Mutex<Vec<TradeRecord>>,
}

impl MemoryTradeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TradeRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl TradeLog for MemoryTradeLog {
    fn record(&self, trade: &TradeRecord) -> Result<(), String> {
        self.records.lock().push(trade.clone());
        Ok(())
    }
}
