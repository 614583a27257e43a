use crate::value_objects::trade_record::TradeRecord;

/// Append-only sink for executed trades.
pub trait TradeLog {
    fn record(&self, trade: &TradeRecord) -> Result<(), String>;
}

impl<L: TradeLog + ?Sized> TradeLog for Box<L> {
    fn record(&self, trade: &TradeRecord) -> Result<(), String> {
        (**self).record(trade)
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTradeLog;

impl TradeLog for NoopTradeLog {
    fn record(&self, _trade: &TradeRecord) -> Result<(), String> {
        Ok(())
    }
}
