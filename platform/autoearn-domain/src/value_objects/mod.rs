pub mod candle;
pub mod operation;
pub mod order;
pub mod position;
pub mod side;
pub mod trade_record;
