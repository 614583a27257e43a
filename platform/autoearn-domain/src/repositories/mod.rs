pub mod market_stream;
pub mod order_execution;
pub mod trade_log;
