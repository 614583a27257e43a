pub mod csv_trade_log;
pub mod memory_trade_log;
pub mod postgres_trade_log;
