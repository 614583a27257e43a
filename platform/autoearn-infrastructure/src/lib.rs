pub mod execution;
pub mod market_data;
pub mod market_stream;
pub mod persistence;
