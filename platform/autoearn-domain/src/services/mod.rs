pub mod candle_book;
pub mod context;
pub mod pipeline;
