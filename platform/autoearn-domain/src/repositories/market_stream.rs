use crate::value_objects::candle::Candle;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StreamError {
    #[error("disconnected: {0}")]
    Disconnected(String),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StreamError {
    /// Whether reconnecting could help. Bad payloads are dropped instead.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, StreamError::InvalidData(_))
    }
}

/// Source of candle updates for one instrument.
///
/// `Ok(None)` means the source is exhausted (a replay file reached its end);
/// live feeds only ever return `Ok(Some(_))` or an error.
pub trait CandleStream {
    fn next_candle(&mut self) -> Result<Option<Candle>, StreamError>;
}

impl<S: CandleStream + ?Sized> CandleStream for Box<S> {
    fn next_candle(&mut self) -> Result<Option<Candle>, StreamError> {
        (**self).next_candle()
    }
}

/// Source of finished candles used to warm up the history before streaming.
pub trait CandleHistory {
    fn recent_candles(&self, instrument: &str, limit: usize) -> Result<Vec<Candle>, String>;
}
