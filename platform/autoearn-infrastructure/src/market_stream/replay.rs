use super::okx_codec::{decode_message, OkxMessage};
use autoearn_domain::repositories::market_stream::{CandleStream, StreamError};
use autoearn_domain::value_objects::candle::Candle;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Replays a capture file of raw exchange messages, one JSON message per line.
///
/// Messages without candle data (acks, pongs) are skipped. A line that fails
/// to decode is reported as `StreamError::InvalidData` and the stream moves on
/// to the next line on the following call.
pub struct ReplayCandleStream<R> {
    source: String,
    lines: Lines<R>,
    line_no: usize,
    pending: VecDeque<Candle>,
}

impl ReplayCandleStream<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|err| format!("failed to open replay file {}: {}", path.display(), err))?;
        tracing::info!(path = %path.display(), "replaying market data file");
        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

impl<R: BufRead> ReplayCandleStream<R> {
    pub fn from_reader(reader: R, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            lines: reader.lines(),
            line_no: 0,
            pending: VecDeque::new(),
        }
    }
}

impl<R: BufRead> CandleStream for ReplayCandleStream<R> {
    fn next_candle(&mut self) -> Result<Option<Candle>, StreamError> {
        loop {
            if let Some(candle) = self.pending.pop_front() {
                return Ok(Some(candle));
            }
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            self.line_no += 1;
            let line = line.map_err(|err| {
                StreamError::InvalidData(format!("{}:{}: {}", self.source, self.line_no, err))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let message = decode_message(&line).map_err(|err| {
                StreamError::InvalidData(format!("{}:{}: {}", self.source, self.line_no, err))
            })?;
            if let OkxMessage::Candles(candles) = message {
                self.pending.extend(candles);
            }
        }
    }
}
