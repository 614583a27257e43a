use crate::value_objects::candle::Candle;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

/// Finished-candle history (bounded, oldest evicted first) plus the partial
/// updates of the bar that is still open.
#[derive(Debug, Clone)]
pub struct CandleBook {
    capacity: usize,
    history: VecDeque<Candle>,
    in_progress: Vec<Candle>,
}

impl Default for CandleBook {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl CandleBook {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity + 1),
            in_progress: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Folds one update in. A finished candle closes the current bar and resets
    /// the in-progress slot.
    pub fn push(&mut self, candle: Candle) {
        if candle.finished {
            self.history.push_back(candle);
            while self.history.len() > self.capacity {
                self.history.pop_front();
            }
            self.in_progress.clear();
        } else {
            self.in_progress.push(candle);
        }
    }

    /// Replaces the history with the newest finished candles of `candles`.
    pub fn seed(&mut self, candles: impl IntoIterator<Item = Candle>) {
        self.history.clear();
        for candle in candles.into_iter().filter(|c| c.finished) {
            self.history.push_back(candle);
            if self.history.len() > self.capacity {
                self.history.pop_front();
            }
        }
    }

    pub fn history(&self) -> impl ExactSizeIterator<Item = &Candle> + DoubleEndedIterator {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn in_progress(&self) -> &[Candle] {
        &self.in_progress
    }

    pub fn history_snapshot(&self) -> Vec<Candle> {
        self.history.iter().cloned().collect()
    }

    /// Close of the newest in-progress update, falling back to the newest finished candle.
    pub fn latest_close(&self) -> Option<f64> {
        self.in_progress
            .last()
            .or_else(|| self.history.back())
            .map(|c| c.close)
    }
}
