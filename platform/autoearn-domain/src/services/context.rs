use crate::value_objects::candle::Candle;
use crate::value_objects::operation::Operation;
use crate::value_objects::position::PositionSnapshot;
use std::fmt;

/// Scratch state for one decision cycle.
///
/// Candle history and position are read-only to stages; only the accumulator
/// (`score`, `operation`, `skip`) can be written. A context is consumed by a
/// single pipeline run and never reused.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionContext {
    history: Vec<Candle>,
    in_progress: Vec<Candle>,
    position: PositionSnapshot,
    score: f64,
    operation: Operation,
    skip: bool,
}

impl DecisionContext {
    pub fn new(history: Vec<Candle>, in_progress: Vec<Candle>, position: PositionSnapshot) -> Self {
        Self {
            history,
            in_progress,
            position,
            score: 0.0,
            operation: Operation::None,
            skip: false,
        }
    }

    /// Finished candles, oldest first.
    pub fn history(&self) -> &[Candle] {
        &self.history
    }

    pub fn in_progress(&self) -> &[Candle] {
        &self.in_progress
    }

    pub fn position(&self) -> &PositionSnapshot {
        &self.position
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn is_skip(&self) -> bool {
        self.skip
    }

    pub fn add_score(&mut self, delta: f64) {
        self.score += delta;
    }

    pub fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    pub fn set_operation(&mut self, operation: Operation) {
        self.operation = operation;
    }

    pub fn set_skip(&mut self) {
        self.skip = true;
    }
}

impl fmt::Display for DecisionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "score={} operation={} skip={} position={} size={} entry={} history={} in_progress={}",
            self.score,
            self.operation,
            self.skip,
            self.position.side,
            self.position.size,
            self.position.entry_price,
            self.history.len(),
            self.in_progress.len()
        )
    }
}
