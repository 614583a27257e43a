pub mod consecutive_reversal;
pub mod current_candle;

use crate::services::context::DecisionContext;
use crate::value_objects::side::PositionSide;
use consecutive_reversal::{ConsecutiveReversal, ConsecutiveReversalParams};
use current_candle::{CurrentCandle, CurrentCandleParams};

/// When a stage is allowed to run, relative to the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    OpenOnly,
    CloseOnly,
    Both,
}

impl Applicability {
    pub fn applies_to(&self, side: PositionSide) -> bool {
        match self {
            Applicability::OpenOnly => side.is_flat(),
            Applicability::CloseOnly => !side.is_flat(),
            Applicability::Both => true,
        }
    }
}

pub trait ScoringStage {
    fn name(&self) -> &str;

    fn applicability(&self) -> Applicability;

    /// Reads the context and may adjust the accumulator. Missing data is a no-op.
    fn process(&self, context: &mut DecisionContext);
}

impl<S: ScoringStage + ?Sized> ScoringStage for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn applicability(&self) -> Applicability {
        (**self).applicability()
    }

    fn process(&self, context: &mut DecisionContext) {
        (**self).process(context)
    }
}

#[derive(Debug, Clone)]
pub enum StageKind {
    ConsecutiveReversal(ConsecutiveReversal),
    CurrentCandle(CurrentCandle),
}

impl ScoringStage for StageKind {
    fn name(&self) -> &str {
        match self {
            StageKind::ConsecutiveReversal(stage) => stage.name(),
            StageKind::CurrentCandle(stage) => stage.name(),
        }
    }

    fn applicability(&self) -> Applicability {
        match self {
            StageKind::ConsecutiveReversal(stage) => stage.applicability(),
            StageKind::CurrentCandle(stage) => stage.applicability(),
        }
    }

    fn process(&self, context: &mut DecisionContext) {
        match self {
            StageKind::ConsecutiveReversal(stage) => stage.process(context),
            StageKind::CurrentCandle(stage) => stage.process(context),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineParams {
    pub consecutive_reversal: ConsecutiveReversalParams,
    pub current_candle: CurrentCandleParams,
}

/// Ordered list of scoring stages run against one context.
#[derive(Debug, Clone)]
pub struct Pipeline<S = StageKind> {
    stages: Vec<S>,
}

impl Pipeline<StageKind> {
    /// Consecutive-reversal first, then current-candle. Order matters: a later
    /// stage overwrites the operation and a skip stops everything after it.
    pub fn standard(params: &PipelineParams) -> Self {
        Self::new(vec![
            StageKind::ConsecutiveReversal(ConsecutiveReversal::new(
                params.consecutive_reversal.clone(),
            )),
            StageKind::CurrentCandle(CurrentCandle::new(params.current_candle.clone())),
        ])
    }
}

impl<S: ScoringStage> Pipeline<S> {
    pub fn new(stages: Vec<S>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[S] {
        &self.stages
    }

    pub fn execute(&self, mut context: DecisionContext) -> DecisionContext {
        for stage in &self.stages {
            if context.is_skip() {
                tracing::debug!(stage = stage.name(), "skip flag set, stopping pipeline");
                break;
            }
            if !stage.applicability().applies_to(context.position().side) {
                continue;
            }
            stage.process(&mut context);
        }
        context
    }
}
