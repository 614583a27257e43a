use super::{Applicability, ScoringStage};
use crate::services::context::DecisionContext;
use crate::value_objects::candle::CandleColor;
use crate::value_objects::operation::Operation;

pub const DEFAULT_THRESHOLD: usize = 3;
const EXTRA_CANDLE_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct ConsecutiveReversalParams {
    pub threshold: usize,
}

impl Default for ConsecutiveReversalParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Mean-reversion signal: a run of candles moving one way, immediately
/// followed by a finished candle moving the other way.
///
/// Walking back from the candle before the newest, every candle that closed
/// against the newest candle's color (doji counts against both) extends the
/// run and adds its absolute percent change. The walk stops at the first
/// candle that does not. A run of at least `threshold` candles scores
/// `(run - threshold) * 0.2 + cumulative_change` and proposes a long entry.
#[derive(Debug, Clone)]
pub struct ConsecutiveReversal {
    params: ConsecutiveReversalParams,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Run {
    opposite: usize,
    cumulative_change: f64,
}

impl ConsecutiveReversal {
    pub fn new(params: ConsecutiveReversalParams) -> Self {
        Self { params }
    }

    fn measure_run(context: &DecisionContext) -> Option<Run> {
        let (last, earlier) = context.history().split_last()?;
        let last_color = last.color();

        let mut run = Run {
            opposite: 0,
            cumulative_change: 0.0,
        };
        for candle in earlier.iter().rev() {
            let against = match last_color {
                CandleColor::Green => candle.close <= candle.open,
                CandleColor::Red => candle.close >= candle.open,
                CandleColor::Doji => false,
            };
            if !against {
                break;
            }
            run.opposite += 1;
            run.cumulative_change += candle.percent_change().ok()?.abs();
        }
        Some(run)
    }
}

impl ScoringStage for ConsecutiveReversal {
    fn name(&self) -> &str {
        "consecutive_reversal"
    }

    fn applicability(&self) -> Applicability {
        Applicability::OpenOnly
    }

    fn process(&self, context: &mut DecisionContext) {
        let threshold = self.params.threshold;
        if context.history().len() < threshold {
            return;
        }
        let Some(run) = Self::measure_run(context) else {
            return;
        };

        // The run length is a count, so only the long side can ever trigger.
        if run.opposite >= threshold {
            let delta =
                (run.opposite - threshold) as f64 * EXTRA_CANDLE_WEIGHT + run.cumulative_change;
            context.add_score(delta);
            context.set_operation(Operation::Long);
            tracing::info!(
                stage = self.name(),
                opposite = run.opposite,
                cumulative_change = run.cumulative_change,
                score = context.score(),
                "reversal after consecutive opposite candles, proposing long"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::candle::Candle;
    use crate::value_objects::position::PositionSnapshot;

    fn bar(open: f64, close: f64) -> Candle {
        Candle::new(0, open, open.max(close), open.min(close), close, true)
    }

    fn run_stage(history: Vec<Candle>, threshold: usize) -> DecisionContext {
        let stage = ConsecutiveReversal::new(ConsecutiveReversalParams { threshold });
        let mut ctx = DecisionContext::new(history, Vec::new(), PositionSnapshot::flat());
        stage.process(&mut ctx);
        ctx
    }

    #[test]
    fn three_reds_then_green_proposes_long_with_cumulative_score() {
        let history = vec![
            bar(100.0, 98.0),
            bar(98.0, 97.0),
            bar(97.0, 95.0),
            bar(95.0, 96.0),
        ];
        let expected: f64 = history[..3]
            .iter()
            .map(|c| c.percent_change().unwrap().abs())
            .sum();

        let ctx = run_stage(history, 3);
        assert_eq!(ctx.operation(), Operation::Long);
        assert!((ctx.score() - expected).abs() < 1e-12);
    }

    #[test]
    fn two_reds_then_green_is_below_threshold() {
        let history = vec![bar(100.0, 98.0), bar(98.0, 97.0), bar(97.0, 98.0)];
        let ctx = run_stage(history, 3);
        assert_eq!(ctx.operation(), Operation::None);
        assert_eq!(ctx.score(), 0.0);
    }

    #[test]
    fn longer_runs_earn_a_bonus_per_extra_candle() {
        let history = vec![
            bar(100.0, 99.0),
            bar(99.0, 98.0),
            bar(98.0, 97.0),
            bar(97.0, 96.0),
            bar(96.0, 95.0),
            bar(95.0, 97.0),
        ];
        let cumulative: f64 = history[..5]
            .iter()
            .map(|c| c.percent_change().unwrap().abs())
            .sum();
        let ctx = run_stage(history, 3);
        assert!((ctx.score() - (2.0 * 0.2 + cumulative)).abs() < 1e-12);
    }

    #[test]
    fn walk_stops_at_first_candle_in_the_same_direction() {
        let history = vec![
            bar(100.0, 98.0),
            bar(98.0, 97.0),
            bar(97.0, 99.0),
            bar(99.0, 98.0),
            bar(98.0, 99.0),
        ];
        let ctx = run_stage(history, 2);
        assert_eq!(ctx.operation(), Operation::None);
    }

    #[test]
    fn doji_counts_against_either_color() {
        let history = vec![
            bar(100.0, 100.0),
            bar(100.0, 100.0),
            bar(100.0, 99.0),
            bar(99.0, 100.0),
        ];
        let ctx = run_stage(history, 3);
        assert_eq!(ctx.operation(), Operation::Long);
        assert!((ctx.score() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn green_run_then_red_still_proposes_long() {
        let history = vec![
            bar(95.0, 96.0),
            bar(96.0, 97.0),
            bar(97.0, 98.0),
            bar(98.0, 97.0),
        ];
        let ctx = run_stage(history, 3);
        assert_eq!(ctx.operation(), Operation::Long);
    }

    #[test]
    fn newest_doji_never_triggers() {
        let history = vec![
            bar(100.0, 98.0),
            bar(98.0, 97.0),
            bar(97.0, 95.0),
            bar(95.0, 95.0),
        ];
        let ctx = run_stage(history, 3);
        assert_eq!(ctx.operation(), Operation::None);
    }
}
