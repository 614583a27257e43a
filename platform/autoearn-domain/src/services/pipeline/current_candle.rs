use super::{Applicability, ScoringStage};
use crate::services::context::DecisionContext;
use crate::value_objects::candle::CandleColor;
use crate::value_objects::operation::Operation;
use crate::value_objects::side::PositionSide;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LONG_TAKE_PROFIT: f64 = 2.0;
pub const DEFAULT_SHORT_TAKE_PROFIT: f64 = 2.0;
pub const DEFAULT_LONG_OPEN: f64 = 3.0;
pub const DEFAULT_SHORT_OPEN: f64 = 3.0;

/// How the short-side running profit is scaled before it is compared with
/// `short_take_profit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortProfitScale {
    /// Plain ratio `(entry - close) / entry`, i.e. a threshold of 2 means 200%.
    #[default]
    Ratio,
    /// Percent, matching the long side.
    Percent,
}

/// All thresholds are percentages.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentCandleParams {
    pub long_take_profit: f64,
    pub short_take_profit: f64,
    pub long_open: f64,
    pub short_open: f64,
    pub long_take_profit_burst: f64,
    pub short_take_profit_burst: f64,
    pub short_profit_scale: ShortProfitScale,
}

impl Default for CurrentCandleParams {
    fn default() -> Self {
        Self {
            long_take_profit: DEFAULT_LONG_TAKE_PROFIT,
            short_take_profit: DEFAULT_SHORT_TAKE_PROFIT,
            long_open: DEFAULT_LONG_OPEN,
            short_open: DEFAULT_SHORT_OPEN,
            long_take_profit_burst: DEFAULT_LONG_TAKE_PROFIT,
            short_take_profit_burst: DEFAULT_SHORT_TAKE_PROFIT,
            short_profit_scale: ShortProfitScale::Ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitReason {
    Burst,
    TakeProfit,
    StopLoss,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Burst => "burst",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
        }
    }
}

/// Looks at the newest partial update of the open bar.
///
/// In a position it exits on an intrabar burst, on take-profit or on the
/// mirrored stop-loss, and sets the skip flag. Flat, it proposes entering
/// against a sharp intrabar move.
#[derive(Debug, Clone)]
pub struct CurrentCandle {
    params: CurrentCandleParams,
}

impl CurrentCandle {
    pub fn new(params: CurrentCandleParams) -> Self {
        Self { params }
    }

    fn exit(&self, context: &mut DecisionContext, reason: ExitReason, profit: f64) {
        context.set_score(1.0);
        context.set_operation(Operation::Exit);
        context.set_skip();
        tracing::info!(
            stage = self.name(),
            side = %context.position().side,
            reason = reason.as_str(),
            total_profit = profit,
            "exit signal"
        );
    }

    fn long_exit(&self, change: f64, close: f64, entry_price: f64) -> Option<(ExitReason, f64)> {
        if change >= self.params.long_take_profit_burst {
            return Some((ExitReason::Burst, change));
        }
        if entry_price <= 0.0 {
            return None;
        }
        let total_profit = (close - entry_price) / entry_price * 100.0;
        if total_profit >= self.params.long_take_profit {
            Some((ExitReason::TakeProfit, total_profit))
        } else if total_profit <= -self.params.long_take_profit {
            Some((ExitReason::StopLoss, total_profit))
        } else {
            None
        }
    }

    fn short_exit(&self, change: f64, close: f64, entry_price: f64) -> Option<(ExitReason, f64)> {
        if change < -self.params.short_take_profit_burst {
            return Some((ExitReason::Burst, change));
        }
        if entry_price <= 0.0 {
            return None;
        }
        let ratio = (entry_price - close) / entry_price;
        let total_profit = match self.params.short_profit_scale {
            ShortProfitScale::Ratio => ratio,
            ShortProfitScale::Percent => ratio * 100.0,
        };
        if total_profit >= self.params.short_take_profit {
            Some((ExitReason::TakeProfit, total_profit))
        } else if total_profit <= -self.params.short_take_profit {
            Some((ExitReason::StopLoss, total_profit))
        } else {
            None
        }
    }
}

impl ScoringStage for CurrentCandle {
    fn name(&self) -> &str {
        "current_candle"
    }

    fn applicability(&self) -> Applicability {
        Applicability::Both
    }

    fn process(&self, context: &mut DecisionContext) {
        let Some(current) = context.in_progress().last() else {
            return;
        };
        let Ok(change) = current.percent_change() else {
            return;
        };
        let close = current.close;
        let color = current.color();
        let position = *context.position();

        match position.side {
            PositionSide::Long => {
                if let Some((reason, profit)) = self.long_exit(change, close, position.entry_price)
                {
                    self.exit(context, reason, profit);
                }
            }
            PositionSide::Short => {
                if let Some((reason, profit)) = self.short_exit(change, close, position.entry_price)
                {
                    self.exit(context, reason, profit);
                }
            }
            PositionSide::Flat => {
                // Color and sign of `change` agree, so these entries only fire
                // for thresholds below zero.
                if color == CandleColor::Green && change < -self.params.long_open {
                    context.add_score(change.abs() - self.params.long_open);
                    context.set_operation(Operation::Long);
                    tracing::info!(stage = self.name(), change, score = context.score(), "proposing long");
                } else if color != CandleColor::Green && change > self.params.short_open {
                    context.add_score(-(change - self.params.short_open));
                    context.set_operation(Operation::Short);
                    tracing::info!(stage = self.name(), change, score = context.score(), "proposing short");
                }
            }
        }
    }
}
