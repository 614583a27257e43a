use crate::errors::OrderError;
use crate::value_objects::operation::Operation;
use crate::value_objects::order::{OrderFill, OrderSize};
use crate::value_objects::position::PositionSnapshot;
use crate::value_objects::side::{Direction, OrderSide};
use crate::value_objects::trade_record::TradeRecord;
use chrono::{DateTime, Utc};

/// What the account wants the execution collaborator to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderIntent {
    /// Open `side` with a quote-currency notional.
    Enter { side: Direction, notional: f64 },
    /// Close the whole `side` position, sized in base quantity.
    Exit { side: Direction, quantity: f64 },
}

impl OrderIntent {
    pub fn order_side(&self) -> OrderSide {
        match self {
            OrderIntent::Enter { side, .. } => side.entry_order_side(),
            OrderIntent::Exit { side, .. } => side.exit_order_side(),
        }
    }

    pub fn size(&self) -> OrderSize {
        match self {
            OrderIntent::Enter { notional, .. } => OrderSize::Quote(*notional),
            OrderIntent::Exit { quantity, .. } => OrderSize::Base(*quantity),
        }
    }
}

/// Position and balance state for one instrument.
///
/// Balance moves only when a fill is applied: entering long spends the
/// notional, entering short books the notional as proceeds, and exits settle
/// at the fill price. Flat always means zero size and zero entry price.
#[derive(Debug, Clone)]
pub struct TradingAccount {
    instrument: String,
    available_balance: f64,
    position: PositionSnapshot,
}

impl TradingAccount {
    pub fn new(instrument: String, initial_balance: f64) -> Self {
        Self {
            instrument,
            available_balance: initial_balance,
            position: PositionSnapshot::flat(),
        }
    }

    pub fn available_balance(&self) -> f64 {
        self.available_balance
    }

    pub fn position(&self) -> PositionSnapshot {
        self.position
    }

    /// Whole quote units to commit for an entry of the given strength.
    /// Strength at or above 1 commits the full balance.
    pub fn entry_notional(&self, strength: f64) -> f64 {
        if strength >= 1.0 {
            self.available_balance.floor()
        } else {
            (self.available_balance * strength).floor()
        }
    }

    /// Interprets the pipeline output. Returns `None` when nothing should be traded.
    pub fn decide(&self, operation: Operation, score: f64) -> Option<OrderIntent> {
        if let Some(held) = self.position.side.direction() {
            let close = match operation {
                Operation::Exit => true,
                Operation::Long => held == Direction::Short,
                Operation::Short => held == Direction::Long,
                Operation::None => false,
            };
            return close.then_some(OrderIntent::Exit {
                side: held,
                quantity: self.position.size,
            });
        }

        let (side, strength) = match operation {
            Operation::Long => (Direction::Long, score),
            Operation::Short => (Direction::Short, -score),
            Operation::None | Operation::Exit => return None,
        };
        if self.available_balance <= 0.0 {
            return None;
        }
        let notional = self.entry_notional(strength);
        if !notional.is_finite() || notional <= 0.0 {
            return None;
        }
        Some(OrderIntent::Enter { side, notional })
    }

    /// Applies a confirmed fill for `intent` and returns the trade record.
    /// On error the account is left untouched.
    pub fn apply_fill(
        &mut self,
        intent: &OrderIntent,
        fill: &OrderFill,
        recorded_at: DateTime<Utc>,
    ) -> Result<TradeRecord, OrderError> {
        if !fill.price.is_finite() || fill.price <= 0.0 {
            return Err(OrderError::InvalidFill(format!("price {}", fill.price)));
        }
        if !fill.filled_quantity.is_finite() || fill.filled_quantity <= 0.0 {
            return Err(OrderError::InvalidFill(format!(
                "filled quantity {}",
                fill.filled_quantity
            )));
        }

        let balance_change = match *intent {
            OrderIntent::Enter { side, notional } => {
                if !self.position.is_flat() {
                    return Err(OrderError::InvalidFill(format!(
                        "entry fill while already {}",
                        self.position.side
                    )));
                }
                let change = match side {
                    Direction::Long => -notional,
                    Direction::Short => notional,
                };
                self.position = PositionSnapshot {
                    side: side.position_side(),
                    size: fill.filled_quantity,
                    entry_price: fill.price,
                };
                change
            }
            OrderIntent::Exit { side, .. } => {
                if self.position.side != side.position_side() {
                    return Err(OrderError::InvalidFill(format!(
                        "exit fill for {side} while {}",
                        self.position.side
                    )));
                }
                let change = match side {
                    Direction::Long => fill.notional(),
                    Direction::Short => -fill.notional(),
                };
                self.position = PositionSnapshot::flat();
                change
            }
        };
        self.available_balance += balance_change;

        Ok(TradeRecord {
            recorded_at,
            instrument: self.instrument.clone(),
            side: intent.order_side(),
            price: fill.price,
            quantity: fill.filled_quantity,
            resulting_balance: self.available_balance,
            balance_change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::side::PositionSide;

    fn fill(price: f64, qty: f64) -> OrderFill {
        OrderFill {
            order_id: "1".to_string(),
            price,
            filled_quantity: qty,
        }
    }

    fn enter(account: &mut TradingAccount, op: Operation, score: f64, price: f64) -> TradeRecord {
        let intent = account.decide(op, score).expect("entry intent");
        let OrderIntent::Enter { notional, .. } = intent else {
            panic!("expected entry, got {intent:?}");
        };
        account
            .apply_fill(&intent, &fill(price, notional / price), Utc::now())
            .expect("apply entry")
    }

    #[test]
    fn strong_long_signal_commits_entire_balance() {
        let mut account = TradingAccount::new("OL-USDT".to_string(), 1000.0);
        let intent = account.decide(Operation::Long, 1.5).unwrap();
        assert_eq!(
            intent,
            OrderIntent::Enter {
                side: Direction::Long,
                notional: 1000.0
            }
        );
        enter(&mut account, Operation::Long, 1.5, 2.0);
        assert!(account.available_balance().abs() < 1e-9);
        assert_eq!(account.position().side, PositionSide::Long);
        assert!((account.position().size - 500.0).abs() < 1e-9);
        assert_eq!(account.position().entry_price, 2.0);
    }

    #[test]
    fn half_strength_commits_half_balance() {
        let mut account = TradingAccount::new("OL-USDT".to_string(), 1000.0);
        let record = enter(&mut account, Operation::Long, 0.5, 4.0);
        assert!((account.available_balance() - 500.0).abs() < 1e-9);
        assert!((record.balance_change + 500.0).abs() < 1e-9);
        assert_eq!(record.side, OrderSide::Buy);
    }

    #[test]
    fn fractional_notional_is_floored_and_zero_is_skipped() {
        let account = TradingAccount::new("OL-USDT".to_string(), 10.9);
        assert_eq!(account.entry_notional(2.0), 10.0);
        assert_eq!(account.entry_notional(0.05), 0.0);
        assert!(account.decide(Operation::Long, 0.05).is_none());
        assert!(account.decide(Operation::Long, -1.0).is_none());
    }

    #[test]
    fn no_balance_means_no_entry() {
        let account = TradingAccount::new("OL-USDT".to_string(), 0.0);
        assert!(account.decide(Operation::Long, 2.0).is_none());
    }

    #[test]
    fn short_entry_sizes_by_negative_score() {
        let mut account = TradingAccount::new("OL-USDT".to_string(), 1000.0);
        let intent = account.decide(Operation::Short, -0.25).unwrap();
        assert_eq!(
            intent,
            OrderIntent::Enter {
                side: Direction::Short,
                notional: 250.0
            }
        );
        assert_eq!(intent.order_side(), OrderSide::Sell);
        let record = account
            .apply_fill(&intent, &fill(5.0, 50.0), Utc::now())
            .unwrap();
        assert!((account.available_balance() - 1250.0).abs() < 1e-9);
        assert_eq!(record.side, OrderSide::Sell);
    }

    #[test]
    fn same_side_signal_is_idempotent_and_none_waits() {
        let mut account = TradingAccount::new("OL-USDT".to_string(), 1000.0);
        enter(&mut account, Operation::Long, 1.0, 10.0);
        assert!(account.decide(Operation::Long, 3.0).is_none());
        assert!(account.decide(Operation::None, 0.0).is_none());
    }

    #[test]
    fn exit_and_opposite_signal_close_the_position() {
        let mut account = TradingAccount::new("OL-USDT".to_string(), 1000.0);
        enter(&mut account, Operation::Long, 1.0, 10.0);

        let by_opposite = account.decide(Operation::Short, -1.0).unwrap();
        let by_exit = account.decide(Operation::Exit, 1.0).unwrap();
        assert_eq!(by_opposite, by_exit);
        assert_eq!(
            by_exit,
            OrderIntent::Exit {
                side: Direction::Long,
                quantity: 100.0
            }
        );
        assert_eq!(by_exit.order_side(), OrderSide::Sell);
        assert_eq!(by_exit.size(), OrderSize::Base(100.0));

        let record = account
            .apply_fill(&by_exit, &fill(11.0, 100.0), Utc::now())
            .unwrap();
        assert!((account.available_balance() - 1100.0).abs() < 1e-9);
        assert!((record.resulting_balance - 1100.0).abs() < 1e-9);
        assert_eq!(account.position(), PositionSnapshot::flat());
    }

    #[test]
    fn covering_a_short_spends_the_fill_notional() {
        let mut account = TradingAccount::new("OL-USDT".to_string(), 100.0);
        let intent = account.decide(Operation::Short, -1.0).unwrap();
        account
            .apply_fill(&intent, &fill(10.0, 10.0), Utc::now())
            .unwrap();
        assert!((account.available_balance() - 200.0).abs() < 1e-9);

        let exit = account.decide(Operation::Exit, 1.0).unwrap();
        assert_eq!(exit.order_side(), OrderSide::Buy);
        account.apply_fill(&exit, &fill(9.0, 10.0), Utc::now()).unwrap();
        assert!((account.available_balance() - 110.0).abs() < 1e-9);
        assert!(account.position().is_flat());
    }

    #[test]
    fn invalid_fill_leaves_account_untouched() {
        let mut account = TradingAccount::new("OL-USDT".to_string(), 1000.0);
        let intent = account.decide(Operation::Long, 1.0).unwrap();
        let err = account
            .apply_fill(&intent, &fill(0.0, 1.0), Utc::now())
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidFill(_)));
        assert_eq!(account.available_balance(), 1000.0);
        assert!(account.position().is_flat());
    }

    #[test]
    fn stale_exit_fill_is_rejected() {
        let mut account = TradingAccount::new("OL-USDT".to_string(), 1000.0);
        let stale = OrderIntent::Exit {
            side: Direction::Long,
            quantity: 1.0,
        };
        assert!(account
            .apply_fill(&stale, &fill(1.0, 1.0), Utc::now())
            .is_err());
        assert_eq!(account.available_balance(), 1000.0);
    }
}
