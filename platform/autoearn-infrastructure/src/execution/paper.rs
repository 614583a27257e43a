use autoearn_domain::errors::OrderError;
use autoearn_domain::repositories::order_execution::OrderExecutor;
use autoearn_domain::value_objects::order::{OrderFill, OrderRequest, OrderSize};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Fills kept for inspection; older ones are dropped.
pub const JOURNAL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct PaperFill {
    pub request: OrderRequest,
    pub fill: OrderFill,
}

#[derive(Debug, Default)]
struct PaperState {
    next_id: u64,
    journal: VecDeque<PaperFill>,
}

/// Fills market orders immediately at the request's reference price.
///
/// Quote-sized orders are converted to base quantity at that price. Nothing
/// leaves the process. Only the newest [`JOURNAL_CAPACITY`] fills are kept.
#[derive(Debug, Default)]
pub struct PaperOrderExecutor {
    state: Mutex<PaperState>,
}

impl PaperOrderExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent fills, oldest first.
    pub fn journal(&self) -> Vec<PaperFill> {
        self.state.lock().journal.iter().cloned().collect()
    }

    /// Total fills since construction.
    pub fn fills(&self) -> u64 {
        self.state.lock().next_id
    }
}

impl OrderExecutor for PaperOrderExecutor {
    fn place_order(&self, request: &OrderRequest) -> Result<OrderFill, OrderError> {
        let price = request.reference_price;
        if !price.is_finite() || price <= 0.0 {
            metrics::counter!("autoearn.infra.paper.orders_total", "result" => "rejected")
                .increment(1);
            return Err(OrderError::Rejected(format!("reference price {price}")));
        }
        let amount = request.size.amount();
        if !amount.is_finite() || amount <= 0.0 {
            metrics::counter!("autoearn.infra.paper.orders_total", "result" => "rejected")
                .increment(1);
            return Err(OrderError::Rejected(format!("order size {amount}")));
        }
        let filled_quantity = match request.size {
            OrderSize::Quote(notional) => notional / price,
            OrderSize::Base(quantity) => quantity,
        };

        let mut state = self.state.lock();
        state.next_id += 1;
        let fill = OrderFill {
            order_id: format!("paper-{}", state.next_id),
            price,
            filled_quantity,
        };
        if state.journal.len() == JOURNAL_CAPACITY {
            state.journal.pop_front();
        }
        state.journal.push_back(PaperFill {
            request: request.clone(),
            fill: fill.clone(),
        });
        metrics::counter!("autoearn.infra.paper.orders_total", "result" => "filled").increment(1);
        tracing::debug!(
            client_order_id = %request.client_order_id,
            order_id = %fill.order_id,
            side = %request.side,
            price,
            filled_quantity,
            "paper fill"
        );
        Ok(fill)
    }
}
