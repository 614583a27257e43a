use crate::value_objects::side::OrderSide;
use serde::{Deserialize, Serialize};

/// Order size. Entries are sized as a quote-currency notional, exits as the
/// base quantity currently held.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "amount", rename_all = "lowercase")]
pub enum OrderSize {
    Quote(f64),
    Base(f64),
}

impl OrderSize {
    pub fn amount(&self) -> f64 {
        match self {
            OrderSize::Quote(v) | OrderSize::Base(v) => *v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub instrument: String,
    pub side: OrderSide,
    pub size: OrderSize,
    pub reference_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: String,
    pub price: f64,
    pub filled_quantity: f64,
}

impl OrderFill {
    pub fn notional(&self) -> f64 {
        self.price * self.filled_quantity
    }
}
