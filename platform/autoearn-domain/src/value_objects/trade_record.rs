use crate::value_objects::side::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of one executed order, emitted after a confirmed fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub recorded_at: DateTime<Utc>,
    pub instrument: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    pub resulting_balance: f64,
    pub balance_change: f64,
}
