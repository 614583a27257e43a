use crate::value_objects::side::PositionSide;
use serde::{Deserialize, Serialize};

/// Open position as seen by one decision cycle. `size` and `entry_price` are
/// zero whenever `side` is flat.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub side: PositionSide,
    pub size: f64,
    pub entry_price: f64,
}

impl PositionSnapshot {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_flat(&self) -> bool {
        self.side.is_flat()
    }
}
