use crate::errors::OrderError;
use crate::value_objects::order::{OrderFill, OrderRequest};

/// Places a market order and reports the confirmed fill.
pub trait OrderExecutor {
    fn place_order(&self, request: &OrderRequest) -> Result<OrderFill, OrderError>;
}

impl<E: OrderExecutor + ?Sized> OrderExecutor for Box<E> {
    fn place_order(&self, request: &OrderRequest) -> Result<OrderFill, OrderError> {
        (**self).place_order(request)
    }
}
