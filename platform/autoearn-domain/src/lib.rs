//! Domain core for AutoEarn: candle bookkeeping, the scoring pipeline and the
//! trading account state machine. Ports to the outside world live in
//! [`repositories`].

pub mod aggregates;
pub mod errors;
pub mod repositories;
pub mod services;
pub mod value_objects;
