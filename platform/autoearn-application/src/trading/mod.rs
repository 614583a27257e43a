pub mod engine;
pub mod session;

pub use engine::{CycleOutcome, EngineSettings, EngineStats, OrderOutcome, TradingEngine};
pub use session::{
    run_session, Deadline, NoopControl, SessionControl, SessionEnd, SessionReport,
    SessionStatus,
};
