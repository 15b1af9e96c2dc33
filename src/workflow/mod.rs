//! Per-session state machine and the engine that drives it

mod engine;
mod machine;

pub use engine::{Engine, PlanObserver, SessionOutcome, SessionResult};
pub use machine::{Machine, SessionState, Transition};
