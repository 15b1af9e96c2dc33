//! Reasoning adapter: prompt in, proposal out, faults absorbed

mod adapter;
mod breaker;
mod parse;
mod prompt;

pub use adapter::{build_adapters, ReasoningAdapter};
pub use breaker::{CircuitBreaker, CircuitState};
pub use parse::parse_response;
pub use prompt::{domain_prompt, merge_prompt};
