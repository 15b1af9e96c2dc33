mod fanout;
pub mod retry;

pub use fanout::{FanOut, FanOutReport};
