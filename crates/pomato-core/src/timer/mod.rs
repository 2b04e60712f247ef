mod engine;
mod runner;

pub use engine::{CountdownEngine, Phase, PhaseClock, RemainingTime};
pub use runner::{SessionRunner, TICK_INTERVAL};
