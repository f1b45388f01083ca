pub mod engine;
pub mod pricing;

pub use engine::{next_open_decision, ExecutionEngine, NextOpenDecision};
pub use pricing::{PricingModel, Quote};
