pub mod commands;
pub mod controller;
pub mod handle;
pub mod registry;
pub mod service;

pub use commands::{LoopCommand, LoopState, LoopStatus};
pub use controller::LoopController;
pub use handle::LoopHandle;
pub use registry::LoopRegistry;
pub use service::{OrchestratorService, OrderPlan};
