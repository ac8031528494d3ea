//! Run orchestration and shared execution primitives.

pub mod orchestrator;
pub mod retry;

pub use orchestrator::{BatchOutcome, GenerationOrchestrator};
pub use retry::RetryPolicy;
