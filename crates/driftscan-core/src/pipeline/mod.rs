pub mod config;
pub mod orchestrator;
pub mod types;

pub use config::PipelineConfig;
pub use orchestrator::{PipelineOutcome, StageOrchestrator};
pub use types::{PipelineObserver, PipelineState, StageKind};
