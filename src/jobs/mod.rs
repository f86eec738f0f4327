pub mod api;
pub mod models;
pub mod orchestrator;
pub mod store;

pub use models::{JobKind, JobRecord, JobState, JobStatusView};
pub use orchestrator::JobOrchestrator;
pub use store::JobStore;
