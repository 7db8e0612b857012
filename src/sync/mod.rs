//! Incremental mirroring: decision engine, catalog batching, the concurrent
//! orchestrator and the run report it produces.

pub mod batch;
pub mod engine;
pub mod orchestrator;
pub mod report;

pub use batch::{BatchPartitioner, BatchWindow, BATCH_THRESHOLD};
pub use engine::{DestinationState, ScanState, SyncDecision, SyncEngine};
pub use orchestrator::{SyncOrchestrator, DEFAULT_POOL_SIZE};
pub use report::{ImageReport, ImageStatus, RunReport, TagFailure};
