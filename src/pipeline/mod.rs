//! Per-turn timeline orchestration.

pub mod coordinator;
pub mod messages;

pub use coordinator::LipSyncPipeline;
pub use messages::{TimelineRequest, TimelineResult, TimelineSource};
