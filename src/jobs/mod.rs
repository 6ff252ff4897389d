//! Group sync coordination: claiming work with fences, running it, and
//! resetting fences whose task has disappeared.

pub mod beat;
pub mod bodies;
pub mod error;
pub mod fence;
pub mod keys;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod types;
pub mod validator;
pub mod worker;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

pub use beat::BeatService;
pub use error::{JobError, JobResult};
pub use fence::{FenceRecord, SyncFence};
pub use keys::{TenantKeys, WorkKey};
pub use registry::{GroupStream, JobBody, SourceRegistry, SyncPolicy};
pub use runner::{FenceWaitState, JobRunner, RunOutcome};
pub use scheduler::{BeatReport, BeatScheduler, GROUP_SYNC_TASK};
pub use types::{AccessType, EntityStatus, ExternalGroup, JobContext, SourceType, SyncEntity};
pub use validator::{FenceValidator, FenceVerdict, QueueSnapshot, ValidationReport};
pub use worker::WorkerPool;
