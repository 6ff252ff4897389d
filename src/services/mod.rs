//! Collaborators the group sync coordinates with.
//!
//! Each seam is a trait so tests can record calls; the implementations here
//! are the ones the binary wires up.

mod catalog;
mod error_events;
mod sink;
mod sync_status;

pub use catalog::{ConfiguredCatalog, EntityCatalog};
pub use error_events::{BackgroundErrorSink, TracingErrorSink};
pub use sink::{GroupSink, LoggingSink};
pub use sync_status::{GROUP_SYNC_JOB, StoreSyncStatus, SyncRecord, SyncStatus, SyncStatusReporter};
