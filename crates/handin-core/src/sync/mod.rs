//! Offline-sync engine: conflict resolution, bulk writes, revision diffing

pub mod conflict;
pub mod diff;
pub mod processor;
pub mod revision;

pub use conflict::{resolve, Resolution};
pub use diff::revs_diff;
pub use processor::BulkSyncProcessor;
pub use revision::RevisionGenerator;
