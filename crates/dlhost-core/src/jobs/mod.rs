//! Package/job persistence.
//!
//! Jobs are created by `add_links` (URL resolution through the registry
//! happens there, so an unsupported URL never produces a job row), mutated by
//! the worker pool as status transitions occur, and removed with their
//! package.

mod db;
mod store;
mod types;

pub use db::JobStore;
pub use types::{AddedLinks, JobId, JobRecord, JobStatus, PackageId, PackageRecord};
