//! Types used by the package/job store.

/// Job identifier.
pub type JobId = i64;

/// Package identifier.
pub type PackageId = i64;

/// Job lifecycle status, stored as a string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => JobStatus::Queued,
            "running" => JobStatus::Running,
            "finished" => JobStatus::Finished,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Failed,
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// One download job, owned by its package.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub package_id: PackageId,
    pub url: String,
    /// Name of the plugin the registry resolved for this URL.
    pub plugin: String,
    /// Stored filename; null until resolved during the transfer.
    pub filename: Option<String>,
    pub status: JobStatus,
    pub retry_count: i64,
    /// User-visible failure reason for failed jobs.
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A package grouping added links.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    pub id: PackageId,
    pub name: String,
    pub created_at: i64,
}

/// Result of adding a batch of links to a package.
#[derive(Debug, Default)]
pub struct AddedLinks {
    pub jobs: Vec<JobId>,
    /// URLs no registered plugin matched; no job row exists for these.
    pub unsupported: Vec<String>,
}
