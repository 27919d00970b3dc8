//! Download failure taxonomy.

use thiserror::Error;

/// Terminal download failures, recorded on the job as user-visible reasons.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Transient network failures that exhausted the retry budget, and
    /// non-retryable HTTP errors.
    #[error("network: {0}")]
    Network(String),
    /// Premium session invalid, expired and unrefreshable, or rejected after
    /// the one forced refresh.
    #[error("auth: {0}")]
    Auth(String),
    /// No plugin handles the source URL.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// The URL path decodes to an empty or unusable filename and the server
    /// offered no usable Content-Disposition name. Not retried.
    #[error("invalid filename derived from {url}")]
    InvalidFilename { url: String },
    /// Local write failure (disk full, permissions). Not retried.
    #[error("storage: {0}")]
    Storage(String),
    /// Job aborted by user between attempts or mid-stream.
    #[error("cancelled by user")]
    Cancelled,
}

impl DownloadError {
    /// Reason string stored on the failed job.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
