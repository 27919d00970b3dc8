//! Pause/cancel control: shared abort tokens per running job.
//!
//! The worker pool registers each running job here; the remote backend can
//! request an abort, which the executor observes between retry attempts and
//! inside the transfer write callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::jobs::JobId;

/// Shared registry of job id -> abort token.
#[derive(Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<JobId, Arc<AtomicBool>>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a running job; returns the abort token handed to the
    /// executor. Call when starting a job.
    pub fn register(&self, job_id: JobId) -> Arc<AtomicBool> {
        let token = Arc::new(AtomicBool::new(false));
        self.jobs.write().unwrap().insert(job_id, Arc::clone(&token));
        token
    }

    /// Unregister a job (call when it finishes, success or failure).
    pub fn unregister(&self, job_id: JobId) {
        self.jobs.write().unwrap().remove(&job_id);
    }

    /// Number of currently registered (running) jobs.
    pub fn active_jobs(&self) -> usize {
        self.jobs.read().unwrap().len()
    }

    /// Request abort for a job. Returns true if the job was running.
    pub fn request_abort(&self, job_id: JobId) -> bool {
        match self.jobs.read().unwrap().get(&job_id) {
            Some(token) => {
                token.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}
