//! Bounded worker pool for queued jobs.
//!
//! Claims queued jobs FIFO and keeps up to `max_workers` transfers in flight.
//! Each transfer runs the blocking executor on a `spawn_blocking` thread.
//! Terminal statuses are written back to the store here, and the pool is the
//! one place package-level and queue-drained events are published.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::task::JoinSet;

use crate::control::JobControl;
use crate::events::{Event, EventBus};
use crate::executor::{DownloadError, Executor};
use crate::jobs::{JobRecord, JobStatus, JobStore, PackageId};
use crate::registry::PluginRegistry;

pub struct WorkerPool {
    store: JobStore,
    registry: Arc<PluginRegistry>,
    executor: Arc<Executor>,
    control: Arc<JobControl>,
    bus: Arc<EventBus>,
}

impl WorkerPool {
    pub fn new(
        store: JobStore,
        registry: Arc<PluginRegistry>,
        executor: Arc<Executor>,
        control: Arc<JobControl>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            registry,
            executor,
            control,
            bus,
        }
    }

    /// Run queued jobs until the queue drains. Returns the number of jobs
    /// run. Publishes `all_downloads_finished` and `all_downloads_processed`
    /// when at least one job ran.
    pub async fn run(&self, max_workers: usize) -> Result<u32> {
        let max_workers = max_workers.max(1);
        let mut join_set: JoinSet<Result<()>> = JoinSet::new();
        let announced: Arc<Mutex<HashSet<PackageId>>> = Arc::new(Mutex::new(HashSet::new()));
        let mut run_count = 0u32;

        loop {
            while join_set.len() < max_workers {
                let Some(job) = self.store.claim_next_queued().await? else {
                    break;
                };
                run_count += 1;

                let store = self.store.clone();
                let registry = Arc::clone(&self.registry);
                let executor = Arc::clone(&self.executor);
                let control = Arc::clone(&self.control);
                let bus = Arc::clone(&self.bus);
                let announced = Arc::clone(&announced);
                join_set.spawn(async move {
                    run_job(store, registry, executor, control, bus, announced, job).await
                });
            }

            if join_set.is_empty() {
                break;
            }
            let Some(res) = join_set.join_next().await else {
                break;
            };
            // One job hitting a store error must not abort the rest of the
            // queue or detach in-flight transfers.
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("job worker failed: {:#}", e),
                Err(e) => tracing::warn!("job task join: {}", e),
            }
        }

        if run_count > 0 {
            self.bus.publish(&Event::AllDownloadsFinished);
            self.bus.publish(&Event::AllDownloadsProcessed);
        }
        Ok(run_count)
    }
}

async fn run_job(
    store: JobStore,
    registry: Arc<PluginRegistry>,
    executor: Arc<Executor>,
    control: Arc<JobControl>,
    bus: Arc<EventBus>,
    announced: Arc<Mutex<HashSet<PackageId>>>,
    job: JobRecord,
) -> Result<()> {
    // The descriptor Arc resolved here stays with the job even if the
    // registry replaces the plugin mid-transfer.
    let Some(descriptor) = registry.get(&job.plugin) else {
        let reason = format!("unsupported: plugin {} is no longer registered", job.plugin);
        store.mark_failed(job.id, &reason, 0).await?;
        bus.publish(&Event::DownloadFailed {
            job: job.id,
            reason,
        });
        finish_package_if_done(&store, &bus, &announced, job.package_id).await?;
        return Ok(());
    };

    let abort = control.register(job.id);
    let attempts = (job.retry_count + 1) as u32;

    let outcome = {
        let executor = Arc::clone(&executor);
        let job_cl = job.clone();
        let abort_cl = Arc::clone(&abort);
        tokio::task::spawn_blocking(move || executor.execute(&job_cl, &descriptor, &abort_cl))
            .await
            .map_err(|e| anyhow::anyhow!("executor task join: {}", e))?
    };
    control.unregister(job.id);

    match outcome {
        Ok(transfer) => {
            store.mark_finished(job.id, &transfer.filename).await?;
            bus.publish(&Event::DownloadProcessed { job: job.id });
        }
        Err(DownloadError::Cancelled) => {
            store.mark_cancelled(job.id).await?;
            tracing::info!(job = job.id, "job cancelled");
        }
        Err(e) => {
            store.mark_failed(job.id, &e.reason(), attempts).await?;
        }
    }

    finish_package_if_done(&store, &bus, &announced, job.package_id).await
}

/// When every job in the package is terminal, publish the package outcome
/// (`package_processed`, plus `package_failed` when any job failed) once.
async fn finish_package_if_done(
    store: &JobStore,
    bus: &EventBus,
    announced: &Mutex<HashSet<PackageId>>,
    package: PackageId,
) -> Result<()> {
    let jobs = store.package_jobs(package).await?;
    if jobs.is_empty() || !jobs.iter().all(|j| j.status.is_terminal()) {
        return Ok(());
    }
    if !announced.lock().unwrap().insert(package) {
        return Ok(());
    }

    if let Some(failed) = jobs.iter().find(|j| j.status == JobStatus::Failed) {
        let reason = failed
            .error
            .clone()
            .unwrap_or_else(|| "download failed".to_string());
        bus.publish(&Event::PackageFailed { package, reason });
    }
    bus.publish(&Event::PackageProcessed { package });
    Ok(())
}
