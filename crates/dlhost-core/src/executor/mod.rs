//! Per-job download executor.
//!
//! Given a claimed job and its resolved plugin descriptor, the executor plans
//! the request (premium with session injection, or free), streams the body to
//! a `.part` file, applies the retry policy, and emits the job's lifecycle
//! events. Runs blocking curl; the worker pool calls it from
//! `spawn_blocking`.

mod error;
mod request;
mod transfer;

pub use error::DownloadError;
pub use request::{build_request, RequestPlan};
pub use transfer::{fetch_to_part, TransferError, TransferOutcome};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::accounts::AccountStore;
use crate::events::{Event, EventBus};
use crate::jobs::JobRecord;
use crate::naming;
use crate::registry::PluginDescriptor;
use crate::retry::{classify_curl_error, classify_http_status, ErrorKind, RetryDecision, RetryPolicy};

/// Successful download result.
#[derive(Debug)]
pub struct Transfer {
    pub filename: String,
    pub bytes_written: u64,
}

/// Classify a transfer error for the retry policy.
fn classify_transfer(e: &TransferError) -> ErrorKind {
    match e {
        TransferError::Curl(ce) => classify_curl_error(ce),
        TransferError::Http(code) => classify_http_status(*code),
        TransferError::Storage(_) | TransferError::Aborted => ErrorKind::Other,
    }
}

pub struct Executor {
    accounts: Arc<AccountStore>,
    bus: Arc<EventBus>,
    policy: RetryPolicy,
    download_dir: PathBuf,
}

impl Executor {
    pub fn new(
        accounts: Arc<AccountStore>,
        bus: Arc<EventBus>,
        policy: RetryPolicy,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            accounts,
            bus,
            policy,
            download_dir,
        }
    }

    /// Runs the job to a terminal state, publishing `download_start` first
    /// and exactly one of `download_finished` / `download_failed` after.
    /// A cancelled job publishes no terminal event; the pool records the
    /// cancelled status instead.
    pub fn execute(
        &self,
        job: &JobRecord,
        descriptor: &PluginDescriptor,
        abort: &Arc<AtomicBool>,
    ) -> Result<Transfer, DownloadError> {
        self.bus.publish(&Event::DownloadStart { job: job.id });

        match self.run(job, descriptor, abort) {
            Ok(transfer) => {
                self.bus.publish(&Event::DownloadFinished {
                    job: job.id,
                    filename: transfer.filename.clone(),
                    bytes: transfer.bytes_written,
                });
                Ok(transfer)
            }
            Err(DownloadError::Cancelled) => Err(DownloadError::Cancelled),
            Err(e) => {
                self.bus.publish(&Event::DownloadFailed {
                    job: job.id,
                    reason: e.reason(),
                });
                Err(e)
            }
        }
    }

    fn run(
        &self,
        job: &JobRecord,
        descriptor: &PluginDescriptor,
        abort: &Arc<AtomicBool>,
    ) -> Result<Transfer, DownloadError> {
        // Without a disposition hint coming, an unusable URL name can only
        // fail later; reject it before issuing any request.
        if !descriptor.disposition && naming::decoded_url_filename(&job.url).is_none() {
            return Err(DownloadError::InvalidFilename {
                url: job.url.clone(),
            });
        }

        let mut plan = self.plan_request(job, descriptor)?;
        let part_path = self.download_dir.join(format!("job-{}.part", job.id));

        let mut attempt = 1u32;
        let mut refreshed_session = false;
        let outcome = loop {
            if abort.load(Ordering::Relaxed) {
                return Err(DownloadError::Cancelled);
            }

            match fetch_to_part(&plan.url, &part_path, abort) {
                Ok(outcome) => break outcome,
                Err(TransferError::Aborted) => return Err(DownloadError::Cancelled),
                Err(e) => {
                    let kind = classify_transfer(&e);

                    if let ErrorKind::AuthRejected(code) = kind {
                        if !plan.premium {
                            // Anonymous request; no session to refresh.
                            return Err(DownloadError::Network(format!(
                                "server refused the request with HTTP {code}"
                            )));
                        }
                        if !refreshed_session {
                            // One forced refresh, outside the retry budget.
                            refreshed_session = true;
                            self.accounts.invalidate(descriptor.account_service());
                            tracing::info!(
                                job = job.id,
                                plugin = %descriptor.name,
                                "premium request rejected (HTTP {}), refreshing session",
                                code
                            );
                            plan = self.plan_request(job, descriptor)?;
                            continue;
                        }
                        return Err(DownloadError::Auth(format!(
                            "premium request rejected with HTTP {code}"
                        )));
                    }

                    match self.policy.decide(attempt, kind) {
                        RetryDecision::RetryAfter(delay) => {
                            tracing::debug!(
                                job = job.id,
                                attempt,
                                "transfer failed ({}), retrying in {:?}",
                                e,
                                delay
                            );
                            std::thread::sleep(delay);
                            attempt += 1;
                        }
                        RetryDecision::NoRetry => {
                            return Err(match e {
                                TransferError::Storage(io) => DownloadError::Storage(io.to_string()),
                                other => DownloadError::Network(other.to_string()),
                            });
                        }
                    }
                }
            }
        };

        let hint = outcome
            .content_disposition
            .as_deref()
            .filter(|_| descriptor.disposition);
        let Some(filename) = naming::select_filename(&job.url, hint) else {
            let _ = std::fs::remove_file(&part_path);
            return Err(DownloadError::InvalidFilename {
                url: job.url.clone(),
            });
        };

        let final_path = self.download_dir.join(&filename);
        std::fs::rename(&part_path, &final_path)
            .map_err(|e| DownloadError::Storage(e.to_string()))?;

        Ok(Transfer {
            filename,
            bytes_written: outcome.bytes_written,
        })
    }

    /// Builds the premium or free request for the job.
    ///
    /// A configured account that cannot produce a session is an auth failure
    /// (the premium scenario must not silently degrade to the free path); a
    /// service with no account at all downloads anonymously.
    fn plan_request(
        &self,
        job: &JobRecord,
        descriptor: &PluginDescriptor,
    ) -> Result<RequestPlan, DownloadError> {
        let service = descriptor.account_service();
        let session = if descriptor.premium && self.accounts.has_account(service) {
            Some(
                self.accounts
                    .get_session(service)
                    .map_err(|e| DownloadError::Auth(e.to_string()))?,
            )
        } else {
            None
        };
        Ok(build_request(&job.url, descriptor, session.as_ref()))
    }
}
