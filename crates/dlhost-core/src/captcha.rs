//! Out-of-band captcha resolution.
//!
//! A plugin mid-download submits a challenge and awaits the result without
//! holding a worker slot; solvers (addons, remote clients) answer by id.
//! Terminal states are solved, invalid, and timed out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::events::{Event, EventBus};

pub type CaptchaId = u64;

#[derive(Debug, Error)]
pub enum CaptchaError {
    #[error("captcha task {0} timed out")]
    Timeout(CaptchaId),
    #[error("captcha task {0} answered invalid")]
    Invalid(CaptchaId),
}

enum Answer {
    Solved(String),
    Invalid,
}

struct PendingTask {
    challenge: Vec<u8>,
    tx: oneshot::Sender<Answer>,
}

/// Tracks pending captcha tasks and routes answers back to waiters.
pub struct CaptchaHub {
    bus: Arc<EventBus>,
    timeout: Duration,
    next_id: AtomicU64,
    pending: Mutex<HashMap<CaptchaId, PendingTask>>,
}

impl CaptchaHub {
    pub fn new(bus: Arc<EventBus>, timeout: Duration) -> Self {
        Self {
            bus,
            timeout,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Submit a challenge and wait for its resolution.
    ///
    /// Publishes `captcha_task` immediately; resolves to the solution text,
    /// or errors when the answer is invalid or nobody answered in time.
    pub async fn submit(&self, challenge: Vec<u8>) -> Result<String, CaptchaError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap()
            .insert(id, PendingTask { challenge, tx });
        self.bus.publish(&Event::CaptchaTask { id });

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Answer::Solved(text))) => Ok(text),
            Ok(Ok(Answer::Invalid)) => Err(CaptchaError::Invalid(id)),
            // Sender dropped: hub shutdown; treat as timeout.
            Ok(Err(_)) => Err(CaptchaError::Timeout(id)),
            Err(_) => {
                self.pending.lock().unwrap().remove(&id);
                tracing::warn!(captcha = id, "captcha task timed out");
                Err(CaptchaError::Timeout(id))
            }
        }
    }

    /// Answer a pending task with a solution. Publishes `captcha_correct`.
    /// Returns false when the task is unknown or already resolved.
    pub fn solve(&self, id: CaptchaId, text: &str) -> bool {
        let Some(task) = self.pending.lock().unwrap().remove(&id) else {
            return false;
        };
        if task.tx.send(Answer::Solved(text.to_string())).is_err() {
            return false;
        }
        self.bus.publish(&Event::CaptchaCorrect { id });
        true
    }

    /// Mark a pending task's answer invalid. Publishes `captcha_invalid`.
    pub fn reject(&self, id: CaptchaId) -> bool {
        let Some(task) = self.pending.lock().unwrap().remove(&id) else {
            return false;
        };
        if task.tx.send(Answer::Invalid).is_err() {
            return false;
        }
        self.bus.publish(&Event::CaptchaInvalid { id });
        true
    }

    /// Ids and challenge payloads of unanswered tasks.
    pub fn pending(&self) -> Vec<(CaptchaId, Vec<u8>)> {
        let mut tasks: Vec<(CaptchaId, Vec<u8>)> = self
            .pending
            .lock()
            .unwrap()
            .iter()
            .map(|(id, t)| (*id, t.challenge.clone()))
            .collect();
        tasks.sort_by_key(|(id, _)| *id);
        tasks
    }
}
