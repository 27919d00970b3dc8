//! Synchronous publish/subscribe bus over a fixed lifecycle vocabulary.
//!
//! `publish` runs every handler for the event, in registration order, before
//! it returns. Handler failures (errors or panics) are logged and isolated so
//! one misbehaving addon never starves its siblings or the publisher.

mod event;

pub use event::{Event, EventKind};

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Configuration-level errors: bad subscriptions, bad descriptors, bad values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown event name: {0}")]
    UnknownEvent(String),
    #[error("bad plugin descriptor: {0}")]
    BadDescriptor(String),
    #[error("bad config value for {key}: {reason}")]
    BadValue { key: String, reason: String },
}

/// Event handler: runs synchronously in the publisher's context, so it must
/// not block for long. Long work belongs in a periodical task.
pub type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

struct Subscription {
    owner: String,
    handler: Handler,
}

/// In-process event bus.
#[derive(Default)]
pub struct EventBus {
    subs: RwLock<HashMap<EventKind, Vec<Subscription>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `kind` on behalf of `owner` (addon name).
    pub fn subscribe(&self, kind: EventKind, owner: &str, handler: Handler) {
        self.subs
            .write()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(Subscription {
                owner: owner.to_string(),
                handler,
            });
    }

    /// Subscribe by canonical event name; unknown names fail fast.
    pub fn subscribe_named(
        &self,
        name: &str,
        owner: &str,
        handler: Handler,
    ) -> Result<(), ConfigError> {
        let kind = EventKind::from_name(name)
            .ok_or_else(|| ConfigError::UnknownEvent(name.to_string()))?;
        self.subscribe(kind, owner, handler);
        Ok(())
    }

    /// Remove every subscription held by `owner` (addon deactivation).
    pub fn unsubscribe_owner(&self, owner: &str) {
        let mut subs = self.subs.write().unwrap();
        for list in subs.values_mut() {
            list.retain(|s| s.owner != owner);
        }
    }

    /// Run all handlers for the event, in registration order, before
    /// returning. A handler error or panic is logged and skipped.
    pub fn publish(&self, event: &Event) {
        let handlers: Vec<(String, Handler)> = {
            let subs = self.subs.read().unwrap();
            match subs.get(&event.kind()) {
                Some(list) => list
                    .iter()
                    .map(|s| (s.owner.clone(), Arc::clone(&s.handler)))
                    .collect(),
                None => return,
            }
        };

        for (owner, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        event = event.kind().as_str(),
                        owner = %owner,
                        "event handler failed: {:#}",
                        e
                    );
                }
                Err(_) => {
                    tracing::error!(
                        event = event.kind().as_str(),
                        owner = %owner,
                        "event handler panicked"
                    );
                }
            }
        }
    }
}
