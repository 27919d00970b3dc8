//! Addon interface and lifecycle.
//!
//! An addon declares the events it handles as an explicit capability set and
//! is registered once, before any dispatch. Activation subscribes its
//! handler and starts its periodical (if declared); deactivation removes the
//! subscriptions and stops future ticks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};

use crate::events::{Event, EventBus, EventKind};
use crate::periodical::{spawn_periodical, PeriodicalHandle};

/// An event-driven extension outside the download path.
pub trait Addon: Send + Sync {
    fn name(&self) -> &str;

    /// Capability set: the lifecycle events this addon reacts to.
    fn events(&self) -> Vec<EventKind>;

    /// Synchronous event hook. Must not block for long; long work belongs in
    /// the periodical task.
    fn handle(&self, event: &Event) -> Result<()>;

    /// Interval for the addon's periodic task, if it has one.
    fn periodical_interval(&self) -> Option<Duration> {
        None
    }

    /// Periodic task body; runs on a blocking thread, never overlapping.
    fn periodical_task(&self) -> Result<()> {
        Ok(())
    }
}

struct ActiveAddon {
    periodical: Option<PeriodicalHandle>,
}

/// Activates and deactivates addons against the event bus.
pub struct AddonManager {
    bus: Arc<EventBus>,
    active: Mutex<HashMap<String, ActiveAddon>>,
}

impl AddonManager {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe the addon's handler for its declared events and start its
    /// periodical. Activating an already-active addon is an error.
    pub fn activate(&self, addon: Arc<dyn Addon>) -> Result<()> {
        let name = addon.name().to_string();
        let mut active = self.active.lock().unwrap();
        if active.contains_key(&name) {
            bail!("addon {} is already active", name);
        }

        for kind in addon.events() {
            let addon_cb = Arc::clone(&addon);
            self.bus
                .subscribe(kind, &name, Arc::new(move |ev| addon_cb.handle(ev)));
        }

        let periodical = addon.periodical_interval().map(|interval| {
            let addon_cb = Arc::clone(&addon);
            spawn_periodical(&name, interval, Arc::new(move || addon_cb.periodical_task()))
        });

        tracing::info!(addon = %name, "addon activated");
        active.insert(name, ActiveAddon { periodical });
        Ok(())
    }

    /// Remove the addon's subscriptions and stop its periodical. An in-flight
    /// tick finishes. Unknown names are a no-op.
    pub fn deactivate(&self, name: &str) {
        let Some(entry) = self.active.lock().unwrap().remove(name) else {
            return;
        };
        self.bus.unsubscribe_owner(name);
        if let Some(handle) = entry.periodical {
            handle.stop();
        }
        tracing::info!(addon = name, "addon deactivated");
    }

    pub fn active_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.active.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}
