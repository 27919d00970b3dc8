//! URL-to-plugin resolution.
//!
//! The registry keeps descriptors in a copy-on-write snapshot ordered by
//! descending pattern specificity (longest literal prefix first). Resolution
//! walks the snapshot and returns the first match; replacement swaps in a new
//! snapshot, so in-flight jobs keep the descriptor `Arc` they resolved
//! against until they complete.

mod descriptor;
mod loader;

pub use descriptor::{ConfigOption, OptionKind, PluginDescriptor, PluginKind};
pub use loader::{load_or_init, plugins_path, register_from_str};

use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::events::ConfigError;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unsupported source: no plugin handles {url}")]
    NotFound { url: String },
}

type Snapshot = Arc<Vec<Arc<PluginDescriptor>>>;

/// Process-lifetime plugin table.
#[derive(Default)]
pub struct PluginRegistry {
    snapshot: RwLock<Snapshot>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Ordering is by descending specificity, with
    /// registration order breaking ties.
    pub fn register(&self, descriptor: PluginDescriptor) {
        let mut guard = self.snapshot.write().unwrap();
        let mut table: Vec<Arc<PluginDescriptor>> = guard.as_ref().clone();
        let descriptor = Arc::new(descriptor);
        let at = table
            .iter()
            .position(|d| d.specificity < descriptor.specificity)
            .unwrap_or(table.len());
        table.insert(at, descriptor);
        *guard = Arc::new(table);
    }

    /// Replace the descriptor registered under `descriptor.name`, or add it
    /// if absent. Readers holding the old `Arc` are unaffected.
    pub fn replace(&self, descriptor: PluginDescriptor) {
        {
            let mut guard = self.snapshot.write().unwrap();
            let table: Vec<Arc<PluginDescriptor>> = guard
                .as_ref()
                .iter()
                .filter(|d| d.name != descriptor.name)
                .cloned()
                .collect();
            *guard = Arc::new(table);
        }
        self.register(descriptor);
    }

    /// Resolve the plugin for `url`: first match in specificity order.
    pub fn resolve(&self, url: &str) -> Result<Arc<PluginDescriptor>, ResolveError> {
        let snapshot = Arc::clone(&self.snapshot.read().unwrap());
        snapshot
            .iter()
            .find(|d| d.matches(url))
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                url: url.to_string(),
            })
    }

    /// Look up a descriptor by plugin name.
    pub fn get(&self, name: &str) -> Option<Arc<PluginDescriptor>> {
        let snapshot = Arc::clone(&self.snapshot.read().unwrap());
        snapshot.iter().find(|d| d.name == name).cloned()
    }

    /// Registered plugin names, in match order.
    pub fn names(&self) -> Vec<String> {
        let snapshot = Arc::clone(&self.snapshot.read().unwrap());
        snapshot.iter().map(|d| d.name.clone()).collect()
    }

    /// Convenience: build and register in one call.
    pub fn register_new(
        &self,
        name: &str,
        kind: PluginKind,
        pattern: &str,
        version: &str,
    ) -> Result<(), ConfigError> {
        self.register(PluginDescriptor::new(name, kind, pattern, version)?);
        Ok(())
    }
}
