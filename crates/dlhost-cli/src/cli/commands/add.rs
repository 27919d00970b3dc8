//! `dlhost add [-p name] <urls...>` – create a package and queue its links.

use anyhow::Result;
use dlhost_core::events::EventBus;
use dlhost_core::jobs::JobStore;
use dlhost_core::registry::{self, PluginRegistry};

pub async fn run_add(store: &JobStore, package: &str, urls: &[String]) -> Result<()> {
    let registry = PluginRegistry::new();
    registry::load_or_init(&registry, &registry::plugins_path()?)?;
    let bus = EventBus::new();

    let pkg = store.create_package(package).await?;
    let added = store.add_links(pkg, urls, &registry, &bus).await?;

    for id in &added.jobs {
        println!("Queued job {id} in package {pkg} ({package})");
    }
    for url in &added.unsupported {
        println!("Skipped (no plugin matches): {url}");
    }
    if added.jobs.is_empty() {
        println!("No supported links added.");
    }
    Ok(())
}
