//! `dlhost run` – drain the queue with the worker pool.

use anyhow::Result;
use dlhost_core::accounts::{self, AccountStore, StoredSessionApi};
use dlhost_core::config::HostConfig;
use dlhost_core::control::JobControl;
use dlhost_core::events::{EventBus, EventKind};
use dlhost_core::executor::Executor;
use dlhost_core::jobs::JobStore;
use dlhost_core::pool::WorkerPool;
use dlhost_core::registry::{self, PluginRegistry};
use dlhost_core::remote::{self, RemoteBackend};
use std::sync::{Arc, Mutex};

pub async fn run_pool(store: &JobStore, cfg: &HostConfig, workers: Option<usize>) -> Result<()> {
    let recovered = store.recover_running_jobs().await?;
    if recovered > 0 {
        tracing::info!("re-queued {} job(s) from previous run", recovered);
    }

    let registry = Arc::new(PluginRegistry::new());
    let plugin_count = registry::load_or_init(&registry, &registry::plugins_path()?)?;
    tracing::debug!("loaded {} plugin descriptor(s)", plugin_count);

    let bus = Arc::new(EventBus::new());
    for kind in EventKind::ALL {
        bus.subscribe(
            kind,
            "console",
            Arc::new(|event| {
                tracing::info!(event = event.kind().as_str(), "{:?}", event);
                Ok(())
            }),
        );
    }

    let accounts = Arc::new(AccountStore::new(Arc::new(StoredSessionApi)));
    let loaded = accounts::load_into(&accounts::accounts_path()?, &accounts)?;
    tracing::debug!("loaded {} account(s)", loaded);

    let download_dir = match &cfg.download_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let executor = Arc::new(Executor::new(
        Arc::clone(&accounts),
        Arc::clone(&bus),
        cfg.retry_policy(),
        download_dir,
    ));
    let control = Arc::new(JobControl::new());

    let backend = Arc::new(RemoteBackend::new(
        store.clone(),
        Arc::clone(&registry),
        Arc::clone(&bus),
        Arc::clone(&control),
        Arc::new(Mutex::new(cfg.clone())),
    ));
    if let Ok(socket_path) = remote::default_socket_path() {
        if remote::spawn_listener(Arc::clone(&backend), &socket_path).is_ok() {
            tracing::debug!(path = %socket_path.display(), "remote socket listening");
        }
    }

    let pool = WorkerPool::new(
        store.clone(),
        registry,
        executor,
        control,
        Arc::clone(&bus),
    );
    let run_count = pool.run(workers.unwrap_or(cfg.max_workers)).await?;

    if run_count == 0 {
        println!("No queued jobs.");
    } else {
        println!("Completed {run_count} job(s).");
    }
    Ok(())
}
