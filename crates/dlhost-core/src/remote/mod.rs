//! Remote control backend.
//!
//! Newline-delimited JSON over a Unix socket under the XDG state dir. Each
//! line is one `ApiRequest`; replies and (after `subscribe`) pushed bus
//! events are JSON lines back. The command enum is closed, so the exposed
//! API surface is exactly what `dispatch` matches.

mod api;

pub use api::{ApiRequest, ApiResponse, JobLine, PackageStatus};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::config::{self, HostConfig};
use crate::control::JobControl;
use crate::events::{Event, EventBus, EventKind};
use crate::jobs::{JobId, JobStore};
use crate::reconnect::run_reconnect;
use crate::registry::PluginRegistry;

/// Default path for the remote socket (same XDG state dir as the DB).
pub fn default_socket_path() -> Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("dlhost")?.get_state_home();
    Ok(dir.join("dlhost").join("remote.sock"))
}

pub struct RemoteBackend {
    store: JobStore,
    registry: Arc<PluginRegistry>,
    bus: Arc<EventBus>,
    control: Arc<JobControl>,
    config: Arc<Mutex<HostConfig>>,
    conn_seq: AtomicU64,
}

impl RemoteBackend {
    pub fn new(
        store: JobStore,
        registry: Arc<PluginRegistry>,
        bus: Arc<EventBus>,
        control: Arc<JobControl>,
        config: Arc<Mutex<HostConfig>>,
    ) -> Self {
        Self {
            store,
            registry,
            bus,
            control,
            config,
            conn_seq: AtomicU64::new(1),
        }
    }

    /// Handle one API request. `Subscribe` is handled by the connection loop
    /// (it needs the write half) and never reaches this point.
    pub async fn dispatch(&self, request: ApiRequest) -> ApiResponse {
        match request {
            ApiRequest::Version => ApiResponse::Version {
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            ApiRequest::Status => match self.status().await {
                Ok(packages) => ApiResponse::Status { packages },
                Err(e) => ApiResponse::error(format!("status: {e:#}")),
            },
            ApiRequest::AddLinks { package, urls } => {
                match self.add_links(&package, &urls).await {
                    Ok(resp) => resp,
                    Err(e) => ApiResponse::error(format!("add_links: {e:#}")),
                }
            }
            ApiRequest::Pause { job } | ApiRequest::Cancel { job } => {
                match self.stop_job(job).await {
                    Ok(true) => ApiResponse::Ok,
                    Ok(false) => ApiResponse::error(format!("job {job} is not active")),
                    Err(e) => ApiResponse::error(format!("cancel: {e:#}")),
                }
            }
            ApiRequest::DeletePackage { package } => {
                match self.store.delete_package(package, &self.bus).await {
                    Ok(true) => ApiResponse::Ok,
                    Ok(false) => ApiResponse::error(format!("no such package: {package}")),
                    Err(e) => ApiResponse::error(format!("delete: {e:#}")),
                }
            }
            ApiRequest::SetConfig { key, value } => self.set_config(&key, &value),
            ApiRequest::Reconnect => self.reconnect().await,
            ApiRequest::Subscribe => ApiResponse::Ok,
        }
    }

    async fn status(&self) -> Result<Vec<PackageStatus>> {
        let mut packages = Vec::new();
        for pkg in self.store.list_packages().await? {
            let jobs = self
                .store
                .package_jobs(pkg.id)
                .await?
                .into_iter()
                .map(|j| JobLine {
                    id: j.id,
                    url: j.url,
                    status: j.status.as_str().to_string(),
                    filename: j.filename,
                    error: j.error,
                })
                .collect();
            packages.push(PackageStatus {
                id: pkg.id,
                name: pkg.name,
                jobs,
            });
        }
        Ok(packages)
    }

    async fn add_links(&self, package: &str, urls: &[String]) -> Result<ApiResponse> {
        let pkg = self.store.create_package(package).await?;
        let added = self
            .store
            .add_links(pkg, urls, &self.registry, &self.bus)
            .await?;
        Ok(ApiResponse::Added {
            jobs: added.jobs,
            unsupported: added.unsupported,
        })
    }

    /// Abort a running job, or cancel it in the store when it is only queued.
    async fn stop_job(&self, job: JobId) -> Result<bool> {
        if self.control.request_abort(job) {
            return Ok(true);
        }
        Ok(self.store.mark_cancelled(job).await?)
    }

    fn set_config(&self, key: &str, value: &str) -> ApiResponse {
        let mut cfg = self.config.lock().unwrap();
        if let Err(e) = cfg.apply(key, value) {
            return ApiResponse::error(e.to_string());
        }
        if let Err(e) = config::save(&cfg) {
            tracing::warn!("config save failed: {:#}", e);
        }
        drop(cfg);
        self.bus.publish(&Event::ConfigChanged {
            key: key.to_string(),
            value: value.to_string(),
        });
        ApiResponse::Ok
    }

    async fn reconnect(&self) -> ApiResponse {
        let active = self.control.active_jobs();
        if active > 0 {
            return ApiResponse::error(format!("{active} download(s) active, not reconnecting"));
        }
        let script = self.config.lock().unwrap().reconnect_script.clone();
        let Some(script) = script else {
            return ApiResponse::error("no reconnect_script configured");
        };
        let bus = Arc::clone(&self.bus);
        let joined = tokio::task::spawn_blocking(move || run_reconnect(&script, &bus)).await;
        match joined {
            Ok(Ok(())) => ApiResponse::Ok,
            Ok(Err(e)) => ApiResponse::error(format!("reconnect: {e:#}")),
            Err(e) => ApiResponse::error(format!("reconnect task: {e}")),
        }
    }
}

/// Spawns a task that listens on `path` and serves connections until the
/// process exits.
pub fn spawn_listener(
    backend: Arc<RemoteBackend>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let handle = tokio::spawn(async move {
        let _ = std::fs::remove_file(&path);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let listener = match UnixListener::bind(&path) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %path.display(), "remote socket bind: {}", e);
                return;
            }
        };
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let backend = Arc::clone(&backend);
                    tokio::spawn(async move {
                        if let Err(e) = handle_conn(backend, stream).await {
                            tracing::debug!("remote connection ended: {:#}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("remote socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn handle_conn(backend: Arc<RemoteBackend>, stream: UnixStream) -> Result<()> {
    let conn_id = backend.conn_seq.fetch_add(1, Ordering::Relaxed);
    let owner = format!("remote#{conn_id}");
    let (read_half, mut write_half) = stream.into_split();

    // Everything written to the client (replies and pushed events) goes
    // through one channel so lines never interleave.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ApiRequest>(line) {
            Ok(ApiRequest::Subscribe) => {
                let tx_events = tx.clone();
                for kind in EventKind::ALL {
                    let tx_events = tx_events.clone();
                    backend.bus.subscribe(
                        kind,
                        &owner,
                        Arc::new(move |event| {
                            let json = serde_json::to_string(event)?;
                            // Receiver gone means the client disconnected.
                            let _ = tx_events.send(json);
                            Ok(())
                        }),
                    );
                }
                ApiResponse::Ok
            }
            Ok(request) => backend.dispatch(request).await,
            Err(e) => ApiResponse::error(format!("bad request: {e}")),
        };
        if tx.send(serde_json::to_string(&response)?).is_err() {
            break;
        }
    }

    backend.bus.unsubscribe_owner(&owner);
    drop(tx);
    let _ = writer.await;
    Ok(())
}

/// Client side: send one request and read one reply.
pub async fn send_request(socket: &Path, request: &ApiRequest) -> Result<ApiResponse> {
    let stream = UnixStream::connect(socket).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    write_half.write_all(line.as_bytes()).await?;

    let mut lines = BufReader::new(read_half).lines();
    let reply = lines
        .next_line()
        .await?
        .ok_or_else(|| anyhow::anyhow!("remote closed without reply"))?;
    Ok(serde_json::from_str(&reply)?)
}
