//! Integration tests: local HTTP server, executor and worker pool end to end.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use dlhost_core::accounts::{AccountApi, AccountInfo, AccountStore, AuthError};
use dlhost_core::control::JobControl;
use dlhost_core::events::{Event, EventBus, EventKind};
use dlhost_core::executor::{DownloadError, Executor};
use dlhost_core::jobs::{JobRecord, JobStatus, JobStore};
use dlhost_core::pool::WorkerPool;
use dlhost_core::registry::{PluginDescriptor, PluginKind, PluginRegistry};
use dlhost_core::retry::RetryPolicy;
use tempfile::tempdir;

use common::http_server::{self, ServerOptions};

/// Upstream seam handing out tokens from a fixed sequence (last one repeats).
struct SequenceApi {
    tokens: Vec<&'static str>,
    calls: AtomicUsize,
}

impl SequenceApi {
    fn new(tokens: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            tokens,
            calls: AtomicUsize::new(0),
        })
    }
}

impl AccountApi for SequenceApi {
    fn fetch_account_info(
        &self,
        _service: &str,
        _login: &str,
        _secret: &str,
    ) -> Result<AccountInfo, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let token = self.tokens[n.min(self.tokens.len() - 1)];
        Ok(AccountInfo {
            session: token.to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(3600),
            premium: true,
        })
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
    }
}

fn direct_http() -> PluginDescriptor {
    PluginDescriptor::new("DirectHttp", PluginKind::Hoster, r"https?://.+", "0.1").unwrap()
}

fn test_job(url: &str) -> JobRecord {
    JobRecord {
        id: 1,
        package_id: 1,
        url: url.to_string(),
        plugin: "DirectHttp".to_string(),
        filename: None,
        status: JobStatus::Running,
        retry_count: 0,
        error: None,
        created_at: 0,
        updated_at: 0,
    }
}

fn executor_at(dir: &std::path::Path, api: Arc<dyn AccountApi>) -> (Executor, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new());
    let accounts = Arc::new(AccountStore::new(api));
    let executor = Executor::new(
        accounts,
        Arc::clone(&bus),
        fast_policy(),
        dir.to_path_buf(),
    );
    (executor, bus)
}

fn executor_with_accounts(
    dir: &std::path::Path,
    api: Arc<dyn AccountApi>,
    service: &str,
) -> (Executor, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new());
    let accounts = Arc::new(AccountStore::new(api));
    accounts.set_account(service, "alice", "secret");
    let executor = Executor::new(
        accounts,
        Arc::clone(&bus),
        fast_policy(),
        dir.to_path_buf(),
    );
    (executor, bus)
}

fn no_abort() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

#[test]
fn free_download_writes_url_named_file() {
    let body = b"hello world".to_vec();
    let server = http_server::start(body.clone(), ServerOptions::default());
    let url = format!("{}file/report.bin", server.base_url);

    let dir = tempdir().unwrap();
    let (executor, _bus) = executor_at(dir.path(), SequenceApi::new(vec!["unused"]));

    let transfer = executor
        .execute(&test_job(&url), &direct_http(), &no_abort())
        .expect("download");

    assert_eq!(transfer.filename, "report.bin");
    assert_eq!(transfer.bytes_written, body.len() as u64);
    let content = std::fs::read(dir.path().join("report.bin")).unwrap();
    assert_eq!(content, body);
    assert!(!dir.path().join("job-1.part").exists());
}

#[test]
fn content_disposition_overrides_url_name() {
    let server = http_server::start(
        b"pdf bytes".to_vec(),
        ServerOptions {
            content_disposition: Some("attachment; filename=\"report.pdf\"".to_string()),
            ..Default::default()
        },
    );
    let url = format!("{}file/download.bin", server.base_url);

    let dir = tempdir().unwrap();
    let (executor, _bus) = executor_at(dir.path(), SequenceApi::new(vec!["unused"]));

    let transfer = executor
        .execute(&test_job(&url), &direct_http(), &no_abort())
        .expect("download");

    assert_eq!(transfer.filename, "report.pdf");
    assert!(dir.path().join("report.pdf").exists());
    assert!(!dir.path().join("download.bin").exists());
}

#[test]
fn disposition_disabled_keeps_url_name() {
    let server = http_server::start(
        b"data".to_vec(),
        ServerOptions {
            content_disposition: Some("attachment; filename=\"other.name\"".to_string()),
            ..Default::default()
        },
    );
    let url = format!("{}file/keep.bin", server.base_url);

    let dir = tempdir().unwrap();
    let (executor, _bus) = executor_at(dir.path(), SequenceApi::new(vec!["unused"]));

    let descriptor = direct_http().without_disposition();
    let transfer = executor
        .execute(&test_job(&url), &descriptor, &no_abort())
        .expect("download");

    assert_eq!(transfer.filename, "keep.bin");
}

#[test]
fn throttled_response_is_retried_then_succeeds() {
    let body = b"finally".to_vec();
    let server = http_server::start(
        body.clone(),
        ServerOptions {
            fail_first: 1,
            ..Default::default()
        },
    );
    let url = format!("{}file/slow.bin", server.base_url);

    let dir = tempdir().unwrap();
    let (executor, _bus) = executor_at(dir.path(), SequenceApi::new(vec!["unused"]));

    let transfer = executor
        .execute(&test_job(&url), &direct_http(), &no_abort())
        .expect("download after retry");

    assert_eq!(transfer.filename, "slow.bin");
    assert_eq!(server.requests(), 2);
}

#[test]
fn premium_download_goes_through_processing_endpoint() {
    let body = b"premium bytes".to_vec();
    let server = http_server::start(
        body.clone(),
        ServerOptions {
            premium_token: Some("gold".to_string()),
            ..Default::default()
        },
    );
    let url = format!("{}file/payload.bin", server.base_url);

    let dir = tempdir().unwrap();
    let api = SequenceApi::new(vec!["gold"]);
    let (executor, _bus) = executor_with_accounts(dir.path(), Arc::clone(&api) as _, "TestHost");

    let descriptor = PluginDescriptor::new("TestHost", PluginKind::Hoster, r"https?://.+", "0.1")
        .unwrap()
        .with_premium(&format!("{}process_download.php", server.base_url));

    let transfer = executor
        .execute(&test_job(&url), &descriptor, &no_abort())
        .expect("premium download");

    assert_eq!(transfer.filename, "payload.bin");
    assert_eq!(server.premium_hits(), 1);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn account_stored_under_service_host_reaches_premium_path() {
    let body = b"premium via service key".to_vec();
    let server = http_server::start(
        body.clone(),
        ServerOptions {
            premium_token: Some("gold".to_string()),
            ..Default::default()
        },
    );
    let url = format!("{}file/payload.bin", server.base_url);

    let dir = tempdir().unwrap();
    let api = SequenceApi::new(vec!["gold"]);
    // The account lives under the service host, not the plugin name, the
    // same way `account add` stores it.
    let (executor, _bus) =
        executor_with_accounts(dir.path(), Arc::clone(&api) as _, "rehost.to");

    let descriptor = PluginDescriptor::new("RehostTo", PluginKind::Hoster, r"https?://.+", "0.17")
        .unwrap()
        .with_service("rehost.to")
        .with_premium(&format!("{}process_download.php", server.base_url));

    let transfer = executor
        .execute(&test_job(&url), &descriptor, &no_abort())
        .expect("premium download keyed by service host");

    assert_eq!(transfer.bytes_written, body.len() as u64);
    assert_eq!(server.premium_hits(), 1);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_session_is_refreshed_once_then_succeeds() {
    let body = b"after refresh".to_vec();
    let server = http_server::start(
        body.clone(),
        ServerOptions {
            premium_token: Some("gold".to_string()),
            ..Default::default()
        },
    );
    let url = format!("{}file/f.bin", server.base_url);

    let dir = tempdir().unwrap();
    let api = SequenceApi::new(vec!["stale", "gold"]);
    let (executor, _bus) = executor_with_accounts(dir.path(), Arc::clone(&api) as _, "TestHost");

    let descriptor = PluginDescriptor::new("TestHost", PluginKind::Hoster, r"https?://.+", "0.1")
        .unwrap()
        .with_premium(&format!("{}process_download.php", server.base_url));

    let transfer = executor
        .execute(&test_job(&url), &descriptor, &no_abort())
        .expect("download after one forced refresh");

    assert_eq!(transfer.bytes_written, body.len() as u64);
    assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    assert_eq!(server.premium_hits(), 1);
}

#[test]
fn unrefreshable_session_surfaces_auth_error() {
    let server = http_server::start(
        b"never served".to_vec(),
        ServerOptions {
            premium_token: Some("gold".to_string()),
            ..Default::default()
        },
    );
    let url = format!("{}file/f.bin", server.base_url);

    let dir = tempdir().unwrap();
    let api = SequenceApi::new(vec!["stale"]);
    let (executor, _bus) = executor_with_accounts(dir.path(), Arc::clone(&api) as _, "TestHost");

    let descriptor = PluginDescriptor::new("TestHost", PluginKind::Hoster, r"https?://.+", "0.1")
        .unwrap()
        .with_premium(&format!("{}process_download.php", server.base_url));

    let err = executor
        .execute(&test_job(&url), &descriptor, &no_abort())
        .unwrap_err();

    assert!(matches!(err, DownloadError::Auth(_)), "got {err:?}");
    // One refresh was forced, then the rejection is terminal.
    assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    assert_eq!(server.premium_hits(), 0);
}

#[test]
fn anonymous_rejection_is_a_network_error() {
    let server = http_server::start(
        b"never served".to_vec(),
        ServerOptions {
            premium_token: Some("gold".to_string()),
            ..Default::default()
        },
    );
    // A free download hitting a 401/403 has no session to refresh.
    let url = format!("{}process_download.php", server.base_url);

    let dir = tempdir().unwrap();
    let (executor, _bus) = executor_at(dir.path(), SequenceApi::new(vec!["unused"]));

    let err = executor
        .execute(&test_job(&url), &direct_http(), &no_abort())
        .unwrap_err();

    assert!(matches!(err, DownloadError::Network(_)), "got {err:?}");
    assert_eq!(server.requests(), 1);
    assert_eq!(server.premium_hits(), 0);
}

#[test]
fn pre_set_abort_cancels_before_any_request() {
    let server = http_server::start(b"body".to_vec(), ServerOptions::default());
    let url = format!("{}file/f.bin", server.base_url);

    let dir = tempdir().unwrap();
    let (executor, _bus) = executor_at(dir.path(), SequenceApi::new(vec!["unused"]));

    let abort = Arc::new(AtomicBool::new(true));
    let err = executor
        .execute(&test_job(&url), &direct_http(), &abort)
        .unwrap_err();
    assert!(matches!(err, DownloadError::Cancelled));
    assert_eq!(server.requests(), 0);
}

#[test]
fn events_fire_start_then_finished() {
    let server = http_server::start(b"ok".to_vec(), ServerOptions::default());
    let url = format!("{}file/e.bin", server.base_url);

    let dir = tempdir().unwrap();
    let (executor, bus) = executor_at(dir.path(), SequenceApi::new(vec!["unused"]));

    let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::DownloadStart,
        EventKind::DownloadFinished,
        EventKind::DownloadFailed,
    ] {
        let seen = Arc::clone(&seen);
        bus.subscribe(
            kind,
            "test",
            Arc::new(move |event: &Event| {
                seen.lock().unwrap().push(event.kind().as_str());
                Ok(())
            }),
        );
    }

    executor
        .execute(&test_job(&url), &direct_http(), &no_abort())
        .expect("download");

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["download_start", "download_finished"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pool_drains_queue_and_announces_package() {
    let body = b"pool body".to_vec();
    let server = http_server::start(body.clone(), ServerOptions::default());

    let store = JobStore::open_memory().await.unwrap();
    let registry = Arc::new(PluginRegistry::new());
    registry.register(direct_http());
    let bus = Arc::new(EventBus::new());

    let processed = Arc::new(AtomicUsize::new(0));
    let drained = Arc::new(AtomicUsize::new(0));
    {
        let processed = Arc::clone(&processed);
        bus.subscribe(
            EventKind::PackageProcessed,
            "test",
            Arc::new(move |_| {
                processed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        let drained = Arc::clone(&drained);
        bus.subscribe(
            EventKind::AllDownloadsProcessed,
            "test",
            Arc::new(move |_| {
                drained.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
    }

    let pkg = store.create_package("iso set").await.unwrap();
    let urls = vec![
        format!("{}file/a.bin", server.base_url),
        format!("{}file/b.bin", server.base_url),
    ];
    let added = store.add_links(pkg, &urls, &registry, &bus).await.unwrap();
    assert_eq!(added.jobs.len(), 2);

    let dir = tempdir().unwrap();
    let accounts = Arc::new(AccountStore::new(SequenceApi::new(vec!["unused"])));
    let executor = Arc::new(Executor::new(
        accounts,
        Arc::clone(&bus),
        fast_policy(),
        dir.path().to_path_buf(),
    ));
    let pool = WorkerPool::new(
        store.clone(),
        registry,
        executor,
        Arc::new(JobControl::new()),
        Arc::clone(&bus),
    );

    let run_count = pool.run(2).await.unwrap();
    assert_eq!(run_count, 2);

    for job in store.package_jobs(pkg).await.unwrap() {
        assert_eq!(job.status, JobStatus::Finished);
        assert!(job.filename.is_some());
    }
    assert!(dir.path().join("a.bin").exists());
    assert!(dir.path().join("b.bin").exists());
    assert_eq!(processed.load(Ordering::SeqCst), 1);
    assert_eq!(drained.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pool_keeps_draining_past_a_failing_job() {
    let server = http_server::start(b"still served".to_vec(), ServerOptions::default());

    let store = JobStore::open_memory().await.unwrap();
    let bus = Arc::new(EventBus::new());

    // The links resolve against a registry that still knows GhostHost...
    let full = Arc::new(PluginRegistry::new());
    full.register(
        PluginDescriptor::new(
            "GhostHost",
            PluginKind::Hoster,
            r"https?://ghost\.example/.+",
            "0.1",
        )
        .unwrap(),
    );
    full.register(direct_http());

    let pkg = store.create_package("mixed").await.unwrap();
    let urls = vec![
        "https://ghost.example/gone.bin".to_string(),
        format!("{}file/kept.bin", server.base_url),
    ];
    let added = store.add_links(pkg, &urls, &full, &bus).await.unwrap();
    assert_eq!(added.jobs.len(), 2);

    // ...but the pool runs without it, so the first job fails outright.
    let registry = Arc::new(PluginRegistry::new());
    registry.register(direct_http());

    let dir = tempdir().unwrap();
    let accounts = Arc::new(AccountStore::new(SequenceApi::new(vec!["unused"])));
    let executor = Arc::new(Executor::new(
        accounts,
        Arc::clone(&bus),
        fast_policy(),
        dir.path().to_path_buf(),
    ));
    let pool = WorkerPool::new(
        store.clone(),
        registry,
        executor,
        Arc::new(JobControl::new()),
        Arc::clone(&bus),
    );

    assert_eq!(pool.run(1).await.unwrap(), 2);

    let jobs = store.package_jobs(pkg).await.unwrap();
    let failed = jobs.iter().filter(|j| j.status == JobStatus::Failed).count();
    let finished = jobs.iter().filter(|j| j.status == JobStatus::Finished).count();
    assert_eq!((failed, finished), (1, 1));
    assert!(dir.path().join("kept.bin").exists());
}
