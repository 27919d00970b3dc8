//! Package/job CRUD and status transitions.

use anyhow::Result;
use sqlx::Row;

use crate::events::{Event, EventBus};
use crate::registry::PluginRegistry;

use super::db::{unix_timestamp, JobStore};
use super::types::{AddedLinks, JobId, JobRecord, JobStatus, PackageId, PackageRecord};

fn job_from_row(row: &sqlx::sqlite::SqliteRow) -> JobRecord {
    let status: String = row.get("status");
    JobRecord {
        id: row.get("id"),
        package_id: row.get("package_id"),
        url: row.get("url"),
        plugin: row.get("plugin"),
        filename: row.get("filename"),
        status: JobStatus::from_str(&status),
        retry_count: row.get("retry_count"),
        error: row.get("error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl JobStore {
    /// Create a new package and return its id.
    pub async fn create_package(&self, name: &str) -> Result<PackageId> {
        let row = sqlx::query("INSERT INTO packages (name, created_at) VALUES (?1, ?2) RETURNING id")
            .bind(name)
            .bind(unix_timestamp())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("id"))
    }

    /// Add links to a package. Each URL is resolved through the registry; a
    /// URL no plugin matches is recorded as unsupported and **no job row is
    /// created** for it. Publishes `links_added` when at least one job was
    /// created.
    pub async fn add_links(
        &self,
        package: PackageId,
        urls: &[String],
        registry: &PluginRegistry,
        bus: &EventBus,
    ) -> Result<AddedLinks> {
        let mut added = AddedLinks::default();
        let now = unix_timestamp();

        for url in urls {
            let descriptor = match registry.resolve(url) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(%url, "skipping link: {}", e);
                    added.unsupported.push(url.clone());
                    continue;
                }
            };
            let row = sqlx::query(
                r#"
                INSERT INTO jobs (package_id, url, plugin, status, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                RETURNING id
                "#,
            )
            .bind(package)
            .bind(url)
            .bind(&descriptor.name)
            .bind(JobStatus::Queued.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
            added.jobs.push(row.get("id"));
        }

        if !added.jobs.is_empty() {
            bus.publish(&Event::LinksAdded {
                package,
                count: added.jobs.len(),
            });
        }
        Ok(added)
    }

    /// Fetch one job by id.
    pub async fn job(&self, id: JobId) -> Result<Option<JobRecord>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(job_from_row))
    }

    /// List all jobs, oldest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(job_from_row).collect())
    }

    /// Jobs belonging to one package, oldest first.
    pub async fn package_jobs(&self, package: PackageId) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query("SELECT * FROM jobs WHERE package_id = ?1 ORDER BY id ASC")
            .bind(package)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(job_from_row).collect())
    }

    /// List all packages, oldest first.
    pub async fn list_packages(&self) -> Result<Vec<PackageRecord>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM packages ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| PackageRecord {
                id: row.get("id"),
                name: row.get("name"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Atomically claim the next queued job (smallest id) by marking it
    /// running. Multiple workers never claim the same job.
    pub async fn claim_next_queued(&self) -> Result<Option<JobRecord>> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT * FROM jobs WHERE status = 'queued' ORDER BY id ASC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let mut job = job_from_row(&row);
        sqlx::query("UPDATE jobs SET status = 'running', updated_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(job.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        job.status = JobStatus::Running;
        Ok(Some(job))
    }

    /// Reset stranded running jobs (e.g. after a crash) back to queued.
    pub async fn recover_running_jobs(&self) -> Result<u64> {
        let res = sqlx::query(
            "UPDATE jobs SET status = 'queued', updated_at = ?1 WHERE status = 'running'",
        )
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    /// Record a finished transfer with its final filename.
    pub async fn mark_finished(&self, id: JobId, filename: &str) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'finished', filename = ?1, error = NULL, updated_at = ?2 WHERE id = ?3",
        )
        .bind(filename)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a terminal failure with a user-visible reason and the number of
    /// attempts that were made.
    pub async fn mark_failed(&self, id: JobId, reason: &str, attempts: u32) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'failed', error = ?1, retry_count = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(reason)
        .bind(attempts as i64)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a job cancelled. Only non-terminal jobs transition.
    pub async fn mark_cancelled(&self, id: JobId) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE jobs SET status = 'cancelled', updated_at = ?1 WHERE id = ?2 AND status IN ('queued', 'running')",
        )
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Delete a package and all its jobs. Publishes `package_deleted` when
    /// the package existed.
    pub async fn delete_package(&self, package: PackageId, bus: &EventBus) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM jobs WHERE package_id = ?1")
            .bind(package)
            .execute(&mut *tx)
            .await?;
        let res = sqlx::query("DELETE FROM packages WHERE id = ?1")
            .bind(package)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let existed = res.rows_affected() > 0;
        if existed {
            bus.publish(&Event::PackageDeleted { package });
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{PluginDescriptor, PluginKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn rehost_registry() -> PluginRegistry {
        let reg = PluginRegistry::new();
        reg.register(
            PluginDescriptor::new(
                "RehostTo",
                PluginKind::Hoster,
                r"https?://(?:www\.)?rehost\.to/.+",
                "0.17",
            )
            .unwrap(),
        );
        reg
    }

    #[tokio::test]
    async fn unmatched_urls_create_no_job_rows() {
        let store = JobStore::open_memory().await.unwrap();
        let reg = rehost_registry();
        let bus = EventBus::new();

        let pkg = store.create_package("mixed").await.unwrap();
        let urls = vec![
            "http://rehost.to/file/1".to_string(),
            "http://unknown.example/file/2".to_string(),
        ];
        let added = store.add_links(pkg, &urls, &reg, &bus).await.unwrap();

        assert_eq!(added.jobs.len(), 1);
        assert_eq!(added.unsupported, vec!["http://unknown.example/file/2"]);
        assert_eq!(store.list_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn links_added_event_fires_once_per_batch() {
        let store = JobStore::open_memory().await.unwrap();
        let reg = rehost_registry();
        let bus = EventBus::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);
        bus.subscribe(
            crate::events::EventKind::LinksAdded,
            "test",
            Arc::new(move |ev| {
                if let Event::LinksAdded { count, .. } = ev {
                    fired2.fetch_add(*count, Ordering::SeqCst);
                }
                Ok(())
            }),
        );

        let pkg = store.create_package("batch").await.unwrap();
        let urls = vec![
            "http://rehost.to/a".to_string(),
            "http://rehost.to/b".to_string(),
        ];
        store.add_links(pkg, &urls, &reg, &bus).await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn claim_is_fifo_and_exclusive() {
        let store = JobStore::open_memory().await.unwrap();
        let reg = rehost_registry();
        let bus = EventBus::new();
        let pkg = store.create_package("p").await.unwrap();
        let urls = vec![
            "http://rehost.to/a".to_string(),
            "http://rehost.to/b".to_string(),
        ];
        store.add_links(pkg, &urls, &reg, &bus).await.unwrap();

        let first = store.claim_next_queued().await.unwrap().unwrap();
        let second = store.claim_next_queued().await.unwrap().unwrap();
        assert!(first.id < second.id);
        assert_eq!(first.status, JobStatus::Running);
        assert!(store.claim_next_queued().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn status_transitions_are_recorded() {
        let store = JobStore::open_memory().await.unwrap();
        let reg = rehost_registry();
        let bus = EventBus::new();
        let pkg = store.create_package("p").await.unwrap();
        let added = store
            .add_links(pkg, &["http://rehost.to/x".to_string()], &reg, &bus)
            .await
            .unwrap();
        let id = added.jobs[0];

        store.mark_failed(id, "network: connection reset", 3).await.unwrap();
        let job = store.job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 3);
        assert_eq!(job.error.as_deref(), Some("network: connection reset"));

        store.mark_finished(id, "report.pdf").await.unwrap();
        let job = store.job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Finished);
        assert_eq!(job.filename.as_deref(), Some("report.pdf"));
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn cancel_only_touches_non_terminal_jobs() {
        let store = JobStore::open_memory().await.unwrap();
        let reg = rehost_registry();
        let bus = EventBus::new();
        let pkg = store.create_package("p").await.unwrap();
        let added = store
            .add_links(pkg, &["http://rehost.to/x".to_string()], &reg, &bus)
            .await
            .unwrap();
        let id = added.jobs[0];

        assert!(store.mark_cancelled(id).await.unwrap());
        assert!(!store.mark_cancelled(id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_package_removes_jobs_and_publishes() {
        let store = JobStore::open_memory().await.unwrap();
        let reg = rehost_registry();
        let bus = EventBus::new();
        let deleted = Arc::new(AtomicUsize::new(0));
        let deleted2 = Arc::clone(&deleted);
        bus.subscribe(
            crate::events::EventKind::PackageDeleted,
            "test",
            Arc::new(move |_| {
                deleted2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let pkg = store.create_package("p").await.unwrap();
        store
            .add_links(pkg, &["http://rehost.to/x".to_string()], &reg, &bus)
            .await
            .unwrap();

        assert!(store.delete_package(pkg, &bus).await.unwrap());
        assert!(store.list_jobs().await.unwrap().is_empty());
        assert_eq!(deleted.load(Ordering::SeqCst), 1);
        assert!(!store.delete_package(pkg, &bus).await.unwrap());
    }

    #[tokio::test]
    async fn recover_requeues_stranded_running_jobs() {
        let store = JobStore::open_memory().await.unwrap();
        let reg = rehost_registry();
        let bus = EventBus::new();
        let pkg = store.create_package("p").await.unwrap();
        store
            .add_links(pkg, &["http://rehost.to/x".to_string()], &reg, &bus)
            .await
            .unwrap();

        store.claim_next_queued().await.unwrap().unwrap();
        assert_eq!(store.recover_running_jobs().await.unwrap(), 1);
        assert!(store.claim_next_queued().await.unwrap().is_some());
    }
}
