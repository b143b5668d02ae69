//! Offline request queue persisted in SQLite.
//!
//! Requests that could not be delivered are stored in a durable table
//! (`offline_queue`) and replayed by the sync worker once the backend is
//! reachable again. The queue is bounded: inserting into a full queue evicts
//! the oldest entries in the same transaction.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use needlelog_core::{BackendRequest, EntryId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

pub use crate::types::{CorruptEntry, Enqueued, QueueScan, QueuedRequest};

/// Default bound on the number of queued requests.
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-backed offline queue.
///
/// This struct is cheap to clone and is safe to share across tasks; clones
/// share one connection pool.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    pool: Arc<tokio::sync::Mutex<Option<SqlitePool>>>,
    location: Location,
    capacity: usize,
}

impl OfflineQueue {
    /// Queue stored in the given SQLite file (created on first use).
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self::with_location(Location::File(path.into()), capacity)
    }

    /// Queue stored in the OS data directory: `{data_dir}/needlelog/offline.db`.
    pub fn open_default(capacity: usize) -> anyhow::Result<Self> {
        Ok(Self::open(default_queue_path()?, capacity))
    }

    /// Queue held in a private in-memory database.
    pub fn in_memory(capacity: usize) -> Self {
        Self::with_location(Location::Memory, capacity)
    }

    fn with_location(location: Location, capacity: usize) -> Self {
        Self {
            pool: Arc::new(tokio::sync::Mutex::new(None)),
            location,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Get the pool, initializing it on first use.
    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        let mut pool_guard = self.pool.lock().await;
        if let Some(pool) = pool_guard.as_ref() {
            return Ok(pool.clone());
        }

        let pool = match &self.location {
            Location::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create offline queue directory at {:?}", parent)
                    })?;
                }
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .busy_timeout(Duration::from_secs(5));
                SqlitePoolOptions::new()
                    .max_connections(4)
                    .connect_with(options)
                    .await
                    .with_context(|| format!("failed to open offline queue at {:?}", path))?
            }
            // A private in-memory database lives as long as its single connection.
            Location::Memory => {
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .context("invalid in-memory SQLite URL")?;
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await
                    .context("failed to open in-memory offline queue")?
            }
        };

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS offline_queue (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL,
                endpoint    TEXT NOT NULL,
                action      TEXT NOT NULL,
                payload     TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create offline_queue table")?;

        *pool_guard = Some(pool.clone());
        Ok(pool)
    }

    /// Append a request, evicting the oldest entries if the queue is full.
    pub async fn enqueue(&self, endpoint: &str, request: &BackendRequest) -> anyhow::Result<Enqueued> {
        let pool = self.get_pool().await?;

        let entry = QueuedRequest {
            id: EntryId::new(),
            created_at: Utc::now(),
            endpoint: endpoint.to_string(),
            request: request.clone(),
        };
        let payload = serde_json::to_string(&entry.request).context("failed to encode queued request")?;

        let mut tx = pool.begin().await.context("failed to begin enqueue transaction")?;

        // Insert first so the transaction holds the write lock before it reads.
        sqlx::query(
            r#"
            INSERT INTO offline_queue (id, created_at, endpoint, action, payload)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.created_at.to_rfc3339())
        .bind(&entry.endpoint)
        .bind(entry.action().as_str())
        .bind(payload)
        .execute(&mut *tx)
        .await
        .context("failed to insert queued request")?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offline_queue")
            .fetch_one(&mut *tx)
            .await
            .context("failed to count queued requests")?;

        let overflow = count - self.capacity as i64;
        let mut evicted = Vec::new();
        if overflow > 0 {
            let rows = sqlx::query("SELECT id FROM offline_queue ORDER BY seq ASC LIMIT ?1")
                .bind(overflow)
                .fetch_all(&mut *tx)
                .await
                .context("failed to select entries to evict")?;
            for row in rows {
                let id: String = row.try_get("id")?;
                evicted.push(id.parse::<EntryId>().context("invalid id in offline_queue")?);
            }

            sqlx::query(
                r#"
                DELETE FROM offline_queue
                WHERE seq IN (SELECT seq FROM offline_queue ORDER BY seq ASC LIMIT ?1)
                "#,
            )
            .bind(overflow)
            .execute(&mut *tx)
            .await
            .context("failed to evict oldest queued requests")?;
        }

        tx.commit().await.context("failed to commit enqueue transaction")?;

        if !evicted.is_empty() {
            tracing::warn!(
                evicted = evicted.len(),
                capacity = self.capacity,
                "offline queue full; dropped oldest entries"
            );
        }
        tracing::info!(id = %entry.id, action = %entry.action(), "request queued for later delivery");

        Ok(Enqueued { entry, evicted })
    }

    /// All queued requests that decode, oldest first.
    ///
    /// Undecodable rows are skipped; [`OfflineQueue::scan`] reports them.
    pub async fn list(&self) -> anyhow::Result<Vec<QueuedRequest>> {
        Ok(self.scan().await?.entries)
    }

    /// Read every row, decoding each one on its own so a corrupt row does not
    /// hide the rest of the queue.
    pub async fn scan(&self) -> anyhow::Result<QueueScan> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, created_at, endpoint, payload
            FROM offline_queue
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&pool)
        .await
        .context("failed to list queued requests")?;

        let mut scan = QueueScan::default();
        for row in rows {
            let raw_id: String = row.try_get("id").unwrap_or_default();
            match row_to_request(row) {
                Ok(entry) => scan.entries.push(entry),
                Err(err) => {
                    tracing::warn!(id = %raw_id, error = %format!("{err:#}"), "skipping undecodable queue entry");
                    scan.corrupt.push(CorruptEntry {
                        id: raw_id,
                        error: format!("{err:#}"),
                    });
                }
            }
        }
        Ok(scan)
    }

    pub async fn get(&self, id: EntryId) -> anyhow::Result<Option<QueuedRequest>> {
        let pool = self.get_pool().await?;
        let row = sqlx::query("SELECT id, created_at, endpoint, payload FROM offline_queue WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&pool)
            .await
            .context("failed to load queued request")?;

        row.map(row_to_request).transpose()
    }

    /// Delete an entry. Removing an id that is not queued is not an error;
    /// the return value says whether anything was deleted.
    pub async fn remove(&self, id: EntryId) -> anyhow::Result<bool> {
        let pool = self.get_pool().await?;
        let done = sqlx::query("DELETE FROM offline_queue WHERE id = ?1")
            .bind(id.to_string())
            .execute(&pool)
            .await
            .context("failed to remove queued request")?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn len(&self) -> anyhow::Result<usize> {
        let pool = self.get_pool().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offline_queue")
            .fetch_one(&pool)
            .await
            .context("failed to count queued requests")?;
        Ok(count as usize)
    }

    pub async fn is_empty(&self) -> anyhow::Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Drop every queued request. Returns how many were removed.
    pub async fn clear(&self) -> anyhow::Result<usize> {
        let pool = self.get_pool().await?;
        let done = sqlx::query("DELETE FROM offline_queue")
            .execute(&pool)
            .await
            .context("failed to clear offline queue")?;
        Ok(done.rows_affected() as usize)
    }
}

/// Map a database row into a `QueuedRequest`.
fn row_to_request(row: SqliteRow) -> anyhow::Result<QueuedRequest> {
    let id_str: String = row.try_get("id")?;
    let id = id_str
        .parse::<EntryId>()
        .context("invalid id in offline_queue")?;

    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .context("invalid created_at in offline_queue")?;

    let endpoint: String = row.try_get("endpoint")?;

    let payload: String = row.try_get("payload")?;
    let request: BackendRequest =
        serde_json::from_str(&payload).context("invalid request payload in offline_queue")?;

    Ok(QueuedRequest {
        id,
        created_at,
        endpoint,
        request,
    })
}

/// Resolve the default queue file: `{data_dir}/needlelog/offline.db`.
pub fn default_queue_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut path = base;
    path.push("needlelog");
    path.push("offline.db");
    Ok(path)
}

/// Insert a row with an arbitrary payload, bypassing encoding.
#[cfg(test)]
pub(crate) async fn insert_raw(queue: &OfflineQueue, endpoint: &str, payload: &str) -> anyhow::Result<String> {
    let pool = queue.get_pool().await?;
    let id = EntryId::new().to_string();
    sqlx::query(
        "INSERT INTO offline_queue (id, created_at, endpoint, action, payload) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&id)
    .bind(Utc::now().to_rfc3339())
    .bind(endpoint)
    .bind("submitEntry")
    .bind(payload)
    .execute(&pool)
    .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use needlelog_core::{Field, IncidentRecord};

    const ENDPOINT: &str = "http://backend.test/api/submit";

    fn entry(department: &str) -> BackendRequest {
        BackendRequest::submit_entry(
            IncidentRecord::builder()
                .field(Field::Department, department)
                .field(Field::Date, "2024-05-01")
                .build(),
        )
    }

    fn department(req: &QueuedRequest) -> String {
        match &req.request {
            BackendRequest::SubmitEntry { data } => data.get(Field::Department).to_string(),
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[tokio::test]
    async fn lists_in_insertion_order() {
        let queue = OfflineQueue::in_memory(DEFAULT_CAPACITY);
        for name in ["a", "b", "c"] {
            queue.enqueue(ENDPOINT, &entry(name)).await.unwrap();
        }

        let listed = queue.list().await.unwrap();
        let names: Vec<String> = listed.iter().map(department).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(listed.iter().all(|e| e.endpoint == ENDPOINT));
    }

    #[tokio::test]
    async fn full_queue_evicts_the_oldest() {
        let queue = OfflineQueue::in_memory(3);
        let first = queue.enqueue(ENDPOINT, &entry("a")).await.unwrap();
        queue.enqueue(ENDPOINT, &entry("b")).await.unwrap();
        queue.enqueue(ENDPOINT, &entry("c")).await.unwrap();

        let fourth = queue.enqueue(ENDPOINT, &entry("d")).await.unwrap();

        assert_eq!(fourth.evicted, vec![first.entry.id]);
        assert_eq!(queue.len().await.unwrap(), 3);
        let names: Vec<String> = queue.list().await.unwrap().iter().map(department).collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let queue = OfflineQueue::in_memory(DEFAULT_CAPACITY);
        let queued = queue.enqueue(ENDPOINT, &entry("a")).await.unwrap();

        assert!(queue.remove(queued.entry.id).await.unwrap());
        assert!(!queue.remove(queued.entry.id).await.unwrap());
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn get_round_trips_every_request_kind() {
        let queue = OfflineQueue::in_memory(DEFAULT_CAPACITY);
        let upload = BackendRequest::UploadImage {
            file_name: "needle_break_1_photo.png".into(),
            file_data: "aGVsbG8=".into(),
            mime_type: "image/png".into(),
        };
        let queued = queue.enqueue(ENDPOINT, &upload).await.unwrap();

        let loaded = queue.get(queued.entry.id).await.unwrap().unwrap();
        assert_eq!(loaded.request, upload);
        assert!(queue.get(EntryId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_empties_the_queue() {
        let queue = OfflineQueue::in_memory(DEFAULT_CAPACITY);
        queue.enqueue(ENDPOINT, &entry("a")).await.unwrap();
        queue.enqueue(ENDPOINT, &entry("b")).await.unwrap();

        assert_eq!(queue.clear().await.unwrap(), 2);
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn entries_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("offline.db");

        {
            let queue = OfflineQueue::open(&path, DEFAULT_CAPACITY);
            queue.enqueue(ENDPOINT, &entry("kept")).await.unwrap();
        }

        let reopened = OfflineQueue::open(&path, DEFAULT_CAPACITY);
        let listed = reopened.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(department(&listed[0]), "kept");
        assert_eq!(reopened.path(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let queue = OfflineQueue::in_memory(DEFAULT_CAPACITY);
        let other = queue.clone();
        queue.enqueue(ENDPOINT, &entry("shared")).await.unwrap();
        assert_eq!(other.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn corrupt_rows_do_not_hide_the_rest() {
        let queue = OfflineQueue::in_memory(DEFAULT_CAPACITY);
        queue.enqueue(ENDPOINT, &entry("first")).await.unwrap();
        let bad = insert_raw(&queue, ENDPOINT, r#"{"action":"submitEntry","data":[1,[2]]}"#)
            .await
            .unwrap();
        queue.enqueue(ENDPOINT, &entry("last")).await.unwrap();

        let scan = queue.scan().await.unwrap();
        let names: Vec<_> = scan.entries.iter().map(department).collect();
        assert_eq!(names, ["first", "last"]);
        assert_eq!(scan.corrupt.len(), 1);
        assert_eq!(scan.corrupt[0].id, bad);

        assert_eq!(queue.list().await.unwrap().len(), 2);
        assert_eq!(queue.len().await.unwrap(), 3);
    }
}
