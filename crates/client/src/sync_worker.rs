//! Background worker that replays the offline queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, Notify};

use crate::offline::OfflineMode;
use crate::offline_queue::OfflineQueue;
use crate::request_client::RequestClient;
use crate::types::{ConnectivityState, SyncEvent, SyncReport};

/// Default interval between connectivity probes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Drains the offline queue through the request client.
///
/// Cheap to clone; clones drive the same queue, lock and event channel.
#[derive(Debug, Clone)]
pub struct SyncWorker {
    client: Arc<RequestClient>,
    queue: OfflineQueue,
    connectivity: Arc<Mutex<OfflineMode>>,
    events: broadcast::Sender<SyncEvent>,
    drain_lock: Arc<Mutex<()>>,
    wake: Arc<Notify>,
    shutdown: Arc<Notify>,
    interval: Duration,
}

impl SyncWorker {
    pub fn new(client: Arc<RequestClient>, queue: OfflineQueue) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            client,
            queue,
            connectivity: Arc::new(Mutex::new(OfflineMode::new())),
            events,
            drain_lock: Arc::new(Mutex::new(())),
            wake: Arc::new(Notify::new()),
            shutdown: Arc::new(Notify::new()),
            interval: DEFAULT_SYNC_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Subscribe to sync events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub async fn connectivity(&self) -> ConnectivityState {
        self.connectivity.lock().await.state()
    }

    /// Replay every queued request once, oldest first.
    ///
    /// An entry is removed only when the backend answers `success: true`;
    /// anything else leaves it queued for the next pass. Rows that no longer
    /// decode count as failed and never stop the pass. Concurrent calls are
    /// serialized, so a later pass sees what an earlier one removed.
    pub async fn drain(&self) -> anyhow::Result<SyncReport> {
        let _guard = self.drain_lock.lock().await;

        let scan = self.queue.scan().await?;
        let entries = scan.entries;
        let mut report = SyncReport {
            total: entries.len() + scan.corrupt.len(),
            failed: scan.corrupt.len(),
            ..SyncReport::default()
        };

        if report.total == 0 {
            tracing::debug!("offline queue empty; nothing to sync");
        } else {
            tracing::info!(pending = report.total, corrupt = scan.corrupt.len(), "syncing offline queue");
        }

        for entry in entries {
            match self.client.send_to(&entry.endpoint, &entry.request).await {
                Ok(result) if result.success => match self.queue.remove(entry.id).await {
                    Ok(_) => {
                        report.synced += 1;
                        tracing::info!(id = %entry.id, action = %entry.action(), "queued request delivered");
                    }
                    Err(err) => {
                        report.failed += 1;
                        tracing::warn!(
                            id = %entry.id,
                            error = %format!("{err:#}"),
                            "delivered but could not be removed; it will be replayed"
                        );
                    }
                },
                Ok(result) => {
                    report.failed += 1;
                    tracing::warn!(
                        id = %entry.id,
                        action = %entry.action(),
                        message = %result.message,
                        "backend rejected queued request; keeping it"
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        id = %entry.id,
                        action = %entry.action(),
                        error = %err,
                        "queued request still undeliverable"
                    );
                }
            }
        }

        if report.total > 0 {
            tracing::info!(
                synced = report.synced,
                failed = report.failed,
                total = report.total,
                "sync pass finished"
            );
        }
        let _ = self.events.send(SyncEvent::Completed(report));
        Ok(report)
    }

    /// Signal that the network is back; the background loop drains promptly.
    pub fn notify_connectivity_restored(&self) {
        self.wake.notify_one();
    }

    /// Probe the backend with the `test` action and record the outcome.
    pub async fn probe(&self) -> bool {
        let online = match self.client.probe().await {
            Ok(result) => result.success,
            Err(err) => {
                tracing::debug!(error = %err, "connectivity probe failed");
                false
            }
        };
        self.set_connectivity(online).await;
        online
    }

    async fn set_connectivity(&self, online: bool) {
        let changed = {
            let mut mode = self.connectivity.lock().await;
            if online { mode.set_online() } else { mode.set_offline() }
        };
        if changed {
            let state = if online {
                ConnectivityState::Online
            } else {
                ConnectivityState::Offline
            };
            tracing::info!(?state, "connectivity changed");
            let _ = self.events.send(SyncEvent::Connectivity { state });
        }
    }

    async fn drain_logged(&self) {
        if let Err(err) = self.drain().await {
            tracing::error!(error = %format!("{err:#}"), "sync pass failed");
            let _ = self.events.send(SyncEvent::Failed {
                error: format!("{err:#}"),
            });
        }
    }

    /// Start the background loop.
    ///
    /// The loop:
    /// - probes connectivity on every interval tick and drains when the probe
    ///   succeeds and the queue is not empty
    /// - drains immediately after `notify_connectivity_restored`
    /// - exits on `shutdown`
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let worker = self.clone();

        tokio::spawn(async move {
            tracing::info!(interval = ?worker.interval, "background sync worker started");

            let mut ticker = tokio::time::interval(worker.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = worker.shutdown.notified() => {
                        tracing::info!("background sync worker received shutdown signal");
                        break;
                    }
                    _ = worker.wake.notified() => {
                        worker.set_connectivity(true).await;
                        worker.drain_logged().await;
                    }
                    _ = ticker.tick() => {
                        match worker.queue.len().await {
                            Ok(0) => {
                                tracing::debug!("skipping probe - offline queue empty");
                                continue;
                            }
                            Ok(_) => {}
                            Err(err) => {
                                tracing::error!(error = %format!("{err:#}"), "failed to read offline queue");
                                continue;
                            }
                        }

                        if !worker.probe().await {
                            tracing::debug!("skipping sync - backend unreachable");
                            continue;
                        }
                        worker.drain_logged().await;
                    }
                }
            }

            tracing::info!("background sync worker stopped");
        })
    }

    /// Request graceful shutdown of the background loop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline_queue::insert_raw;
    use crate::request_client::testing::{ok_body, status, ScriptedTransport};
    use crate::request_client::RetryPolicy;
    use needlelog_core::{BackendRequest, Field, IncidentRecord};

    const ENDPOINT: &str = "http://backend.test/api/submit";

    fn no_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            use_fallback: false,
            ..RetryPolicy::default()
        }
    }

    fn worker(transport: Arc<ScriptedTransport>) -> SyncWorker {
        let client = Arc::new(RequestClient::new(ENDPOINT, transport, no_retry()));
        SyncWorker::new(client, OfflineQueue::in_memory(10))
    }

    fn entry(department: &str) -> BackendRequest {
        BackendRequest::submit_entry(
            IncidentRecord::builder()
                .field(Field::Department, department)
                .build(),
        )
    }

    #[tokio::test]
    async fn removes_only_entries_the_backend_accepted() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![
                ok_body("Entry submitted successfully"),
                status(200, r#"{"success":false,"message":"Sheet locked"}"#),
                Err("connection reset".into()),
            ],
            ok_body("unused"),
        ));
        let worker = worker(transport);
        for name in ["a", "b", "c"] {
            worker.queue().enqueue(ENDPOINT, &entry(name)).await.unwrap();
        }

        let report = worker.drain().await.unwrap();

        assert_eq!(report, SyncReport { synced: 1, failed: 2, total: 3 });
        assert_eq!(worker.queue().len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn corrupt_entry_does_not_block_its_neighbours() {
        let dir = tempfile::tempdir().unwrap();
        let queue = OfflineQueue::open(dir.path().join("offline.db"), 10);
        let transport = Arc::new(ScriptedTransport::always(ok_body("Entry submitted successfully")));
        let client = Arc::new(RequestClient::new(ENDPOINT, transport.clone(), no_retry()));
        let worker = SyncWorker::new(client, queue.clone());

        queue.enqueue(ENDPOINT, &entry("a")).await.unwrap();
        insert_raw(&queue, ENDPOINT, r#"{"action":"submitEntry","data":[1,[2]]}"#)
            .await
            .unwrap();
        queue.enqueue(ENDPOINT, &entry("b")).await.unwrap();

        let report = worker.drain().await.unwrap();
        assert_eq!(report, SyncReport { synced: 2, failed: 1, total: 3 });
        assert_eq!(transport.calls.lock().unwrap().len(), 2);

        let report = worker.drain().await.unwrap();
        assert_eq!(report, SyncReport { synced: 0, failed: 1, total: 1 });
        assert_eq!(transport.calls.lock().unwrap().len(), 2);
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn replays_to_the_recorded_endpoint() {
        let transport = Arc::new(ScriptedTransport::always(ok_body("ok")));
        let worker = worker(transport.clone());
        worker
            .queue()
            .enqueue("http://elsewhere.test/api/submit", &entry("a"))
            .await
            .unwrap();

        worker.drain().await.unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "http://elsewhere.test/api/submit");
    }

    #[tokio::test]
    async fn drain_broadcasts_its_report() {
        let transport = Arc::new(ScriptedTransport::always(ok_body("ok")));
        let worker = worker(transport);
        let mut events = worker.subscribe();
        worker.queue().enqueue(ENDPOINT, &entry("a")).await.unwrap();

        worker.drain().await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            SyncEvent::Completed(SyncReport { synced: 1, failed: 0, total: 1 })
        );
    }

    #[tokio::test]
    async fn overlapping_drains_deliver_each_entry_once() {
        let transport = Arc::new(ScriptedTransport::always(ok_body("ok")));
        let worker = worker(transport.clone());
        worker.queue().enqueue(ENDPOINT, &entry("a")).await.unwrap();
        worker.queue().enqueue(ENDPOINT, &entry("b")).await.unwrap();

        let (first, second) = tokio::join!(worker.drain(), worker.drain());
        let first = first.unwrap();
        let second = second.unwrap();

        assert_eq!(first.synced + second.synced, 2);
        assert_eq!(transport.calls.lock().unwrap().len(), 2);
        assert!(worker.queue().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn failed_probe_marks_offline() {
        let transport = Arc::new(ScriptedTransport::always(Err("unreachable".into())));
        let worker = worker(transport);
        let mut events = worker.subscribe();

        assert!(!worker.probe().await);
        assert_eq!(worker.connectivity().await, ConnectivityState::Offline);
        assert_eq!(
            events.recv().await.unwrap(),
            SyncEvent::Connectivity { state: ConnectivityState::Offline }
        );
    }

    #[tokio::test]
    async fn connectivity_restored_triggers_a_drain() {
        let transport = Arc::new(ScriptedTransport::always(ok_body("ok")));
        let worker = worker(transport).with_interval(Duration::from_secs(3600));
        worker.queue().enqueue(ENDPOINT, &entry("a")).await.unwrap();
        let mut events = worker.subscribe();

        let handle = worker.start();
        worker.notify_connectivity_restored();

        let report = loop {
            match events.recv().await.unwrap() {
                SyncEvent::Completed(report) if report.total > 0 => break report,
                _ => continue,
            }
        };
        assert_eq!(report.synced, 1);

        worker.shutdown();
        handle.await.unwrap();
        assert!(worker.queue().is_empty().await.unwrap());
    }
}
