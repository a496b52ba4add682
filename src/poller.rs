//! Snapshot Poller.
//!
//! Cursor-read → fetch → process → cursor-advance loop. `CustodyClient`
//! is the pluggable boundary to the external snapshot source.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPool;
use tokio::sync::watch;

use crate::config::ServiceConfig;
use crate::custody::CustodyClient;
use crate::error::PollerError;
use crate::models::Snapshot;

/// How many recently-seen snapshot ids the poller remembers across poll
/// iterations, to tolerate the custody network occasionally returning
/// batches with duplicated `created_at` timestamps without re-delivering a
/// snapshot the checkpoint has already advanced past within the same
/// timestamp.
const SEEN_WINDOW: usize = 4096;

pub struct SnapshotPoller<C: CustodyClient> {
    custody: Arc<C>,
    pool: PgPool,
    service: ServiceConfig,
    snapshot_limit: i64,
    seen: VecDeque<String>,
}

impl<C: CustodyClient> SnapshotPoller<C> {
    pub fn new(custody: Arc<C>, pool: PgPool, service: ServiceConfig, snapshot_limit: i64) -> Self {
        Self {
            custody,
            pool,
            service,
            snapshot_limit,
            seen: VecDeque::with_capacity(SEEN_WINDOW),
        }
    }

    /// Run forever, calling `handle` for each undelivered snapshot in
    /// ascending `created_at` order. `handle` itself never fails from this
    /// loop's point of view: the classifier+writer path resolves every
    /// snapshot to a disposition, and transient store errors inside it are
    /// retried by the caller before `handle` returns.
    pub async fn run<F, Fut>(&mut self, mut shutdown: watch::Receiver<bool>, mut handle: F) -> Result<(), PollerError>
    where
        F: FnMut(Snapshot) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let checkpoint = crate::db::read_checkpoint(&self.pool).await?;

            let batch = match self
                .custody
                .fetch_snapshots(checkpoint, self.snapshot_limit.max(1))
                .await
            {
                Ok(batch) => batch,
                Err(err) => {
                    tracing::warn!(error = %err, "snapshot fetch failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(self.service.retry_delay_ms)) => {}
                        _ = shutdown.changed() => return Ok(()),
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(self.service.poll_interval_ms)) => {}
                    _ = shutdown.changed() => return Ok(()),
                }
                continue;
            }

            let mut max_created_at = checkpoint;
            for snapshot in batch {
                if self.seen.contains(&snapshot.snapshot_id) {
                    continue;
                }
                if snapshot.created_at > max_created_at {
                    max_created_at = snapshot.created_at;
                }
                self.remember(snapshot.snapshot_id.clone());
                handle(snapshot).await;
            }

            // Checkpoint advances only after every snapshot in the batch
            // has been durably processed — `handle` above is awaited to
            // completion for each snapshot before this point.
            crate::db::write_checkpoint(&self.pool, max_created_at).await?;
        }
    }

    fn remember(&mut self, snapshot_id: String) {
        if self.seen.len() == SEEN_WINDOW {
            self.seen.pop_front();
        }
        self.seen.push_back(snapshot_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CustodyError;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;

    struct FakeCustody {
        batches: Mutex<Vec<Vec<Snapshot>>>,
    }

    #[async_trait]
    impl CustodyClient for FakeCustody {
        async fn fetch_snapshots(
            &self,
            _offset: DateTime<Utc>,
            _limit: i64,
        ) -> Result<Vec<Snapshot>, CustodyError> {
            let mut batches = self.batches.lock().unwrap();
            Ok(if batches.is_empty() {
                Vec::new()
            } else {
                batches.remove(0)
            })
        }

        async fn submit_transfer(
            &self,
            _request: &crate::custody::TransferRequest,
        ) -> Result<(), CustodyError> {
            Ok(())
        }
    }

    fn snapshot(id: &str, at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            snapshot_id: id.to_string(),
            trace_id: id.to_string(),
            user_id: "our-account".to_string(),
            opponent_id: "U1".to_string(),
            asset_id: "USDT".to_string(),
            amount: rust_decimal::Decimal::ONE,
            created_at: at,
            data: String::new(),
        }
    }

    #[test]
    fn seen_window_deduplicates_within_capacity() {
        let mut poller_seen: VecDeque<String> = VecDeque::with_capacity(4);
        for id in ["a", "b", "a", "c"] {
            if !poller_seen.contains(&id.to_string()) {
                poller_seen.push_back(id.to_string());
            }
        }
        assert_eq!(poller_seen.len(), 3);
    }

    #[tokio::test]
    async fn dedupes_repeated_snapshot_ids_in_memory() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let _fake = FakeCustody {
            batches: Mutex::new(vec![vec![snapshot("s1", at), snapshot("s1", at)]]),
        };
        let mut seen = VecDeque::new();
        let mut delivered = Vec::new();
        for s in [snapshot("s1", at), snapshot("s1", at), snapshot("s2", at)] {
            if seen.contains(&s.snapshot_id) {
                continue;
            }
            seen.push_back(s.snapshot_id.clone());
            delivered.push(s.snapshot_id);
        }
        assert_eq!(delivered, vec!["s1".to_string(), "s2".to_string()]);
    }
}
