//! Shared handle over the sample database.
//!
//! [`SampleStore`] is constructed once at process start and cloned into every
//! component that reads or writes samples. Each successful insert publishes a
//! [`SampleAdded`] signal so observable queries can re-evaluate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tracing::debug;

use tracklog_store::{SampleQuery, Store, StoredSample};
use tracklog_types::SpeedSample;

use crate::error::Result;

/// Default capacity of the change-notification channel.
pub const DEFAULT_CHANGE_BUFFER: usize = 100;

/// Signal published after a sample has been committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleAdded {
    /// Row ID assigned by the store.
    pub id: i64,
    /// Capture time in epoch milliseconds.
    pub timestamp: i64,
}

struct Inner {
    store: Mutex<Store>,
    changes: broadcast::Sender<SampleAdded>,
}

/// Cloneable, process-wide handle to the sample store.
#[derive(Clone)]
pub struct SampleStore {
    inner: Arc<Inner>,
}

impl SampleStore {
    /// Wrap an opened store.
    pub fn new(store: Store) -> Self {
        Self::with_capacity(store, DEFAULT_CHANGE_BUFFER)
    }

    /// Wrap an opened store with a custom change-channel capacity.
    pub fn with_capacity(store: Store, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(store),
                changes,
            }),
        }
    }

    /// In-memory store, mostly useful in tests.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Store::open_in_memory()?))
    }

    /// Append a sample and notify subscribers once it is committed.
    pub async fn insert(&self, sample: SpeedSample) -> Result<StoredSample> {
        let stored = {
            let store = self.inner.store.lock().await;
            store.insert_sample(&sample)?
        };

        // No receivers is fine
        let _ = self.inner.changes.send(SampleAdded {
            id: stored.id,
            timestamp: stored.timestamp,
        });
        debug!("Published sample {}", stored.id);

        Ok(stored)
    }

    /// Up to `limit` samples, newest timestamp first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<StoredSample>> {
        let store = self.inner.store.lock().await;
        Ok(store.recent(limit)?)
    }

    /// Run an arbitrary filtered query.
    pub async fn query(&self, query: &SampleQuery) -> Result<Vec<StoredSample>> {
        let store = self.inner.store.lock().await;
        Ok(store.query_samples(query)?)
    }

    /// Number of stored samples.
    pub async fn count(&self) -> Result<u64> {
        let store = self.inner.store.lock().await;
        Ok(store.count_samples()?)
    }

    /// Most recent sample by timestamp.
    pub async fn latest(&self) -> Result<Option<StoredSample>> {
        let store = self.inner.store.lock().await;
        Ok(store.latest_sample()?)
    }

    /// Receive a signal after every committed insert.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<SampleAdded> {
        self.inner.changes.subscribe()
    }

    /// Number of live change receivers.
    pub fn change_receivers(&self) -> usize {
        self.inner.changes.receiver_count()
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("change_receivers", &self.change_receivers())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_publishes_after_commit() {
        let store = SampleStore::in_memory().unwrap();
        let mut changes = store.subscribe_changes();

        let stored = store
            .insert(SpeedSample::new(100, 1.0, 2.0, 3.0))
            .await
            .unwrap();

        let signal = changes.recv().await.unwrap();
        assert_eq!(signal, SampleAdded { id: stored.id, timestamp: 100 });

        // The row is visible by the time the signal arrives
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_insert_without_subscribers() {
        let store = SampleStore::in_memory().unwrap();
        store
            .insert(SpeedSample::new(100, 1.0, 2.0, 3.0))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_rows() {
        let store = SampleStore::in_memory().unwrap();
        let other = store.clone();

        store
            .insert(SpeedSample::new(100, 1.0, 2.0, 3.0))
            .await
            .unwrap();
        other
            .insert(SpeedSample::new(200, 1.1, 2.1, 0.0))
            .await
            .unwrap();

        let recent = store.recent(5).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, 200);
        assert_eq!(other.latest().await.unwrap().unwrap().timestamp, 200);
    }

    #[tokio::test]
    async fn test_query_with_filters() {
        let store = SampleStore::in_memory().unwrap();
        for ts in [100, 200, 300] {
            store
                .insert(SpeedSample::new(ts, 0.0, 0.0, 1.0))
                .await
                .unwrap();
        }

        let rows = store
            .query(&SampleQuery::new().since(150).oldest_first())
            .await
            .unwrap();
        let timestamps: Vec<i64> = rows.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![200, 300]);
    }
}
