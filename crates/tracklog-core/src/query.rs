//! Observable queries over the most recent samples.
//!
//! An [`ObservableQuery`] hands out [`Subscription`]s. Each subscription owns
//! a background task that evaluates `recent(limit)` immediately and again
//! after every committed insert, publishing the result as an immutable
//! [`Snapshot`].
//!
//! # Example
//!
//! ```
//! use tracklog_core::{ObservableQuery, SampleStore};
//! use tracklog_types::SpeedSample;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tracklog_core::Result<()> {
//! let store = SampleStore::in_memory()?;
//! let query = ObservableQuery::new(store.clone(), 1000);
//! let mut subscription = query.subscribe();
//!
//! // First emission reflects the store at subscription time
//! let initial = subscription.changed().await.unwrap();
//! assert!(initial.is_empty());
//!
//! store.insert(SpeedSample::new(100, 1.0, 2.0, 3.0)).await?;
//! let updated = subscription.changed().await.unwrap();
//! assert_eq!(updated.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tracklog_store::StoredSample;

use crate::error::Result;
use crate::sample_store::{SampleAdded, SampleStore};

/// Default number of samples a query observes.
pub const DEFAULT_RECENT_LIMIT: u32 = 1000;

/// Immutable ordered result of one evaluation, newest first.
pub type Snapshot = Arc<[StoredSample]>;

/// Reactive read handle over the `limit` most recent samples.
#[derive(Debug, Clone)]
pub struct ObservableQuery {
    store: SampleStore,
    limit: u32,
}

impl ObservableQuery {
    /// Observe the `limit` most recent samples of `store`.
    pub fn new(store: SampleStore, limit: u32) -> Self {
        Self { store, limit }
    }

    /// Observe [`DEFAULT_RECENT_LIMIT`] samples.
    pub fn with_default_limit(store: SampleStore) -> Self {
        Self::new(store, DEFAULT_RECENT_LIMIT)
    }

    /// Number of samples each snapshot holds at most.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Evaluate the query once.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.store.recent(self.limit).await?.into())
    }

    /// Start observing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> Subscription {
        // Listen before the first read so no insert slips between them
        let changes = self.store.subscribe_changes();
        let (tx, rx) = watch::channel::<Option<Snapshot>>(None);
        let token = CancellationToken::new();

        tokio::spawn(observe(
            self.store.clone(),
            self.limit,
            changes,
            tx,
            token.clone(),
        ));

        Subscription { rx, token }
    }
}

async fn observe(
    store: SampleStore,
    limit: u32,
    mut changes: broadcast::Receiver<SampleAdded>,
    tx: watch::Sender<Option<Snapshot>>,
    token: CancellationToken,
) {
    loop {
        match store.recent(limit).await {
            Ok(samples) => {
                let snapshot: Snapshot = samples.into();
                if tx.send(Some(snapshot)).is_err() {
                    break;
                }
            }
            Err(e) => warn!("Failed to evaluate recent samples: {}", e),
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tx.closed() => break,
            signal = changes.recv() => match signal {
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Query lagged by {} inserts, re-evaluating once", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }

        // Coalesce signals that queued up while we were reading
        loop {
            match changes.try_recv() {
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }
    debug!("Observable query subscription ended");
}

/// Live subscription to an [`ObservableQuery`].
///
/// Dropping the subscription stops its background task.
#[derive(Debug)]
pub struct Subscription {
    rx: watch::Receiver<Option<Snapshot>>,
    token: CancellationToken,
}

impl Subscription {
    /// Latest snapshot, or `None` before the first evaluation completes.
    pub fn current(&self) -> Option<Snapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for a snapshot not yet seen by this subscription.
    ///
    /// Returns `None` once the subscription has ended.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            if let Some(snapshot) = self.rx.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }

    /// Stop receiving snapshots.
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    /// Whether the subscription is still live.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
