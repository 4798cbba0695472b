//! Location provider abstraction.
//!
//! The platform's location service is modeled by the [`LocationProvider`]
//! trait. A subscription is a [`LocationUpdates`] receiver; dropping it
//! removes the subscription from the provider.
//!
//! [`PushProvider`] is the host-fed implementation: whatever owns the real
//! location hardware (a mobile shell, a gpsd bridge, an HTTP client) pushes
//! each [`LocationResult`] into it and it fans the result out to every live
//! subscription.

use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::Stream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use tracklog_types::{LocationRequest, LocationResult};

use crate::error::{Error, Result};

/// Default per-subscription buffer for pushed results.
pub const DEFAULT_UPDATE_BUFFER: usize = 32;

/// Trait abstracting a platform location-update service.
///
/// # Example
///
/// ```ignore
/// use tracklog_core::{LocationProvider, Result};
///
/// async fn first_fix<P: LocationProvider>(provider: &P, request: &LocationRequest) -> Result<()> {
///     let mut updates = provider.subscribe(request).await?;
///     if let Some(result) = updates.recv().await {
///         println!("{:?}", result.last_location);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether location permission is currently granted.
    fn has_permission(&self) -> bool;

    /// Watch channel that flips whenever permission is granted or revoked.
    fn permission_changes(&self) -> watch::Receiver<bool>;

    /// Start receiving location updates.
    ///
    /// Returns [`Error::PermissionDenied`] when permission is missing.
    async fn subscribe(&self, request: &LocationRequest) -> Result<LocationUpdates>;
}

/// A live location-update subscription.
///
/// Dropping the value unsubscribes.
#[derive(Debug)]
pub struct LocationUpdates {
    receiver: mpsc::Receiver<LocationResult>,
}

impl LocationUpdates {
    /// Wrap the receiving half of a provider channel.
    pub fn new(receiver: mpsc::Receiver<LocationResult>) -> Self {
        Self { receiver }
    }

    /// Wait for the next delivery. `None` once the provider stops delivering.
    pub async fn recv(&mut self) -> Option<LocationResult> {
        self.receiver.recv().await
    }
}

impl Stream for LocationUpdates {
    type Item = LocationResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Host-fed location provider.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tracklog_core::{LocationProvider, PushProvider};
/// use tracklog_types::{Location, LocationRequest, LocationResult, Priority};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> tracklog_core::Result<()> {
/// let provider = PushProvider::new(true);
/// let request = LocationRequest::new(
///     Duration::from_secs(10),
///     Duration::from_secs(5),
///     Priority::HighAccuracy,
/// );
/// let mut updates = provider.subscribe(&request).await?;
///
/// provider.push(LocationResult::with_location(Location::new(1.0, 2.0, 3.0)));
/// assert!(updates.recv().await.unwrap().last_location.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PushProvider {
    subscribers: Mutex<Vec<mpsc::Sender<LocationResult>>>,
    permission: watch::Sender<bool>,
    buffer: usize,
}

impl PushProvider {
    /// Create a provider with the given initial permission state.
    pub fn new(permission_granted: bool) -> Self {
        Self::with_buffer(permission_granted, DEFAULT_UPDATE_BUFFER)
    }

    /// Create a provider with a custom per-subscription buffer.
    pub fn with_buffer(permission_granted: bool, buffer: usize) -> Self {
        let (permission, _) = watch::channel(permission_granted);
        Self {
            subscribers: Mutex::new(Vec::new()),
            permission,
            buffer: buffer.max(1),
        }
    }

    /// Record a permission grant or denial from the host.
    pub fn set_permission(&self, granted: bool) {
        let changed = self.permission.send_if_modified(|current| {
            let changed = *current != granted;
            *current = granted;
            changed
        });
        if changed {
            info!(
                "Location permission {}",
                if granted { "granted" } else { "revoked" }
            );
        }
    }

    /// Deliver a result to every live subscription.
    ///
    /// Returns the number of subscriptions that accepted it. A subscription
    /// whose buffer is full misses this result.
    pub fn push(&self, result: LocationResult) -> usize {
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|tx| !tx.is_closed());

        let mut delivered = 0;
        for tx in subscribers.iter() {
            match tx.try_send(result) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Location subscriber is not keeping up, dropping update");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Number of subscriptions that have not been dropped.
    pub fn active_subscriptions(&self) -> usize {
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<mpsc::Sender<LocationResult>>> {
        // No invariant spans the lock, so a poisoned list is still usable
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PushProvider {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl LocationProvider for PushProvider {
    fn name(&self) -> &str {
        "push"
    }

    fn has_permission(&self) -> bool {
        *self.permission.borrow()
    }

    fn permission_changes(&self) -> watch::Receiver<bool> {
        self.permission.subscribe()
    }

    async fn subscribe(&self, request: &LocationRequest) -> Result<LocationUpdates> {
        if !self.has_permission() {
            return Err(Error::PermissionDenied);
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        self.lock_subscribers().push(tx);

        debug!(
            "New push subscription (interval {:?}, fastest {:?}, {})",
            request.interval, request.fastest_interval, request.priority
        );
        Ok(LocationUpdates::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracklog_types::{Location, Priority};

    fn request() -> LocationRequest {
        LocationRequest::new(
            Duration::from_secs(10),
            Duration::from_secs(5),
            Priority::HighAccuracy,
        )
    }

    #[tokio::test]
    async fn test_subscribe_requires_permission() {
        let provider = PushProvider::new(false);
        let result = provider.subscribe(&request()).await;
        assert!(matches!(result, Err(Error::PermissionDenied)));
        assert_eq!(provider.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_push_fans_out() {
        let provider = PushProvider::new(true);
        let mut a = provider.subscribe(&request()).await.unwrap();
        let mut b = provider.subscribe(&request()).await.unwrap();

        let fix = Location::new(1.0, 2.0, 3.0);
        assert_eq!(provider.push(LocationResult::with_location(fix)), 2);

        assert_eq!(a.recv().await.unwrap().last_location, Some(fix));
        assert_eq!(b.recv().await.unwrap().last_location, Some(fix));
    }

    #[tokio::test]
    async fn test_dropping_updates_unsubscribes() {
        let provider = PushProvider::new(true);
        let updates = provider.subscribe(&request()).await.unwrap();
        assert_eq!(provider.active_subscriptions(), 1);

        drop(updates);
        assert_eq!(provider.active_subscriptions(), 0);
        assert_eq!(provider.push(LocationResult::empty()), 0);
    }

    #[tokio::test]
    async fn test_full_buffer_drops_update() {
        let provider = PushProvider::with_buffer(true, 1);
        let mut updates = provider.subscribe(&request()).await.unwrap();

        assert_eq!(provider.push(LocationResult::empty()), 1);
        assert_eq!(provider.push(LocationResult::empty()), 0);

        assert!(updates.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_permission_changes_are_observable() {
        let provider = PushProvider::new(false);
        let mut rx = provider.permission_changes();
        assert!(!*rx.borrow());

        provider.set_permission(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(provider.has_permission());

        // Setting the same value again does not notify
        provider.set_permission(true);
        assert!(!rx.has_changed().unwrap());
    }
}
