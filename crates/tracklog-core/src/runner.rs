//! Background runner.
//!
//! [`BackgroundRunner`] is the long-lived owner of the sampling pipeline. Each
//! activation creates a task scope (a [`CancellationToken`] plus a
//! [`TaskTracker`]) holding the sample writer, one [`Sampler`], and a
//! permission watcher that restarts the sampler when location permission is
//! granted later.
//!
//! Nothing that fails inside the sampler deactivates the runner.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::keepalive::{KeepAlive, LogKeepAlive, Notice};
use crate::provider::LocationProvider;
use crate::sample_store::SampleStore;
use crate::sampler::{Sampler, SamplerConfig, SamplerState};
use crate::writer::SampleWriter;

/// How long deactivation waits for the scope's tasks to finish.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Restart policy requested from the host after activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    /// Restart after being killed, without replaying the original request.
    Sticky,
    /// Stay dead once killed.
    NotSticky,
}

/// Snapshot of the runner's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerStatus {
    /// Whether the runner is activated.
    pub active: bool,
    /// State of the owned sampler.
    pub sampler: SamplerState,
    /// When the current activation began.
    #[serde(with = "time::serde::rfc3339::option")]
    pub activated_at: Option<OffsetDateTime>,
}

struct Activation {
    token: CancellationToken,
    tracker: TaskTracker,
    sampler: Arc<Mutex<Sampler>>,
    activated_at: OffsetDateTime,
}

/// Owns the sampler and keeps sampling alive independent of any UI.
pub struct BackgroundRunner {
    provider: Arc<dyn LocationProvider>,
    store: SampleStore,
    config: SamplerConfig,
    keep_alive: Arc<dyn KeepAlive>,
    active: Mutex<Option<Activation>>,
}

impl BackgroundRunner {
    /// Create an inactive runner.
    ///
    /// Fails with [`Error::InvalidConfig`](crate::Error::InvalidConfig) if
    /// `config` does not validate.
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        store: SampleStore,
        config: SamplerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            store,
            config,
            keep_alive: Arc::new(LogKeepAlive),
            active: Mutex::new(None),
        })
    }

    /// Use a custom keep-alive hook instead of [`LogKeepAlive`].
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Arc<dyn KeepAlive>) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sampling configuration used for every activation.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Start background sampling.
    ///
    /// Missing permission does not fail activation: the runner stays active
    /// and starts the sampler once permission is granted. Calling this while
    /// already active changes nothing.
    pub async fn activate(&self) -> StartMode {
        let mut active = self.active.lock().await;
        if active.is_some() {
            debug!("Runner already active");
            return StartMode::Sticky;
        }

        self.promote().await;

        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let writer = SampleWriter::spawn(self.store.clone(), &tracker, token.clone());
        let sampler = Sampler::new(
            Arc::clone(&self.provider),
            writer,
            self.config,
            tracker.clone(),
            token.clone(),
        );
        let sampler = Arc::new(Mutex::new(sampler));

        // Subscribe before starting so a grant in between is not missed
        let mut permission = self.provider.permission_changes();
        permission.borrow_and_update();

        if let Err(e) = sampler.lock().await.start().await {
            info!("Sampler not started, waiting for permission: {}", e);
        }

        let watched = Arc::clone(&sampler);
        let watch_token = token.clone();
        tracker.spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = watch_token.cancelled() => break,
                    changed = permission.changed() => {
                        if changed.is_err() {
                            debug!("Permission channel closed");
                            break;
                        }
                    }
                }

                let granted = *permission.borrow_and_update();
                let mut sampler = watched.lock().await;
                if granted {
                    if let Err(e) = sampler.start().await {
                        warn!("Failed to restart sampler after permission grant: {}", e);
                    }
                } else {
                    sampler.stop().await;
                }
            }
        });

        *active = Some(Activation {
            token,
            tracker,
            sampler,
            activated_at: OffsetDateTime::now_utc(),
        });
        info!("Background runner activated");

        StartMode::Sticky
    }

    /// Stop background sampling. No-op while inactive.
    pub async fn deactivate(&self) {
        // Held through demotion; a concurrent activate waits for it
        let mut active = self.active.lock().await;
        let Some(activation) = active.take() else {
            debug!("Runner already inactive");
            return;
        };

        activation.sampler.lock().await.stop().await;
        activation.token.cancel();
        activation.tracker.close();

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, activation.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "Timed out waiting for {} runner tasks to finish",
                activation.tracker.len()
            );
        }

        self.demote().await;
        drop(active);
        info!("Background runner deactivated");
    }

    /// Run the keep-alive promotion off the async workers; hooks may block on IPC.
    async fn promote(&self) {
        let keep_alive = Arc::clone(&self.keep_alive);
        let result =
            tokio::task::spawn_blocking(move || keep_alive.promote(&Notice::tracking())).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to promote to foreground: {}", e),
            Err(e) => warn!("Keep-alive promotion task failed: {}", e),
        }
    }

    async fn demote(&self) {
        let keep_alive = Arc::clone(&self.keep_alive);
        if let Err(e) = tokio::task::spawn_blocking(move || keep_alive.demote()).await {
            warn!("Keep-alive demotion task failed: {}", e);
        }
    }

    /// Whether the runner is currently activated.
    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Current runner and sampler state.
    pub async fn status(&self) -> RunnerStatus {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(activation) => RunnerStatus {
                active: true,
                sampler: activation.sampler.lock().await.state(),
                activated_at: Some(activation.activated_at),
            },
            None => RunnerStatus {
                active: false,
                sampler: SamplerState::Stopped,
                activated_at: None,
            },
        }
    }
}

impl std::fmt::Debug for BackgroundRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRunner")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::provider::PushProvider;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tracklog_types::{Location, LocationResult};

    #[derive(Default)]
    struct CountingKeepAlive {
        promoted: AtomicU32,
        demoted: AtomicU32,
        fail: bool,
        last: std::sync::Mutex<Option<&'static str>>,
    }

    impl CountingKeepAlive {
        fn last_call(&self) -> Option<&'static str> {
            *self.last.lock().unwrap()
        }
    }

    impl KeepAlive for CountingKeepAlive {
        fn promote(&self, _notice: &Notice) -> Result<()> {
            self.promoted.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some("promote");
            if self.fail {
                return Err(Error::KeepAlive("no notification daemon".into()));
            }
            Ok(())
        }

        fn demote(&self) {
            self.demoted.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some("demote");
        }
    }

    fn runner(provider: Arc<PushProvider>) -> (BackgroundRunner, SampleStore) {
        let store = SampleStore::in_memory().unwrap();
        let runner =
            BackgroundRunner::new(provider, store.clone(), SamplerConfig::default()).unwrap();
        (runner, store)
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_rejects_invalid_config() {
        let provider = Arc::new(PushProvider::new(true));
        let store = SampleStore::in_memory().unwrap();
        let config = SamplerConfig {
            fastest_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            BackgroundRunner::new(provider, store, config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_activate_is_sticky_and_idempotent() {
        let provider = Arc::new(PushProvider::new(true));
        let keep_alive = Arc::new(CountingKeepAlive::default());
        let (runner, _) = runner(provider.clone());
        let runner = runner.with_keep_alive(keep_alive.clone());

        assert_eq!(runner.activate().await, StartMode::Sticky);
        assert_eq!(runner.activate().await, StartMode::Sticky);

        assert_eq!(provider.active_subscriptions(), 1);
        assert_eq!(keep_alive.promoted.load(Ordering::SeqCst), 1);

        let status = runner.status().await;
        assert!(status.active);
        assert_eq!(status.sampler, SamplerState::Running);
        assert!(status.activated_at.is_some());
    }

    #[tokio::test]
    async fn test_deactivate_is_idempotent() {
        let provider = Arc::new(PushProvider::new(true));
        let keep_alive = Arc::new(CountingKeepAlive::default());
        let (runner, _) = runner(provider.clone());
        let runner = runner.with_keep_alive(keep_alive.clone());

        runner.deactivate().await;
        assert_eq!(keep_alive.demoted.load(Ordering::SeqCst), 0);

        runner.activate().await;
        runner.deactivate().await;
        runner.deactivate().await;

        assert_eq!(keep_alive.demoted.load(Ordering::SeqCst), 1);
        assert_eq!(provider.active_subscriptions(), 0);
        assert!(!runner.is_active().await);
        assert_eq!(runner.status().await.sampler, SamplerState::Stopped);
    }

    #[tokio::test]
    async fn test_keep_alive_failure_does_not_block_activation() {
        let provider = Arc::new(PushProvider::new(true));
        let keep_alive = Arc::new(CountingKeepAlive {
            fail: true,
            ..Default::default()
        });
        let (runner, _) = runner(provider.clone());
        let runner = runner.with_keep_alive(keep_alive);

        runner.activate().await;
        assert_eq!(runner.status().await.sampler, SamplerState::Running);
    }

    #[tokio::test]
    async fn test_permission_denied_then_granted() {
        let provider = Arc::new(PushProvider::new(false));
        let (runner, store) = runner(provider.clone());

        runner.activate().await;
        let status = runner.status().await;
        assert!(status.active);
        assert_eq!(status.sampler, SamplerState::Stopped);

        // No subscription, so nothing is recorded
        provider.push(LocationResult::with_location(Location::new(1.0, 2.0, 3.0)));
        assert_eq!(store.count().await.unwrap(), 0);

        provider.set_permission(true);
        let watched = provider.clone();
        wait_until(move || watched.active_subscriptions() == 1).await;
        assert_eq!(runner.status().await.sampler, SamplerState::Running);

        provider.push(LocationResult::with_location(Location::new(1.0, 2.0, 3.0)));
        for _ in 0..200 {
            if store.count().await.unwrap() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.count().await.unwrap(), 1);

        runner.deactivate().await;
    }

    #[tokio::test]
    async fn test_permission_revoked_stops_sampler() {
        let provider = Arc::new(PushProvider::new(true));
        let (runner, _) = runner(provider.clone());

        runner.activate().await;
        provider.set_permission(false);

        let watched = provider.clone();
        wait_until(move || watched.active_subscriptions() == 0).await;
        assert!(runner.is_active().await);
        assert_eq!(runner.status().await.sampler, SamplerState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_restart_during_stop_stays_promoted() {
        for _ in 0..50 {
            let provider = Arc::new(PushProvider::new(true));
            let keep_alive = Arc::new(CountingKeepAlive::default());
            let (runner, _) = runner(provider);
            let runner = Arc::new(runner.with_keep_alive(keep_alive.clone()));
            runner.activate().await;

            let stopping = tokio::spawn({
                let runner = Arc::clone(&runner);
                async move { runner.deactivate().await }
            });
            tokio::task::yield_now().await;
            let starting = tokio::spawn({
                let runner = Arc::clone(&runner);
                async move { runner.activate().await }
            });
            stopping.await.unwrap();
            starting.await.unwrap();

            let expected = if runner.is_active().await {
                "promote"
            } else {
                "demote"
            };
            assert_eq!(keep_alive.last_call(), Some(expected));
            runner.deactivate().await;
        }
    }

    struct SlowKeepAlive;

    impl KeepAlive for SlowKeepAlive {
        fn promote(&self, _notice: &Notice) -> Result<()> {
            std::thread::sleep(Duration::from_millis(100));
            Ok(())
        }

        fn demote(&self) {
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn test_blocking_keep_alive_does_not_stall_runtime() {
        let provider = Arc::new(PushProvider::new(true));
        let (runner, _) = runner(provider);
        let runner = runner.with_keep_alive(Arc::new(SlowKeepAlive));

        let ticks = Arc::new(AtomicU32::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        });

        runner.activate().await;
        assert!(ticks.load(Ordering::SeqCst) > 2);

        let before = ticks.load(Ordering::SeqCst);
        runner.deactivate().await;
        assert!(ticks.load(Ordering::SeqCst) > before + 2);

        ticker.abort();
    }
}
