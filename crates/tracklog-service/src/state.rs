//! Application state shared across handlers.
//!
//! # Change Channel Behavior
//!
//! Every committed sample publishes a signal on the store's broadcast
//! channel. Each WebSocket client and observable query re-reads the recent
//! samples when signalled.
//!
//! - **Buffer size**: Configurable via `server.broadcast_buffer` (default: 100)
//! - **Lagging**: A subscriber that falls behind skips the missed signals and
//!   re-reads once, so it never sees a stale snapshot for long
//! - **No blocking**: Inserts never wait for subscribers

use std::sync::Arc;

use time::OffsetDateTime;

use tracklog_core::{
    BackgroundRunner, KeepAlive, LocationProvider, ObservableQuery, PushProvider, SampleStore,
    SharedProvider, SimulatedProvider,
};
use tracklog_store::Store;

use crate::config::Config;

/// The location source feeding the runner.
#[derive(Debug, Clone)]
pub enum ProviderHandle {
    /// Fixes are posted by the host through the API.
    Push(Arc<PushProvider>),
    /// Fixes come from a synthetic route.
    Simulated(Arc<SimulatedProvider>),
}

impl ProviderHandle {
    /// The provider as a trait object.
    pub fn shared(&self) -> SharedProvider {
        match self {
            ProviderHandle::Push(p) => Arc::clone(p) as SharedProvider,
            ProviderHandle::Simulated(p) => Arc::clone(p) as SharedProvider,
        }
    }

    /// The host-fed provider, if that is what is running.
    pub fn push(&self) -> Option<&PushProvider> {
        match self {
            ProviderHandle::Push(p) => Some(p),
            ProviderHandle::Simulated(_) => None,
        }
    }

    /// Record a permission outcome reported by the host.
    pub fn set_permission(&self, granted: bool) {
        match self {
            ProviderHandle::Push(p) => p.set_permission(granted),
            ProviderHandle::Simulated(p) => p.set_permission(granted),
        }
    }

    /// Whether location permission is currently granted.
    pub fn has_permission(&self) -> bool {
        match self {
            ProviderHandle::Push(p) => p.has_permission(),
            ProviderHandle::Simulated(p) => p.has_permission(),
        }
    }

    /// Short provider name for status output.
    pub fn name(&self) -> &str {
        match self {
            ProviderHandle::Push(p) => p.name(),
            ProviderHandle::Simulated(p) => p.name(),
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// The shared sample store.
    pub store: SampleStore,
    /// Owner of the sampling pipeline.
    pub runner: BackgroundRunner,
    /// Location source.
    pub provider: ProviderHandle,
    /// Recent-samples query behind the log, route and live feed.
    pub query: ObservableQuery,
    /// When the service started.
    pub started_at: OffsetDateTime,
}

impl AppState {
    /// Create new application state.
    ///
    /// The change channel buffer size is determined by `config.server.broadcast_buffer`.
    pub fn new(
        store: Store,
        provider: ProviderHandle,
        keep_alive: Arc<dyn KeepAlive>,
        config: Config,
    ) -> tracklog_core::Result<Arc<Self>> {
        let store = SampleStore::with_capacity(store, config.server.broadcast_buffer);
        let runner = BackgroundRunner::new(
            provider.shared(),
            store.clone(),
            config.sampling.sampler_config(),
        )?
        .with_keep_alive(keep_alive);
        let query = ObservableQuery::new(store.clone(), config.sampling.recent_limit);

        Ok(Arc::new(Self {
            store,
            runner,
            provider,
            query,
            started_at: OffsetDateTime::now_utc(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracklog_core::LogKeepAlive;

    fn state(provider: ProviderHandle) -> Arc<AppState> {
        AppState::new(
            Store::open_in_memory().unwrap(),
            provider,
            Arc::new(LogKeepAlive),
            Config::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_state_starts_inactive() {
        let state = state(ProviderHandle::Push(Arc::new(PushProvider::new(true))));
        assert!(!state.runner.is_active().await);
        assert_eq!(state.query.limit(), 1000);
        assert_eq!(state.store.count().await.unwrap(), 0);
    }

    #[test]
    fn test_provider_handle_push() {
        let handle = ProviderHandle::Push(Arc::new(PushProvider::new(false)));
        assert!(handle.push().is_some());
        assert!(!handle.has_permission());
        handle.set_permission(true);
        assert!(handle.has_permission());
        assert_eq!(handle.name(), "push");
    }

    #[test]
    fn test_provider_handle_simulated() {
        let handle = ProviderHandle::Simulated(Arc::new(SimulatedProvider::default()));
        assert!(handle.push().is_none());
        assert!(handle.has_permission());
        assert_eq!(handle.shared().name(), "simulator");
    }

    #[test]
    fn test_invalid_sampling_config_is_rejected() {
        let mut config = Config::default();
        config.sampling.fastest_interval_secs = 60;
        let result = AppState::new(
            Store::open_in_memory().unwrap(),
            ProviderHandle::Push(Arc::new(PushProvider::new(true))),
            Arc::new(LogKeepAlive),
            config,
        );
        assert!(matches!(
            result,
            Err(tracklog_core::Error::InvalidConfig(_))
        ));
    }
}
