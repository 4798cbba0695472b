//! Background location sampling pipeline.
//!
//! This crate turns a platform location-update stream into a persisted log of
//! location+speed samples and exposes that log reactively to presentation
//! layers.
//!
//! # Pipeline
//!
//! ```text
//! LocationProvider ──▶ Sampler ──▶ SampleWriter ──▶ SampleStore ──▶ ObservableQuery
//!                        ▲                                              │
//!              BackgroundRunner (start/stop)                  Subscription snapshots
//! ```
//!
//! - **Providers**: [`LocationProvider`] is implemented by the host-fed
//!   [`PushProvider`] and the timer-driven [`SimulatedProvider`]
//! - **Sampling**: [`Sampler`] subscribes with a [`SamplerConfig`] and
//!   forwards every fix to a single [`SampleWriter`] queue
//! - **Lifecycle**: [`BackgroundRunner`] owns the sampler, promotes itself
//!   through a [`KeepAlive`] hook and resumes sampling once permission is
//!   granted
//! - **Reads**: [`ObservableQuery`] re-evaluates the most recent samples after
//!   each insert and publishes immutable [`Snapshot`]s
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracklog_core::{
//!     BackgroundRunner, ObservableQuery, SampleStore, SamplerConfig, SimulatedProvider,
//! };
//! use tracklog_store::Store;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SampleStore::new(Store::open_default()?);
//!     let provider = Arc::new(SimulatedProvider::default());
//!
//!     let runner = BackgroundRunner::new(provider, store.clone(), SamplerConfig::default())?;
//!     runner.activate().await;
//!
//!     let mut subscription = ObservableQuery::with_default_limit(store).subscribe();
//!     while let Some(snapshot) = subscription.changed().await {
//!         println!("{} samples", snapshot.len());
//!     }
//!
//!     runner.deactivate().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod keepalive;
pub mod provider;
pub mod query;
pub mod runner;
pub mod sample_store;
pub mod sampler;
pub mod simulate;
pub mod util;
pub mod writer;

// Core exports
pub use error::{Error, Result};
pub use keepalive::{KeepAlive, LogKeepAlive, Notice, NoticeImportance};
pub use provider::{LocationProvider, LocationUpdates, PushProvider};
pub use query::{DEFAULT_RECENT_LIMIT, ObservableQuery, Snapshot, Subscription};
pub use runner::{BackgroundRunner, RunnerStatus, StartMode};
pub use sample_store::{SampleAdded, SampleStore};
pub use sampler::{
    DEFAULT_FASTEST_INTERVAL, DEFAULT_UPDATE_INTERVAL, Sampler, SamplerConfig, SamplerState,
};
pub use simulate::{SimulatedProvider, SimulatedProviderBuilder, SimulationConfig};
pub use writer::SampleWriter;

/// Type alias for a shared provider reference.
pub type SharedProvider = std::sync::Arc<dyn LocationProvider>;

// Re-export from the lower crates
pub use tracklog_store::{SampleQuery, StoredSample};
pub use tracklog_types::{Location, LocationRequest, LocationResult, Priority, SpeedSample};
