//! Location sampler.
//!
//! A [`Sampler`] subscribes to a [`LocationProvider`] and turns every
//! delivered fix into a [`SpeedSample`] handed to the [`SampleWriter`].
//!
//! ```text
//!            start()                      provider closes / stop()
//! Stopped ───────────────▶ Running ─────────────────────────────▶ Stopped
//!    ▲  │ PermissionDenied
//!    └──┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use tracklog_types::{LocationRequest, LocationResult, Priority, SpeedSample};

use crate::error::{Error, Result};
use crate::provider::{LocationProvider, LocationUpdates};
use crate::util::now_millis;
use crate::writer::SampleWriter;

/// Default interval between location updates.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Default fastest accepted update interval.
pub const DEFAULT_FASTEST_INTERVAL: Duration = Duration::from_secs(5);

/// Sampling parameters, fixed for the lifetime of a [`Sampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Desired interval between updates.
    pub update_interval: Duration,
    /// Fastest interval at which updates are accepted.
    pub fastest_interval: Duration,
    /// Accuracy priority requested from the provider.
    pub priority: Priority,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            fastest_interval: DEFAULT_FASTEST_INTERVAL,
            priority: Priority::HighAccuracy,
        }
    }
}

impl SamplerConfig {
    /// Preset used by the route view: 5s updates, 2s fastest.
    pub fn frequent() -> Self {
        Self {
            update_interval: Duration::from_secs(5),
            fastest_interval: Duration::from_secs(2),
            priority: Priority::HighAccuracy,
        }
    }

    /// Check that both intervals are positive and correctly ordered.
    pub fn validate(&self) -> Result<()> {
        if self.update_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "update_interval must be > 0".to_string(),
            ));
        }
        if self.fastest_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "fastest_interval must be > 0".to_string(),
            ));
        }
        if self.fastest_interval > self.update_interval {
            return Err(Error::InvalidConfig(format!(
                "fastest_interval ({:?}) must not exceed update_interval ({:?})",
                self.fastest_interval, self.update_interval
            )));
        }
        Ok(())
    }

    /// The provider request built from this configuration.
    pub fn request(&self) -> LocationRequest {
        LocationRequest::new(self.update_interval, self.fastest_interval, self.priority)
    }
}

/// Lifecycle state of a [`Sampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerState {
    /// Not subscribed to location updates.
    Stopped,
    /// Subscribed and forwarding samples.
    Running,
}

struct ActiveSubscription {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Forwards provider fixes to the sample writer.
pub struct Sampler {
    provider: Arc<dyn LocationProvider>,
    writer: SampleWriter,
    config: SamplerConfig,
    tracker: TaskTracker,
    token: CancellationToken,
    active: Option<ActiveSubscription>,
}

impl Sampler {
    /// Create a stopped sampler.
    ///
    /// The forwarding task is spawned on `tracker` and is cancelled together
    /// with `token`.
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        writer: SampleWriter,
        config: SamplerConfig,
        tracker: TaskTracker,
        token: CancellationToken,
    ) -> Self {
        Self {
            provider,
            writer,
            config,
            tracker,
            token,
            active: None,
        }
    }

    /// The configuration this sampler was built with.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Current state. A sampler whose provider closed its stream reports
    /// [`SamplerState::Stopped`].
    pub fn state(&self) -> SamplerState {
        match &self.active {
            Some(active) if !active.handle.is_finished() => SamplerState::Running,
            _ => SamplerState::Stopped,
        }
    }

    /// Subscribe to location updates. No-op while already running.
    ///
    /// Returns [`Error::PermissionDenied`] without permission; the sampler
    /// then stays stopped.
    pub async fn start(&mut self) -> Result<()> {
        if self.state() == SamplerState::Running {
            debug!("Sampler already running");
            return Ok(());
        }
        // Clear a subscription whose stream ended on its own
        self.active = None;

        let request = self.config.request();
        let updates = match self.provider.subscribe(&request).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Cannot start sampler with {}: {}", self.provider.name(), e);
                return Err(e);
            }
        };

        let token = self.token.child_token();
        let handle = self.tracker.spawn(forward(updates, self.writer.clone(), token.clone()));
        self.active = Some(ActiveSubscription { token, handle });

        info!(
            "Sampler started ({}, every {:?}, fastest {:?})",
            self.config.priority, self.config.update_interval, self.config.fastest_interval
        );
        Ok(())
    }

    /// Unsubscribe from location updates. No-op while stopped.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            debug!("Sampler already stopped");
            return;
        };

        active.token.cancel();
        if let Err(e) = active.handle.await {
            warn!("Sampler task ended abnormally: {}", e);
        }
        info!("Sampler stopped");
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.token.cancel();
        }
    }
}

async fn forward(mut updates: LocationUpdates, writer: SampleWriter, token: CancellationToken) {
    loop {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = updates.recv() => match next {
                Some(result) => result,
                None => {
                    info!("Location provider closed the update stream");
                    break;
                }
            },
        };

        match to_sample(&result, now_millis()) {
            Ok(sample) => {
                if !writer.submit(sample) {
                    debug!("Sample writer closed, stopping forwarder");
                    break;
                }
            }
            Err(Error::NoLocationAvailable) => trace!("Update without a location, skipping"),
            Err(e) => warn!("Dropping location update: {}", e),
        }
    }
    // Dropping `updates` unsubscribes from the provider
}

/// Convert a provider delivery into a sample stamped at `timestamp`.
fn to_sample(result: &LocationResult, timestamp: i64) -> Result<SpeedSample> {
    let location = result.last_location.ok_or(Error::NoLocationAvailable)?;
    if !location.has_valid_coordinates() {
        return Err(Error::InvalidLocation(format!(
            "({}, {})",
            location.latitude, location.longitude
        )));
    }
    Ok(SpeedSample::from_location(&location, timestamp))
}
