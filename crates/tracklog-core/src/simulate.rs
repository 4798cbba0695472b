//! Simulated location provider for demos and testing.
//!
//! [`SimulatedProvider`] emits a synthetic route at the requested interval:
//! a point walking from a start position along a slowly drifting heading,
//! with jittered speed and the occasional tick that has no fix.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use tracklog_types::{Location, LocationRequest, LocationResult};

use crate::error::{Error, Result};
use crate::provider::{LocationProvider, LocationUpdates};

/// Metres per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Maximum heading change per tick, in degrees.
const MAX_HEADING_DRIFT: f64 = 5.0;

/// Route parameters for [`SimulatedProvider`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    /// Starting latitude.
    pub latitude: f64,
    /// Starting longitude.
    pub longitude: f64,
    /// Initial heading in degrees clockwise from north.
    pub heading: f64,
    /// Mean speed in m/s.
    pub speed: f32,
    /// Maximum random deviation from `speed`, in m/s.
    pub jitter: f32,
    /// Probability in `[0, 1]` that a tick carries no fix.
    pub gap_rate: f64,
    /// Whether location permission starts out granted.
    pub permission_granted: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latitude: 59.3293,
            longitude: 18.0686,
            heading: 45.0,
            speed: 1.4,
            jitter: 0.3,
            gap_rate: 0.0,
            permission_granted: true,
        }
    }
}

/// Builder for [`SimulatedProvider`].
#[derive(Debug, Clone, Default)]
pub struct SimulatedProviderBuilder {
    config: SimulationConfig,
}

impl SimulatedProviderBuilder {
    /// Set the starting position.
    #[must_use]
    pub fn start(mut self, latitude: f64, longitude: f64) -> Self {
        self.config.latitude = latitude;
        self.config.longitude = longitude;
        self
    }

    /// Set the initial heading in degrees.
    #[must_use]
    pub fn heading(mut self, degrees: f64) -> Self {
        self.config.heading = degrees;
        self
    }

    /// Set the mean speed in m/s.
    #[must_use]
    pub fn speed(mut self, speed: f32) -> Self {
        self.config.speed = speed.max(0.0);
        self
    }

    /// Set the maximum speed deviation in m/s.
    #[must_use]
    pub fn jitter(mut self, jitter: f32) -> Self {
        self.config.jitter = jitter.max(0.0);
        self
    }

    /// Set the probability that a tick reports no fix.
    #[must_use]
    pub fn gap_rate(mut self, rate: f64) -> Self {
        self.config.gap_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the initial permission state.
    #[must_use]
    pub fn permission_granted(mut self, granted: bool) -> Self {
        self.config.permission_granted = granted;
        self
    }

    /// Build the provider.
    pub fn build(self) -> SimulatedProvider {
        SimulatedProvider::new(self.config)
    }
}

/// Timer-driven provider walking a synthetic route.
#[derive(Debug)]
pub struct SimulatedProvider {
    config: SimulationConfig,
    /// Position and heading, carried across subscriptions.
    position: Arc<Mutex<Walker>>,
    permission: watch::Sender<bool>,
}

impl SimulatedProvider {
    /// Create a provider from a full configuration.
    pub fn new(config: SimulationConfig) -> Self {
        let (permission, _) = watch::channel(config.permission_granted);
        Self {
            position: Arc::new(Mutex::new(Walker::from_config(&config))),
            config,
            permission,
        }
    }

    /// Start building a provider.
    pub fn builder() -> SimulatedProviderBuilder {
        SimulatedProviderBuilder::default()
    }

    /// Grant or revoke permission.
    pub fn set_permission(&self, granted: bool) {
        self.permission.send_replace(granted);
    }

    /// Route parameters.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current simulated position.
    pub fn position(&self) -> Location {
        let walker = lock_walker(&self.position);
        Location::new(walker.latitude, walker.longitude, self.config.speed)
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

#[async_trait]
impl LocationProvider for SimulatedProvider {
    fn name(&self) -> &str {
        "simulator"
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

        let (tx, rx) = mpsc::channel(16);
        let position = Arc::clone(&self.position);
        let config = self.config;
        let period = request.interval.max(Duration::from_millis(1));

        info!("Simulating a route every {:?}", period);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                }

                let result = lock_walker(&position).step(&config, period);
                if tx.send(result).await.is_err() {
                    break;
                }
            }
            debug!("Simulated route subscription ended");
        });

        Ok(LocationUpdates::new(rx))
    }
}

fn lock_walker(position: &Mutex<Walker>) -> MutexGuard<'_, Walker> {
    position.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Position and heading of the simulated walker.
#[derive(Debug, Clone, Copy)]
struct Walker {
    latitude: f64,
    longitude: f64,
    heading: f64,
}

impl Walker {
    fn from_config(config: &SimulationConfig) -> Self {
        Self {
            latitude: config.latitude,
            longitude: config.longitude,
            heading: config.heading,
        }
    }

    /// Advance one tick of `elapsed` and report the resulting fix.
    fn step(&mut self, config: &SimulationConfig, elapsed: Duration) -> LocationResult {
        let mut rng = rand::rng();

        let gap_rate = config.gap_rate.clamp(0.0, 1.0);
        if gap_rate > 0.0 && rng.random_bool(gap_rate) {
            return LocationResult::empty();
        }

        let jitter = if config.jitter > 0.0 {
            rng.random_range(-config.jitter..=config.jitter)
        } else {
            0.0
        };
        let speed = (config.speed + jitter).max(0.0);

        self.heading = (self.heading + rng.random_range(-MAX_HEADING_DRIFT..=MAX_HEADING_DRIFT))
            .rem_euclid(360.0);
        let distance = f64::from(speed) * elapsed.as_secs_f64();
        let heading = self.heading.to_radians();
        let lat_scale = self.latitude.to_radians().cos().max(0.01);

        self.latitude = (self.latitude + distance * heading.cos() / METERS_PER_DEGREE)
            .clamp(-89.9, 89.9);
        self.longitude += distance * heading.sin() / (METERS_PER_DEGREE * lat_scale);
        if self.longitude > 180.0 {
            self.longitude -= 360.0;
        } else if self.longitude < -180.0 {
            self.longitude += 360.0;
        }

        LocationResult::with_location(Location::new(self.latitude, self.longitude, speed))
    }
}
