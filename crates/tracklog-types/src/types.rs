//! Core types for location and speed samples.

use core::fmt;
use core::str::FromStr;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Accuracy/power trade-off requested from a location provider.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new priorities
/// in future versions without breaking downstream code.
///
/// # Examples
///
/// ```
/// use tracklog_types::Priority;
///
/// assert_eq!("high_accuracy".parse::<Priority>(), Ok(Priority::HighAccuracy));
/// assert_eq!(Priority::LowPower.to_string(), "low_power");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum Priority {
    /// Most precise fix available (GPS).
    #[default]
    HighAccuracy,
    /// Block-level accuracy, lower power draw.
    BalancedPowerAccuracy,
    /// City-level accuracy.
    LowPower,
    /// Only receive fixes other clients requested.
    Passive,
}

impl Priority {
    /// Canonical snake_case name, as used in configuration files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::HighAccuracy => "high_accuracy",
            Priority::BalancedPowerAccuracy => "balanced_power_accuracy",
            Priority::LowPower => "low_power",
            Priority::Passive => "passive",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "high_accuracy" | "high" => Ok(Priority::HighAccuracy),
            "balanced_power_accuracy" | "balanced" => Ok(Priority::BalancedPowerAccuracy),
            "low_power" | "low" => Ok(Priority::LowPower),
            "passive" | "no_power" => Ok(Priority::Passive),
            _ => Err(ParseError::UnknownPriority(s.to_string())),
        }
    }
}

/// Parameters of a location-update subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocationRequest {
    /// Desired interval between updates.
    pub interval: Duration,
    /// Fastest rate at which updates will be accepted.
    pub fastest_interval: Duration,
    /// Accuracy priority.
    pub priority: Priority,
}

impl LocationRequest {
    /// Create a request with the given intervals and priority.
    pub fn new(interval: Duration, fastest_interval: Duration, priority: Priority) -> Self {
        Self {
            interval,
            fastest_interval,
            priority,
        }
    }
}

/// A single position fix as delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Ground speed in m/s. Providers report 0 when stationary or unknown.
    pub speed: f32,
}

impl Location {
    /// Create a new location fix.
    pub fn new(latitude: f64, longitude: f64, speed: f32) -> Self {
        Self {
            latitude,
            longitude,
            speed,
        }
    }

    /// Whether the coordinates are finite and inside WGS84 bounds.
    ///
    /// ```
    /// use tracklog_types::Location;
    ///
    /// assert!(Location::new(59.33, 18.06, 1.2).has_valid_coordinates());
    /// assert!(!Location::new(91.0, 0.0, 0.0).has_valid_coordinates());
    /// assert!(!Location::new(f64::NAN, 0.0, 0.0).has_valid_coordinates());
    /// ```
    #[must_use]
    pub fn has_valid_coordinates(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One delivery from a location-update stream.
///
/// A result may carry no location when the provider has no fix yet.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocationResult {
    /// Most recent fix known to the provider, if any.
    pub last_location: Option<Location>,
}

impl LocationResult {
    /// A result carrying a fix.
    pub fn with_location(location: Location) -> Self {
        Self {
            last_location: Some(location),
        }
    }

    /// A result without a fix.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A captured location+speed sample, not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedSample {
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Speed in m/s, never negative.
    pub speed: f32,
}

impl SpeedSample {
    /// Create a sample, normalizing the speed.
    pub fn new(timestamp: i64, latitude: f64, longitude: f64, speed: f32) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            speed: normalize_speed(speed),
        }
    }

    /// Build a sample from a platform fix stamped at `timestamp` (epoch ms).
    pub fn from_location(location: &Location, timestamp: i64) -> Self {
        Self::new(
            timestamp,
            location.latitude,
            location.longitude,
            location.speed,
        )
    }

    /// Capture time as an `OffsetDateTime`, if representable.
    pub fn captured_at(&self) -> Option<time::OffsetDateTime> {
        millis_to_datetime(self.timestamp)
    }
}

/// Clamp a reported speed to a finite, non-negative value.
///
/// ```
/// use tracklog_types::normalize_speed;
///
/// assert_eq!(normalize_speed(3.5), 3.5);
/// assert_eq!(normalize_speed(-1.0), 0.0);
/// assert_eq!(normalize_speed(f32::NAN), 0.0);
/// ```
#[must_use]
pub fn normalize_speed(speed: f32) -> f32 {
    if speed.is_finite() && speed > 0.0 {
        speed
    } else {
        0.0
    }
}

/// Convert epoch milliseconds into an `OffsetDateTime`.
pub fn millis_to_datetime(millis: i64) -> Option<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

/// Convert an `OffsetDateTime` into epoch milliseconds.
pub fn datetime_to_millis(datetime: time::OffsetDateTime) -> i64 {
    (datetime.unix_timestamp_nanos() / 1_000_000) as i64
}
