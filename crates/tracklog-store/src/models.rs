//! Data models for stored data.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use tracklog_types::{SpeedSample, millis_to_datetime};

/// A location+speed sample stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredSample {
    /// Database row ID, strictly increasing in insertion order.
    pub id: i64,
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Speed in m/s.
    pub speed: f32,
}

impl StoredSample {
    /// Create a StoredSample from a captured sample and its assigned row ID.
    pub fn from_sample(id: i64, sample: &SpeedSample) -> Self {
        Self {
            id,
            timestamp: sample.timestamp,
            latitude: sample.latitude,
            longitude: sample.longitude,
            speed: sample.speed,
        }
    }

    /// Convert to a SpeedSample.
    pub fn to_sample(&self) -> SpeedSample {
        SpeedSample {
            timestamp: self.timestamp,
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
        }
    }

    /// Capture time as an `OffsetDateTime`, if representable.
    pub fn captured_at(&self) -> Option<OffsetDateTime> {
        millis_to_datetime(self.timestamp)
    }
}
