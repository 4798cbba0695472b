//! Presentation renderers for sample snapshots.
//!
//! Both renderers take the newest-first snapshot produced by the observable
//! query. Times are shown in UTC.

use std::fmt::Write;

use serde::Serialize;
use serde_json::{Value, json};

use tracklog_store::StoredSample;

/// Zoom level used when centring the map on a route.
pub const ROUTE_ZOOM: f32 = 15.0;

/// Wall-clock time of a sample as `HH:MM:SS`, or `--:--:--` if unrepresentable.
pub fn clock_time(sample: &StoredSample) -> String {
    match sample.captured_at() {
        Some(at) => format!("{:02}:{:02}:{:02}", at.hour(), at.minute(), at.second()),
        None => "--:--:--".to_string(),
    }
}

/// One log line for a sample.
///
/// ```
/// use tracklog_service::render::log_line;
/// use tracklog_store::StoredSample;
///
/// let sample = StoredSample { id: 7, timestamp: 3_723_000, latitude: 1.0, longitude: 2.5, speed: 3.0 };
/// assert_eq!(
///     log_line(&sample),
///     "ID: 7, Lat: 1.0, Lon: 2.5, Speed: 3.0 m/s, Time: 01:02:03"
/// );
/// ```
pub fn log_line(sample: &StoredSample) -> String {
    format!(
        "ID: {}, Lat: {:?}, Lon: {:?}, Speed: {:?} m/s, Time: {}",
        sample.id,
        sample.latitude,
        sample.longitude,
        sample.speed,
        clock_time(sample)
    )
}

/// The whole snapshot as a text log, one line per sample, in snapshot order.
pub fn text_log(samples: &[StoredSample]) -> String {
    let mut out = String::new();
    for sample in samples {
        // Writing to a String cannot fail
        let _ = writeln!(out, "{}", log_line(sample));
    }
    out
}

/// A map marker for one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteMarker {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// `Speed: {speed} m/s`
    pub title: String,
    /// `HH:MM:SS`
    pub snippet: String,
}

/// Where the map camera points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapCenter {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f32,
}

/// Polyline plus markers for a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOverlay {
    /// Polyline vertices as `(latitude, longitude)`, in snapshot order.
    pub path: Vec<(f64, f64)>,
    pub markers: Vec<RouteMarker>,
    /// Last point of the snapshot, if any.
    pub center: Option<MapCenter>,
}

impl RouteOverlay {
    /// Build the overlay for a snapshot.
    pub fn from_samples(samples: &[StoredSample]) -> Self {
        let path = samples.iter().map(|s| (s.latitude, s.longitude)).collect();
        let markers = samples
            .iter()
            .map(|s| RouteMarker {
                id: s.id,
                latitude: s.latitude,
                longitude: s.longitude,
                title: format!("Speed: {:?} m/s", s.speed),
                snippet: clock_time(s),
            })
            .collect();
        let center = samples.last().map(|s| MapCenter {
            latitude: s.latitude,
            longitude: s.longitude,
            zoom: ROUTE_ZOOM,
        });

        Self {
            path,
            markers,
            center,
        }
    }

    /// Render as a GeoJSON `FeatureCollection`.
    ///
    /// The polyline is a `LineString` feature (omitted below two points), each
    /// marker a `Point` feature. The camera is carried in a top-level
    /// `center` member.
    pub fn to_geojson(&self) -> Value {
        let mut features = Vec::with_capacity(self.markers.len() + 1);

        if self.path.len() >= 2 {
            let coordinates: Vec<[f64; 2]> =
                self.path.iter().map(|&(lat, lon)| [lon, lat]).collect();
            features.push(json!({
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": coordinates },
                "properties": { "kind": "route" },
            }));
        }

        for marker in &self.markers {
            features.push(json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [marker.longitude, marker.latitude],
                },
                "properties": {
                    "kind": "marker",
                    "id": marker.id,
                    "title": marker.title,
                    "snippet": marker.snippet,
                },
            }));
        }

        json!({
            "type": "FeatureCollection",
            "features": features,
            "center": self.center,
        })
    }
}
