//! Platform-agnostic types for background location and speed tracking.
//!
//! This crate provides shared value types used by the store, the sampling
//! pipeline, and the service.
//!
//! # Features
//!
//! - Platform fix and delivery types ([`Location`], [`LocationResult`])
//! - Subscription parameters ([`LocationRequest`], [`Priority`])
//! - Captured samples ([`SpeedSample`]) with speed normalization
//! - Epoch-millisecond conversions
//!
//! # Example
//!
//! ```
//! use tracklog_types::{Location, SpeedSample};
//!
//! let fix = Location::new(59.3293, 18.0686, -0.2);
//! let sample = SpeedSample::from_location(&fix, 1_700_000_000_000);
//! assert_eq!(sample.speed, 0.0);
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    Location, LocationRequest, LocationResult, Priority, SpeedSample, datetime_to_millis,
    millis_to_datetime, normalize_speed,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // --- Priority tests ---

    #[test]
    fn test_priority_default_is_high_accuracy() {
        assert_eq!(Priority::default(), Priority::HighAccuracy);
    }

    #[test]
    fn test_priority_from_str_aliases() {
        assert_eq!("HIGH_ACCURACY".parse::<Priority>(), Ok(Priority::HighAccuracy));
        assert_eq!("balanced".parse::<Priority>(), Ok(Priority::BalancedPowerAccuracy));
        assert_eq!("low-power".parse::<Priority>(), Ok(Priority::LowPower));
        assert_eq!(" passive ".parse::<Priority>(), Ok(Priority::Passive));
    }

    #[test]
    fn test_priority_from_str_unknown() {
        let err = "turbo".parse::<Priority>().unwrap_err();
        assert_eq!(err, ParseError::UnknownPriority("turbo".to_string()));
        assert_eq!(err.to_string(), "Unknown priority: turbo");
    }

    #[test]
    fn test_priority_display_matches_parse() {
        for p in [
            Priority::HighAccuracy,
            Priority::BalancedPowerAccuracy,
            Priority::LowPower,
            Priority::Passive,
        ] {
            assert_eq!(p.to_string().parse::<Priority>(), Ok(p));
        }
    }

    // --- Location tests ---

    #[test]
    fn test_location_bounds() {
        assert!(Location::new(90.0, 180.0, 0.0).has_valid_coordinates());
        assert!(Location::new(-90.0, -180.0, 0.0).has_valid_coordinates());
        assert!(!Location::new(0.0, 180.5, 0.0).has_valid_coordinates());
        assert!(!Location::new(f64::INFINITY, 0.0, 0.0).has_valid_coordinates());
    }

    #[test]
    fn test_location_result_empty() {
        assert!(LocationResult::empty().last_location.is_none());
        let fix = Location::new(1.0, 2.0, 3.0);
        assert_eq!(LocationResult::with_location(fix).last_location, Some(fix));
    }

    // --- SpeedSample tests ---

    #[test]
    fn test_speed_sample_from_location() {
        let fix = Location::new(1.1, 2.1, 4.5);
        let sample = SpeedSample::from_location(&fix, 200);

        assert_eq!(sample.timestamp, 200);
        assert_eq!(sample.latitude, 1.1);
        assert_eq!(sample.longitude, 2.1);
        assert_eq!(sample.speed, 4.5);
    }

    #[test]
    fn test_speed_sample_normalizes_speed() {
        assert_eq!(SpeedSample::new(0, 0.0, 0.0, -3.0).speed, 0.0);
        assert_eq!(SpeedSample::new(0, 0.0, 0.0, f32::INFINITY).speed, 0.0);
        assert_eq!(SpeedSample::new(0, 0.0, 0.0, 0.0).speed, 0.0);
    }

    #[test]
    fn test_speed_sample_captured_at() {
        let sample = SpeedSample::new(1_500, 0.0, 0.0, 0.0);
        let at = sample.captured_at().unwrap();
        assert_eq!(at.unix_timestamp(), 1);
        assert_eq!(at.millisecond(), 500);
    }

    #[test]
    fn test_millis_roundtrip() {
        let at = millis_to_datetime(1_700_000_123_456).unwrap();
        assert_eq!(datetime_to_millis(at), 1_700_000_123_456);
    }

    #[test]
    fn test_location_request_new() {
        let req = LocationRequest::new(
            Duration::from_secs(10),
            Duration::from_secs(5),
            Priority::HighAccuracy,
        );
        assert_eq!(req.interval, Duration::from_secs(10));
        assert_eq!(req.fastest_interval, Duration::from_secs(5));
    }

    // --- Serialization tests ---

    #[test]
    fn test_priority_serialization() {
        assert_eq!(
            serde_json::to_string(&Priority::HighAccuracy).unwrap(),
            "\"high_accuracy\""
        );
        let p: Priority = serde_json::from_str("\"low_power\"").unwrap();
        assert_eq!(p, Priority::LowPower);
    }

    #[test]
    fn test_speed_sample_serialization() {
        let sample = SpeedSample::new(100, 1.0, 2.0, 3.0);
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"timestamp\":100"));
        assert!(json.contains("\"speed\":3.0"));
    }
}
