//! Local data persistence for location+speed samples.
//!
//! This crate provides SQLite-based storage for the sample log: an
//! append-only `location_speed_data` table queried newest-first with a cap.
//!
//! # Features
//!
//! - Append samples with monotonically increasing row IDs
//! - Query the most recent N samples, or filter by time range with pagination
//! - CSV export
//!
//! # Example
//!
//! ```no_run
//! use tracklog_store::Store;
//! use tracklog_types::SpeedSample;
//!
//! let store = Store::open_default()?;
//! store.insert_sample(&SpeedSample::new(1_700_000_000_000, 59.33, 18.06, 1.4))?;
//!
//! for sample in store.recent(10)? {
//!     println!("{} {} {}", sample.id, sample.latitude, sample.longitude);
//! }
//! # Ok::<(), tracklog_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::StoredSample;
pub use queries::SampleQuery;
pub use schema::{SAMPLE_TABLE, SCHEMA_VERSION};
pub use store::Store;

/// File name of the sample database.
pub const DB_FILE_NAME: &str = "location_speed.db";

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/tracklog/location_speed.db`
/// - macOS: `~/Library/Application Support/tracklog/location_speed.db`
/// - Windows: `C:\Users\<user>\AppData\Local\tracklog\location_speed.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("tracklog")
        .join(DB_FILE_NAME)
}
