//! Main store implementation.

use std::io::Write;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info};

use tracklog_types::SpeedSample;

use crate::error::{Error, Result};
use crate::models::StoredSample;
use crate::queries::{SAMPLE_COLUMNS, SampleQuery};
use crate::schema;

/// SQLite-based store for location+speed samples.
///
/// The store is append-only: samples can be inserted and queried, never
/// updated or deleted.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Append a sample, returning it with its assigned row ID.
    pub fn insert_sample(&self, sample: &SpeedSample) -> Result<StoredSample> {
        self.conn.execute(
            "INSERT INTO location_speed_data (timestamp, latitude, longitude, speed)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                sample.timestamp,
                sample.latitude,
                sample.longitude,
                sample.speed,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted sample {} at {}", id, sample.timestamp);

        Ok(StoredSample::from_sample(id, sample))
    }

    /// Up to `limit` samples, most recent timestamp first.
    pub fn recent(&self, limit: u32) -> Result<Vec<StoredSample>> {
        self.query_samples(&SampleQuery::recent(limit))
    }

    /// Query samples with filters.
    pub fn query_samples(&self, query: &SampleQuery) -> Result<Vec<StoredSample>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let samples = stmt
            .query_map(params_ref.as_slice(), sample_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(samples)
    }

    /// Get the most recent sample.
    pub fn latest_sample(&self) -> Result<Option<StoredSample>> {
        let sample = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM location_speed_data ORDER BY timestamp DESC, id DESC LIMIT 1",
                    SAMPLE_COLUMNS
                ),
                [],
                sample_from_row,
            )
            .optional()?;

        Ok(sample)
    }

    /// Count stored samples.
    pub fn count_samples(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM location_speed_data", [], |row| {
                    row.get(0)
                })?;

        Ok(count as u64)
    }

    /// Write samples matching `query` as CSV, returning the number of rows written.
    ///
    /// The header row is `id,timestamp,latitude,longitude,speed`.
    pub fn export_csv<W: Write>(&self, query: &SampleQuery, writer: W) -> Result<usize> {
        let samples = self.query_samples(query)?;
        let mut csv = csv::Writer::from_writer(writer);

        for sample in &samples {
            csv.serialize(sample)?;
        }
        csv.flush()?;

        info!("Exported {} samples to CSV", samples.len());
        Ok(samples.len())
    }
}

fn sample_from_row(row: &Row<'_>) -> rusqlite::Result<StoredSample> {
    Ok(StoredSample {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        speed: row.get(4)?,
    })
}
