//! Query builder for stored samples.
//!
//! [`SampleQuery`] follows the builder pattern for filtering and paginating
//! the sample log. Time bounds are epoch milliseconds, matching the
//! `timestamp` column.
//!
//! # Example
//!
//! ```
//! use tracklog_store::{SampleQuery, Store};
//!
//! let store = Store::open_in_memory()?;
//!
//! // The 50 most recent samples captured after a given instant
//! let query = SampleQuery::new()
//!     .since(1_700_000_000_000)
//!     .limit(50);
//! let samples = store.query_samples(&query)?;
//!
//! // Everything, in capture order, for export
//! let all = store.query_samples(&SampleQuery::new().oldest_first())?;
//! # assert!(samples.is_empty() && all.is_empty());
//! # Ok::<(), tracklog_store::Error>(())
//! ```

/// Columns selected by every sample query, in [`StoredSample`](crate::StoredSample) field order.
pub(crate) const SAMPLE_COLUMNS: &str = "id, timestamp, latitude, longitude, speed";

/// Fluent query builder for stored samples.
///
/// Use this to construct queries for [`Store::query_samples`](crate::Store::query_samples).
/// All filter methods are optional and can be chained in any order.
///
/// By default, queries return results ordered by `timestamp` descending
/// (most recent first). Samples sharing a timestamp are ordered by row ID
/// in the same direction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SampleQuery {
    /// Filter samples captured at or after this time (epoch ms).
    pub since: Option<i64>,
    /// Filter samples captured at or before this time (epoch ms).
    pub until: Option<i64>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by timestamp descending (newest first).
    pub newest_first: bool,
}

impl SampleQuery {
    /// Create a new query with default settings.
    ///
    /// Default behavior:
    /// - No time range filter
    /// - No limit (all matching samples)
    /// - Ordered by newest first
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Query for the `limit` most recent samples.
    pub fn recent(limit: u32) -> Self {
        Self::new().limit(limit)
    }

    /// Filter to samples captured at or after this time (epoch ms).
    pub fn since(mut self, millis: i64) -> Self {
        self.since = Some(millis);
        self
    }

    /// Filter to samples captured at or before this time (epoch ms).
    pub fn until(mut self, millis: i64) -> Self {
        self.until = Some(millis);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    ///
    /// Use with `limit()` for pagination. For example, to get page 2
    /// with 50 items per page: `.limit(50).offset(50)`.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order results by oldest first (ascending by `timestamp`).
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(since));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(until));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT {} FROM location_speed_data {} ORDER BY timestamp {}, id {}",
            SAMPLE_COLUMNS, where_clause, order, order
        );

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            // SQLite only accepts OFFSET after a LIMIT clause
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        sql
    }
}
