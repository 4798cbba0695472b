//! Background location tracker and HTTP REST API.
//!
//! This crate provides a service that:
//! - Runs the location sampling pipeline in the background
//! - Accepts permission outcomes and location fixes from the host
//! - Stores samples in the local database
//! - Exposes a REST API for tracking control and querying samples
//! - Renders the recent samples as a text log and a GeoJSON route
//! - Provides WebSocket connections for live snapshots
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Runner, provider and store status
//! - `POST /api/tracking/start` - Activate background tracking
//! - `POST /api/tracking/stop` - Deactivate background tracking
//! - `POST /api/permission` - Report a permission grant or denial
//! - `POST /api/location` - Deliver a location fix from the host
//! - `GET /api/samples` - Query samples with filters and pagination
//! - `GET /api/log` - Recent samples as plain text
//! - `GET /api/route` - Recent samples as a GeoJSON route
//! - `WS /api/ws` - Live recent-sample snapshots
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/tracklog/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [storage]
//! path = "~/.local/share/tracklog/location_speed.db"
//!
//! [sampling]
//! update_interval_secs = 10
//! fastest_interval_secs = 5
//! priority = "high_accuracy"
//! recent_limit = 1000
//! autostart = true
//!
//! [keepalive]
//! notification = true
//! ```

pub mod api;
pub mod config;
pub mod keepalive;
pub mod render;
pub mod state;
pub mod ws;

pub use config::{
    Config, ConfigError, KeepAliveConfig, SamplingConfig, ServerConfig, StorageConfig,
    ValidationError,
};
pub use keepalive::DesktopKeepAlive;
pub use render::{RouteOverlay, log_line, text_log};
pub use state::{AppState, ProviderHandle};
