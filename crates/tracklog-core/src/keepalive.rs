//! Foreground keep-alive hook.
//!
//! While the background runner is active it promotes itself to a
//! user-visible state through a [`KeepAlive`] implementation. The host
//! decides what that means: a persistent desktop notification, an OS
//! foreground-service notice, or nothing more than a log line.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Title of the notice shown while tracking.
pub const TRACKING_NOTICE_TITLE: &str = "Location Tracking";

/// Body of the notice shown while tracking.
pub const TRACKING_NOTICE_BODY: &str = "Tracking your location";

/// How intrusive a notice should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeImportance {
    /// No sound, minimal visual presence.
    #[default]
    Low,
    /// Regular notification.
    Default,
    /// Interrupting notification.
    High,
}

/// User-visible notice attached to the promoted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub importance: NoticeImportance,
    /// Whether the user can dismiss the notice.
    pub ongoing: bool,
}

impl Notice {
    /// The persistent low-priority notice shown while sampling.
    pub fn tracking() -> Self {
        Self {
            title: TRACKING_NOTICE_TITLE.to_string(),
            body: TRACKING_NOTICE_BODY.to_string(),
            importance: NoticeImportance::Low,
            ongoing: true,
        }
    }
}

/// Host hook for promoting the runner to a foreground-visible state.
pub trait KeepAlive: Send + Sync {
    /// Enter the promoted state, showing `notice`.
    fn promote(&self, notice: &Notice) -> Result<()>;

    /// Leave the promoted state and withdraw the notice.
    fn demote(&self);
}

/// Keep-alive that only logs promotions.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogKeepAlive;

impl KeepAlive for LogKeepAlive {
    fn promote(&self, notice: &Notice) -> Result<()> {
        info!("{}: {}", notice.title, notice.body);
        Ok(())
    }

    fn demote(&self) {
        info!("Location tracking stopped");
    }
}
