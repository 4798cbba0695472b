//! Desktop keep-alive notice.
//!
//! With the `notifications` feature, promotion shows a persistent desktop
//! notification and demotion closes it again. Without the feature, or when
//! disabled in the config, the notice is only logged.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use tracklog_core::{KeepAlive, LogKeepAlive, Notice, NoticeImportance};

use crate::config::KeepAliveConfig;

/// A notice currently on screen.
struct Shown {
    title: String,
    #[cfg(all(feature = "notifications", target_os = "linux"))]
    handle: notify_rust::NotificationHandle,
}

/// Keep-alive that shows the tracking notice as a desktop notification.
///
/// At most one notice is shown at a time; promoting again replaces it.
#[derive(Default)]
pub struct DesktopKeepAlive {
    shown: Mutex<Option<Shown>>,
}

impl DesktopKeepAlive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tracking notice is currently shown.
    pub fn is_shown(&self) -> bool {
        self.lock_shown().is_some()
    }

    fn lock_shown(&self) -> MutexGuard<'_, Option<Shown>> {
        self.shown.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DesktopKeepAlive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopKeepAlive")
            .field("shown", &self.lock_shown().as_ref().map(|s| s.title.clone()))
            .finish()
    }
}

impl KeepAlive for DesktopKeepAlive {
    fn promote(&self, notice: &Notice) -> tracklog_core::Result<()> {
        let mut shown = self.lock_shown();
        if let Some(previous) = shown.take() {
            withdraw(previous);
        }
        *shown = Some(show(notice)?);
        debug!("Keep-alive notice shown: {}", notice.title);
        Ok(())
    }

    fn demote(&self) {
        if let Some(shown) = self.lock_shown().take() {
            debug!("Withdrawing keep-alive notice: {}", shown.title);
            withdraw(shown);
        }
        info!("Location tracking stopped");
    }
}

#[cfg(feature = "notifications")]
fn show(notice: &Notice) -> tracklog_core::Result<Shown> {
    use notify_rust::{Notification, Timeout};

    let mut notification = Notification::new();
    notification
        .summary(&notice.title)
        .body(&notice.body)
        .appname("tracklog");

    if notice.ongoing {
        notification.timeout(Timeout::Never);
    }

    #[cfg(target_os = "linux")]
    {
        let urgency = match notice.importance {
            NoticeImportance::Low => notify_rust::Urgency::Low,
            NoticeImportance::Default => notify_rust::Urgency::Normal,
            NoticeImportance::High => notify_rust::Urgency::Critical,
        };
        notification.urgency(urgency);
    }

    let handle = notification
        .show()
        .map_err(|e| tracklog_core::Error::KeepAlive(e.to_string()))?;

    #[cfg(target_os = "linux")]
    {
        Ok(Shown {
            title: notice.title.clone(),
            handle,
        })
    }

    // Other platforms cannot close a shown notification
    #[cfg(not(target_os = "linux"))]
    {
        let _ = handle;
        Ok(Shown {
            title: notice.title.clone(),
        })
    }
}

#[cfg(not(feature = "notifications"))]
fn show(notice: &Notice) -> tracklog_core::Result<Shown> {
    let level = match notice.importance {
        NoticeImportance::Low => "low",
        NoticeImportance::Default => "default",
        NoticeImportance::High => "high",
    };
    info!("{}: {} ({} priority)", notice.title, notice.body, level);
    Ok(Shown {
        title: notice.title.clone(),
    })
}

#[cfg(all(feature = "notifications", target_os = "linux"))]
fn withdraw(shown: Shown) {
    shown.handle.close();
}

#[cfg(not(all(feature = "notifications", target_os = "linux")))]
fn withdraw(_shown: Shown) {}

/// Pick the keep-alive hook for a configuration.
pub fn from_config(config: &KeepAliveConfig) -> Arc<dyn KeepAlive> {
    if config.notification {
        Arc::new(DesktopKeepAlive::new())
    } else {
        Arc::new(LogKeepAlive)
    }
}
