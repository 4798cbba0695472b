//! Service management for tracklog-service.
//!
//! Installs the binary with the native service manager so tracking survives
//! logout and reboot. The restart policy follows the runner's [`StartMode`].

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use service_manager::{
    RestartPolicy, ServiceInstallCtx, ServiceLabel, ServiceLevel, ServiceManager, ServiceStartCtx,
    ServiceStatusCtx, ServiceStopCtx, ServiceUninstallCtx,
};
use thiserror::Error;

use tracklog_core::StartMode;

/// Service label for tracklog
const SERVICE_LABEL: &str = "com.github.cameronrye.tracklog";

/// Delay before the service manager restarts a killed service.
const RESTART_DELAY_SECS: u32 = 5;

/// Errors that can occur during service management.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No service manager available on this platform")]
    NoServiceManager,

    #[error("Service manager error: {0}")]
    Manager(String),

    #[error("Could not find tracklog-service executable")]
    ExecutableNotFound,

    #[error("User-level services not supported on this platform")]
    UserLevelNotSupported,
}

/// Service management level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Level {
    /// System-level service (requires root/admin)
    #[default]
    System,
    /// User-level service (no elevated privileges needed)
    User,
}

impl Level {
    /// `User` when `user` is set, `System` otherwise.
    pub fn from_user_flag(user: bool) -> Self {
        if user { Level::User } else { Level::System }
    }
}

/// Service status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    NotInstalled,
}

impl From<service_manager::ServiceStatus> for ServiceStatus {
    fn from(status: service_manager::ServiceStatus) -> Self {
        match status {
            service_manager::ServiceStatus::Running => ServiceStatus::Running,
            service_manager::ServiceStatus::Stopped(_) => ServiceStatus::Stopped,
            service_manager::ServiceStatus::NotInstalled => ServiceStatus::NotInstalled,
        }
    }
}

/// Restart policy matching a runner start mode.
pub fn restart_policy(mode: StartMode) -> RestartPolicy {
    match mode {
        StartMode::Sticky => RestartPolicy::Always {
            delay_secs: Some(RESTART_DELAY_SECS),
        },
        StartMode::NotSticky => RestartPolicy::Never,
    }
}

fn get_manager(level: Level) -> Result<Box<dyn ServiceManager>, ServiceError> {
    let mut manager = <dyn ServiceManager>::native().map_err(|_| ServiceError::NoServiceManager)?;

    let service_level = match level {
        Level::System => ServiceLevel::System,
        Level::User => ServiceLevel::User,
    };

    manager
        .set_level(service_level)
        .map_err(|_| ServiceError::UserLevelNotSupported)?;

    Ok(manager)
}

fn get_executable_path() -> Result<PathBuf, ServiceError> {
    env::current_exe().map_err(|_| ServiceError::ExecutableNotFound)
}

fn get_label() -> Result<ServiceLabel, ServiceError> {
    SERVICE_LABEL
        .parse()
        .map_err(|e: std::io::Error| ServiceError::Manager(e.to_string()))
}

/// Install tracklog-service with the given restart behavior.
pub fn install(level: Level, mode: StartMode) -> Result<(), ServiceError> {
    let manager = get_manager(level)?;
    let program = get_executable_path()?;
    let label = get_label()?;

    manager
        .install(ServiceInstallCtx {
            label,
            program,
            args: vec![OsString::from("run")],
            contents: None,
            username: None,
            working_directory: None,
            environment: None,
            autostart: true,
            restart_policy: restart_policy(mode),
        })
        .map_err(|e| ServiceError::Manager(e.to_string()))
}

/// Uninstall the tracklog-service service.
pub fn uninstall(level: Level) -> Result<(), ServiceError> {
    let manager = get_manager(level)?;
    let label = get_label()?;

    manager
        .uninstall(ServiceUninstallCtx { label })
        .map_err(|e| ServiceError::Manager(e.to_string()))
}

/// Start the tracklog-service service.
pub fn start(level: Level) -> Result<(), ServiceError> {
    let manager = get_manager(level)?;
    let label = get_label()?;

    manager
        .start(ServiceStartCtx { label })
        .map_err(|e| ServiceError::Manager(e.to_string()))
}

/// Stop the tracklog-service service.
pub fn stop(level: Level) -> Result<(), ServiceError> {
    let manager = get_manager(level)?;
    let label = get_label()?;

    manager
        .stop(ServiceStopCtx { label })
        .map_err(|e| ServiceError::Manager(e.to_string()))
}

/// Get the status of the tracklog-service.
///
/// Asks the native service manager; a running service is left untouched.
pub fn status(level: Level) -> Result<ServiceStatus, ServiceError> {
    let manager = get_manager(level)?;
    let label = get_label()?;

    manager
        .status(ServiceStatusCtx { label })
        .map(ServiceStatus::from)
        .map_err(|e| ServiceError::Manager(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parses() {
        let label = get_label().unwrap();
        assert_eq!(label.to_qualified_name(), SERVICE_LABEL);
    }

    #[test]
    fn test_sticky_restarts_always() {
        assert!(matches!(
            restart_policy(StartMode::Sticky),
            RestartPolicy::Always {
                delay_secs: Some(5)
            }
        ));
        assert!(matches!(
            restart_policy(StartMode::NotSticky),
            RestartPolicy::Never
        ));
    }

    #[test]
    fn test_level_from_user_flag() {
        assert_eq!(Level::from_user_flag(true), Level::User);
        assert_eq!(Level::from_user_flag(false), Level::System);
    }

    #[test]
    fn test_status_from_manager() {
        assert_eq!(
            ServiceStatus::from(service_manager::ServiceStatus::Running),
            ServiceStatus::Running
        );
        assert_eq!(
            ServiceStatus::from(service_manager::ServiceStatus::Stopped(Some(
                "inactive".to_string()
            ))),
            ServiceStatus::Stopped
        );
        assert_eq!(
            ServiceStatus::from(service_manager::ServiceStatus::NotInstalled),
            ServiceStatus::NotInstalled
        );
    }
}
