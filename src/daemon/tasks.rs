use super::{restart_worker, spawn_detached_installer, system_controller, TaskError};
use crate::{
    config::Config,
    status::MessageLevel,
    updater::{DownloadOutcome, InstallOutcome, UpdateState},
};
use std::path::Path;

pub const INSTALL_SUCCEEDED_MESSAGE: &str = "Upgrade completed successfully!";

pub const INSTALL_FAILED_MESSAGE: &str = "Upgrade failed during installation.";

/// Polls for updates, continuing on to download them when automatic downloads are enabled.
pub fn check_updates(config: &Config, config_path: &Path) -> Result<Vec<String>, TaskError> {
    let mut controller = system_controller(config, UpdateState::UpdateCheckFailed).map_err(|why| {
        error!("updater raised '{}' during update check", why);
        why
    })?;

    let packages = controller.poll().map_err(TaskError::Check)?;

    if !packages.is_empty() && config.auto_download {
        info!("auto starting download of {} packages", packages.len());
        drop(controller);
        download_updates(config, config_path, config.auto_install)?;
    }

    Ok(packages)
}

/// Downloads updates, then spawns the detached installer if `auto_install` is set and every
/// package was fetched.
pub fn download_updates(
    config: &Config,
    config_path: &Path,
    auto_install: bool,
) -> Result<DownloadOutcome, TaskError> {
    let mut controller = system_controller(config, UpdateState::DownloadFailed).map_err(|why| {
        error!("updater raised '{}' during a download", why);
        why
    })?;

    let outcome = controller.download().map_err(TaskError::Download)?;
    let packages = outcome.packages();

    if outcome.succeeded() && !packages.is_empty() && auto_install {
        let pid = spawn_detached_installer(config_path).map_err(|why| {
            error!("failed to start the detached installer: {}", why);
            controller.publish_failure(UpdateState::InstallFailed);
            TaskError::Detach(why)
        })?;

        info!("auto starting install of {} packages in process {}", packages.len(), pid);
    } else {
        info!("finished downloading {} packages", packages.len());
    }

    Ok(outcome)
}

/// The body of the detached installer process.
///
/// The background task worker is started afterwards whether or not the install succeeded.
pub fn run_detached_install(config: &Config) -> Result<InstallOutcome, TaskError> {
    let result = install(config);
    restart_worker(&config.worker_service);
    result
}

fn install(config: &Config) -> Result<InstallOutcome, TaskError> {
    let mut controller = system_controller(config, UpdateState::InstallFailed).map_err(|why| {
        error!("updater raised '{}' before installing", why);
        why
    })?;

    let outcome = controller.install().map_err(TaskError::Install)?;

    if outcome.succeeded() {
        controller.notify(MessageLevel::Success, INSTALL_SUCCEEDED_MESSAGE);
    } else {
        controller.notify(MessageLevel::Error, INSTALL_FAILED_MESSAGE);
    }

    Ok(outcome)
}
