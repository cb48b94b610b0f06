mod detach;
mod scheduler;
mod tasks;

pub use self::{
    detach::{restart_worker, spawn_detached_installer},
    scheduler::run_scheduler,
    tasks::{
        check_updates, download_updates, run_detached_install, INSTALL_FAILED_MESSAGE,
        INSTALL_SUCCEEDED_MESSAGE,
    },
};

use crate::{
    apt::AptIndex,
    config::Config,
    host::{Host, NodeRole, SystemHost},
    status::{NullSink, StatusFile, StatusSink},
    updater::{ConfigError, Controller, UpdateError, UpdateState},
};
use std::io;
use thiserror::Error;

pub type SystemController = Controller<AptIndex, Box<dyn StatusSink>, SystemHost>;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to set up the updater")]
    Config(#[from] ConfigError),

    #[error("update check failed")]
    Check(#[source] UpdateError),

    #[error("package download failed")]
    Download(#[source] UpdateError),

    #[error("package install failed")]
    Install(#[source] UpdateError),

    #[error("failed to start the detached installer")]
    Detach(#[source] io::Error),

    #[error("failed to start the scheduler runtime")]
    Runtime(#[source] io::Error),
}

/// Only the head node publishes status. Other hosts get a sink which discards it.
pub fn status_sink(config: &Config, role: NodeRole) -> Box<dyn StatusSink> {
    match role {
        NodeRole::Master => {
            Box::new(StatusFile::new(config.status_file.clone(), config.message_file.clone()))
        }
        NodeRole::Compute => Box::new(NullSink),
    }
}

/// Detects the node role, then builds the controller for it.
///
/// If the package list cannot be read, `failure` is published in place of the controller. A
/// host of unknown role has no status record to publish it to.
pub fn system_controller(
    config: &Config,
    failure: UpdateState,
) -> Result<SystemController, ConfigError> {
    let host = SystemHost::new(config);
    let role = host.node_role()?;

    Controller::with_role(config.clone(), role, AptIndex::new(), status_sink(config, role), host)
        .map_err(|why| {
            let mut sink = status_sink(config, role);
            if let Err(why) = sink.set_status(failure.into()) {
                warn!("failed to publish status {:?}: {:#}", <&str>::from(failure), why);
            }

            ConfigError::from(why)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};

    fn config(dir: &Path, conf: &str) -> Config {
        fs::write(dir.join("tsconf.conf"), conf).unwrap();

        Config {
            node_conf: dir.join("tsconf.conf"),
            master_marker: dir.join(".masternode"),
            compute_marker: dir.join(".computenode"),
            status_file: dir.join("status.json"),
            message_file: dir.join("messages.jsonl"),
            package_list: dir.join("absent.json"),
            ..Config::default()
        }
    }

    #[test]
    fn master_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "mode:master\n");

        let result = system_controller(&config, UpdateState::UpdateCheckFailed);
        assert!(matches!(result, Err(ConfigError::Manifest(_))));

        let record = StatusFile::read(&config.status_file).unwrap().unwrap();
        assert_eq!(record.ts_update_status, "Update failure");
    }

    #[test]
    fn compute_failure_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "mode:compute\n");

        let result = system_controller(&config, UpdateState::DownloadFailed);
        assert!(matches!(result, Err(ConfigError::Manifest(_))));
        assert!(!config.status_file.exists());
    }

    #[test]
    fn unknown_role_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "");

        let result = system_controller(&config, UpdateState::InstallFailed);
        assert!(matches!(result, Err(ConfigError::Role(_))));
        assert!(!config.status_file.exists());
    }

    #[test]
    fn sink_follows_role() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "");

        status_sink(&config, NodeRole::Compute).set_status("Available").unwrap();
        assert!(!config.status_file.exists());

        status_sink(&config, NodeRole::Master).set_status("Available").unwrap();
        assert!(config.status_file.exists());
    }
}
