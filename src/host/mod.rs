mod disk;
mod hardware;
mod hooks;
mod role;

pub use self::{
    disk::free_space_mb,
    hardware::is_installed_in_listing,
    hooks::Hook,
    role::{detect_role, NodeRole, RoleError},
};

use crate::{
    config::Config,
    misc::{self, StatusExt},
};
use anyhow::Context;
use std::{
    path::{Path, PathBuf},
    process::Command,
};

/// Facts about, and side effects on, the machine being updated.
pub trait Host {
    fn node_role(&self) -> Result<NodeRole, RoleError>;

    /// Whether the primary hardware variant's marker package is installed.
    fn is_primary_variant(&self) -> bool;

    /// Free space available to unprivileged users in megabytes, or `-1` if unknown.
    fn free_space_mb(&self, path: &Path) -> i64;

    fn run_hook(&self, hook: Hook) -> anyhow::Result<()>;
}

/// The `Host` of the running system.
pub struct SystemHost {
    node_conf: PathBuf,
    master_marker: PathBuf,
    compute_marker: PathBuf,
    variant_probe_package: String,
    hook_wrapper: PathBuf,
}

impl SystemHost {
    pub fn new(config: &Config) -> Self {
        Self {
            node_conf: config.node_conf.clone(),
            master_marker: config.master_marker.clone(),
            compute_marker: config.compute_marker.clone(),
            variant_probe_package: config.variant_probe_package.clone(),
            hook_wrapper: config.hook_wrapper.clone(),
        }
    }
}

impl Host for SystemHost {
    fn node_role(&self) -> Result<NodeRole, RoleError> {
        detect_role(&self.node_conf, &self.master_marker, &self.compute_marker)
    }

    fn is_primary_variant(&self) -> bool {
        let package = self.variant_probe_package.as_str();

        match misc::output(Command::new("dpkg").args(&["-l", package])) {
            Ok(listing) => {
                let installed = is_installed_in_listing(&listing, package);
                info!("{} is {}installed", package, if installed { "" } else { "not " });
                installed
            }
            Err(why) => {
                error!("failed to query dpkg for {}: {}", package, why);
                false
            }
        }
    }

    fn free_space_mb(&self, path: &Path) -> i64 { free_space_mb(path) }

    fn run_hook(&self, hook: Hook) -> anyhow::Result<()> {
        let argument = match hook.wrapper_argument() {
            Some(argument) => argument,
            None => {
                debug!("{}: nothing to do", hook);
                return Ok(());
            }
        };

        info!("running {}", hook);
        let output = Command::new(&self.hook_wrapper)
            .arg(argument)
            .output()
            .with_context(|| format!("failed to execute {:?}", self.hook_wrapper))?;

        debug!("{}: {}", argument, String::from_utf8_lossy(&output.stdout).trim());

        output.status.as_result().with_context(|| {
            format!("{} failed: {}", argument, String::from_utf8_lossy(&output.stderr).trim())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(wrapper: &str) -> SystemHost {
        SystemHost::new(&Config { hook_wrapper: PathBuf::from(wrapper), ..Config::default() })
    }

    #[test]
    fn successful_hook() { assert!(host("true").run_hook(Hook::PostInstallSystem).is_ok()); }

    #[test]
    fn failing_hook() { assert!(host("false").run_hook(Hook::PreInstallSystem).is_err()); }

    #[test]
    fn missing_wrapper() {
        assert!(host("/nonexistent/TSwrapper").run_hook(Hook::PostInstallApplication).is_err());
    }

    #[test]
    fn application_pre_install_does_nothing() {
        assert!(host("/nonexistent/TSwrapper").run_hook(Hook::PreInstallApplication).is_ok());
    }
}
