use crate::VAR_LIB_DIR;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read configuration file at {:?}", path)]
    Read { path: PathBuf, source: io::Error },

    #[error("configuration file at {:?} is malformed", path)]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// JSON manifest listing the packages of each role.
    pub package_list: PathBuf,
    /// Key of the application family in the manifest.
    pub application_family: String,
    /// Package whose installation identifies the primary hardware variant.
    pub variant_probe_package: String,
    pub primary_variant: String,
    pub fallback_variant: String,
    /// The package which ships this updater, installed before anything else.
    pub self_package: String,
    pub node_conf: PathBuf,
    pub master_marker: PathBuf,
    pub compute_marker: PathBuf,
    pub hook_wrapper: PathBuf,
    /// Filesystem that receives downloaded archives.
    pub download_dir: PathBuf,
    pub status_file: PathBuf,
    pub message_file: PathBuf,
    pub log_file: PathBuf,
    /// Background task worker restarted after every install attempt.
    pub worker_service: String,
    pub auto_download: bool,
    pub auto_install: bool,
    pub dry_run: bool,
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            package_list: PathBuf::from("/usr/share/ion-tsconfig/torrentsuite-packagelist.json"),
            application_family: "torrentsuite".into(),
            variant_probe_package: "ion-protonupdates".into(),
            primary_variant: "proton".into(),
            fallback_variant: "pgm".into(),
            self_package: "ion-tsconfig".into(),
            node_conf: PathBuf::from("/etc/torrentserver/tsconf.conf"),
            master_marker: PathBuf::from("/opt/ion/.masternode"),
            compute_marker: PathBuf::from("/opt/ion/.computenode"),
            hook_wrapper: PathBuf::from("/usr/sbin/TSwrapper"),
            download_dir: PathBuf::from("/var"),
            status_file: Path::new(VAR_LIB_DIR).join("status.json"),
            message_file: Path::new(VAR_LIB_DIR).join("messages.jsonl"),
            log_file: PathBuf::from("/var/log/ion/tsconfig_gui.log"),
            worker_service: "celeryd".into(),
            auto_download: false,
            auto_install: false,
            dry_run: false,
            poll_interval_secs: 24 * 60 * 60,
        }
    }
}

impl Config {
    /// Loads the configuration file, falling back to the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            info!("no configuration at {:?}; using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|source| LoadError::Read { path: path.to_path_buf(), source })?;

        serde_json::from_str(&contents)
            .map_err(|source| LoadError::Parse { path: path.to_path_buf(), source })
    }

    pub fn poll_interval(&self) -> Duration { Duration::from_secs(self.poll_interval_secs.max(60)) }
}
