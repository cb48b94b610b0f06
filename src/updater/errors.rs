use crate::{apt::IndexError, host::RoleError, manifest::ManifestError};
use thiserror::Error;

/// Failures which make the updater unusable on this host until it is reconfigured.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("package list error")]
    Manifest(#[from] ManifestError),

    #[error("node role error")]
    Role(#[from] RoleError),
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("updater configuration error")]
    Config(#[from] ConfigError),

    /// Retried by the next scheduled check.
    #[error("failed to refresh the package index")]
    IndexRefresh(#[source] IndexError),

    #[error("package index error")]
    Index(#[source] IndexError),
}

impl From<ManifestError> for UpdateError {
    fn from(why: ManifestError) -> Self { UpdateError::Config(why.into()) }
}
