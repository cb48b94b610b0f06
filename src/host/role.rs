use std::{
    fmt::{self, Display, Formatter},
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeRole {
    /// The head node, which owns the status record and installs master-only packages.
    Master,
    Compute,
}

impl Display for NodeRole {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.write_str(match self {
            NodeRole::Master => "master",
            NodeRole::Compute => "compute",
        })
    }
}

#[derive(Debug, Error)]
pub enum RoleError {
    #[error("host is not configured as either a master or a compute node (checked {:?})", conf)]
    Undetermined { conf: PathBuf },
}

/// Reads the node role from the `mode:` line of the node configuration, falling back to the
/// presence of the master and compute marker files.
pub fn detect_role(
    conf: &Path,
    master_marker: &Path,
    compute_marker: &Path,
) -> Result<NodeRole, RoleError> {
    match role_from_conf(conf) {
        Ok(Some(role)) => {
            debug!("found mode:{} in {}", role, conf.display());
            return Ok(role);
        }
        Ok(None) => (),
        Err(why) if why.kind() == io::ErrorKind::NotFound => (),
        Err(why) => error!("failed to read {}: {}", conf.display(), why),
    }

    debug!("using marker files to determine the node role");
    match (master_marker.exists(), compute_marker.exists()) {
        (true, false) => Ok(NodeRole::Master),
        (false, true) => Ok(NodeRole::Compute),
        _ => Err(RoleError::Undetermined { conf: conf.to_path_buf() }),
    }
}

fn role_from_conf(conf: &Path) -> io::Result<Option<NodeRole>> {
    for line in BufReader::new(File::open(conf)?).lines() {
        let line = line?;
        if line.contains("mode:master") {
            return Ok(Some(NodeRole::Master));
        } else if line.contains("mode:compute") {
            return Ok(Some(NodeRole::Compute));
        }
    }

    Ok(None)
}
