mod event;
pub mod query;

pub use self::event::{strip_arch, AptEvent};

use crate::misc::{self, StatusExt};
use std::{
    collections::{BTreeMap, HashMap},
    io,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to update package lists")]
    Update(#[source] io::Error),

    #[error("failed to query the package index for {}", package)]
    Query { package: String, source: io::Error },

    #[error("failed to compute the download size of marked packages")]
    DownloadSize(#[source] io::Error),

    #[error("failed to fetch package archives")]
    Fetch(#[source] io::Error),

    #[error("failed to install packages")]
    Commit(#[source] io::Error),

    #[error("failed to clean the package cache")]
    Autoclean(#[source] io::Error),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PackageInfo {
    pub name: String,
    pub installed: Option<String>,
    pub candidate: Option<String>,
}

impl PackageInfo {
    pub fn is_installed(&self) -> bool { self.installed.is_some() }

    pub fn is_upgradable(&self) -> bool {
        match (&self.installed, &self.candidate) {
            (Some(installed), Some(candidate)) => installed != candidate,
            _ => false,
        }
    }

    /// Upgrade in place if already installed, else a fresh install.
    pub fn required_action(&self) -> Option<Mark> {
        if self.is_upgradable() {
            Some(Mark::Upgrade)
        } else if !self.is_installed() && self.candidate.is_some() {
            Some(Mark::Install)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    Package(PackageInfo),
    /// A virtual package, and the real packages which provide it.
    Virtual(Vec<String>),
    Missing,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mark {
    Upgrade,
    Install,
}

/// The operations the update controller needs from the host's package manager.
pub trait PackageIndex {
    /// Synchronizes the package lists with the configured repositories, then re-opens the index.
    fn refresh(&mut self) -> Result<(), IndexError>;

    /// Discards marks and cached lookups, so that changes made by other processes are seen.
    fn reopen(&mut self) -> Result<(), IndexError>;

    fn lookup(&mut self, package: &str) -> Result<Lookup, IndexError>;

    fn mark(&mut self, package: &str, mark: Mark);

    fn clear_marks(&mut self);

    /// Bytes which must be downloaded to act on every marked package.
    fn required_download_bytes(&mut self) -> Result<u64, IndexError>;

    /// Downloads the archives of the marked packages without installing them.
    fn fetch_marked(&mut self, progress: &mut dyn FnMut(AptEvent)) -> Result<(), IndexError>;

    /// Installs the marked packages.
    fn commit_marked(&mut self, progress: &mut dyn FnMut(AptEvent)) -> Result<(), IndexError>;

    /// Removes archives from the cache which can no longer be downloaded.
    fn autoclean(&mut self) -> Result<(), IndexError>;
}

/// A `PackageIndex` backed by the `apt-get` and `apt-cache` commands.
#[derive(Default)]
pub struct AptIndex {
    cache: HashMap<String, Lookup>,
    marks: BTreeMap<String, Mark>,
}

impl AptIndex {
    pub fn new() -> Self { Self::default() }

    fn marked_names(&self) -> Vec<&str> { self.marks.keys().map(String::as_str).collect() }

    fn query(package: &str) -> Result<Lookup, IndexError> {
        let query_error = |source| IndexError::Query { package: package.to_owned(), source };

        let policy =
            misc::output(misc::apt_cache().args(&["policy", package])).map_err(query_error)?;

        match query::parse_policy(package, &policy) {
            Some(info) if info.installed.is_some() || info.candidate.is_some() => {
                Ok(Lookup::Package(info))
            }
            Some(_) => {
                let showpkg = misc::output(misc::apt_cache().args(&["showpkg", package]))
                    .map_err(query_error)?;

                let providers = query::parse_reverse_provides(&showpkg);
                if providers.is_empty() {
                    Ok(Lookup::Missing)
                } else {
                    Ok(Lookup::Virtual(providers))
                }
            }
            None => Ok(Lookup::Missing),
        }
    }
}

impl PackageIndex for AptIndex {
    fn refresh(&mut self) -> Result<(), IndexError> {
        info!("updating package lists");
        misc::apt_get()
            .arg("update")
            .status()
            .and_then(StatusExt::as_result)
            .map_err(IndexError::Update)?;

        self.reopen()
    }

    fn reopen(&mut self) -> Result<(), IndexError> {
        self.cache.clear();
        self.marks.clear();
        Ok(())
    }

    fn lookup(&mut self, package: &str) -> Result<Lookup, IndexError> {
        if let Some(lookup) = self.cache.get(package) {
            return Ok(lookup.clone());
        }

        let lookup = Self::query(package)?;
        self.cache.insert(package.to_owned(), lookup.clone());
        Ok(lookup)
    }

    fn mark(&mut self, package: &str, mark: Mark) {
        debug!("marking {} for {:?}", package, mark);
        self.marks.insert(package.to_owned(), mark);
    }

    fn clear_marks(&mut self) { self.marks.clear(); }

    fn required_download_bytes(&mut self) -> Result<u64, IndexError> {
        if self.marks.is_empty() {
            return Ok(0);
        }

        let output = misc::output(
            misc::apt_get().args(&["-qq", "--print-uris", "install"]).args(self.marked_names()),
        )
        .map_err(IndexError::DownloadSize)?;

        Ok(query::parse_download_size(&output))
    }

    fn fetch_marked(&mut self, progress: &mut dyn FnMut(AptEvent)) -> Result<(), IndexError> {
        if self.marks.is_empty() {
            return Ok(());
        }

        let mut cmd = misc::apt_get();
        cmd.args(&["--download-only", "install"]).args(self.marked_names());

        info!("fetching {} marked packages", self.marks.len());
        misc::stream_lines(&mut cmd, &mut |line| {
            debug!("{}", line);
            if let Ok(event) = line.parse::<AptEvent>() {
                progress(event);
            }
        })
        .map_err(IndexError::Fetch)
    }

    fn commit_marked(&mut self, progress: &mut dyn FnMut(AptEvent)) -> Result<(), IndexError> {
        if self.marks.is_empty() {
            return Ok(());
        }

        let mut cmd = misc::apt_get();
        cmd.args(&["-o", "Dpkg::Progress-Fancy=0", "install"]).args(self.marked_names());

        info!("installing {} marked packages", self.marks.len());
        let result = misc::stream_lines(&mut cmd, &mut |line| {
            debug!("{}", line);
            if let Ok(event) = line.parse::<AptEvent>() {
                progress(event);
            }
        })
        .map_err(IndexError::Commit);

        // Installed versions changed underneath the cached lookups.
        self.cache.clear();
        self.marks.clear();
        result
    }

    fn autoclean(&mut self) -> Result<(), IndexError> {
        misc::apt_get()
            .arg("autoclean")
            .status()
            .and_then(StatusExt::as_result)
            .map_err(IndexError::Autoclean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn info(installed: Option<&str>, candidate: Option<&str>) -> PackageInfo {
        PackageInfo {
            name: "ion-dbreports".into(),
            installed: installed.map(String::from),
            candidate: candidate.map(String::from),
        }
    }

    #[test_case(Some("5.0.4"), Some("5.0.6") => Some(Mark::Upgrade) ; "older version is upgraded")]
    #[test_case(None, Some("5.0.6") => Some(Mark::Install) ; "missing package is installed")]
    #[test_case(Some("5.0.6"), Some("5.0.6") => None ; "current package is left alone")]
    #[test_case(None, None => None ; "package without a candidate is left alone")]
    fn required_action(installed: Option<&str>, candidate: Option<&str>) -> Option<Mark> {
        info(installed, candidate).required_action()
    }

    #[test]
    fn empty_mark_set_needs_no_download() {
        let mut index = AptIndex::new();
        assert_eq!(index.required_download_bytes().unwrap(), 0);
        assert!(index.fetch_marked(&mut |_| ()).is_ok());
        assert!(index.commit_marked(&mut |_| ()).is_ok());
    }

    #[test]
    fn reopen_discards_marks() {
        let mut index = AptIndex::new();
        index.mark("ion-tsconfig", Mark::Upgrade);
        index.mark("ion-dbreports", Mark::Install);
        assert_eq!(index.marked_names(), vec!["ion-dbreports", "ion-tsconfig"]);

        index.reopen().unwrap();
        assert!(index.marked_names().is_empty());
    }
}
