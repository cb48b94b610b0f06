use crate::host::NodeRole;
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

const SYSTEM_FAMILY: &str = "system";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read package list at {:?}", path)]
    Read { path: PathBuf, source: io::Error },

    #[error("package list at {:?} is malformed", path)]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("package list does not define the {} family", family)]
    MissingFamily { family: String },

    #[error("package list does not define {} packages for the {} family", variant, family)]
    MissingVariant { family: String, variant: String },
}

/// The package lists of one family, keyed by role.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct FamilyLists {
    pub allservers: Vec<String>,
    pub master: Vec<String>,
    /// Hardware-variant lists, such as `proton` and `pgm`.
    #[serde(flatten)]
    pub variants: HashMap<String, Vec<String>>,
}

/// The versioned document which enumerates the packages belonging to each role.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PackageManifest {
    pub packages: HashMap<String, FamilyLists>,
}

impl PackageManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        info!("parsing {}", path.display());

        let contents = fs::read_to_string(path)
            .map_err(|source| ManifestError::Read { path: path.to_path_buf(), source })?;

        Self::parse(path, &contents)
    }

    pub fn parse(path: &Path, contents: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(contents)
            .map_err(|source| ManifestError::Parse { path: path.to_path_buf(), source })
    }

    fn family(&self, family: &str) -> Result<&FamilyLists, ManifestError> {
        self.packages
            .get(family)
            .ok_or_else(|| ManifestError::MissingFamily { family: family.to_owned() })
    }

    /// Selects the four role sets, with the detected variant's list appended to the
    /// application master-only set.
    pub fn role_set(
        &self,
        application_family: &str,
        variant: &str,
    ) -> Result<PackageRoleSet, ManifestError> {
        let system = self.family(SYSTEM_FAMILY)?;
        let application = self.family(application_family)?;

        let extras = application.variants.get(variant).ok_or_else(|| {
            ManifestError::MissingVariant {
                family: application_family.to_owned(),
                variant: variant.to_owned(),
            }
        })?;

        debug!("adding {} to master {} package list", extras.join(","), application_family);

        let mut application_master = application.master.clone();
        application_master.extend_from_slice(extras);

        Ok(PackageRoleSet {
            system_all: system.allservers.clone(),
            system_master: system.master.clone(),
            application_all: application.allservers.clone(),
            application_master,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackageRoleSet {
    pub system_all: Vec<String>,
    pub system_master: Vec<String>,
    pub application_all: Vec<String>,
    /// Includes the packages of the detected hardware variant.
    pub application_master: Vec<String>,
}

impl PackageRoleSet {
    /// Resolves the package names which apply to a node of the given role.
    pub fn effective(&self, role: NodeRole) -> EffectivePackageLists {
        let (system, application) = match role {
            NodeRole::Master => (
                dedupe(self.system_master.iter().chain(&self.system_all)),
                dedupe(self.application_all.iter().chain(&self.application_master)),
            ),
            NodeRole::Compute => {
                (dedupe(self.system_all.iter()), dedupe(self.application_all.iter()))
            }
        };

        EffectivePackageLists { system, application }
    }
}

/// The de-duplicated package names of each family which apply to this node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectivePackageLists {
    pub system: Vec<String>,
    pub application: Vec<String>,
}

impl EffectivePackageLists {
    /// Drops `package` from both families.
    pub fn without(mut self, package: &str) -> Self {
        self.system.retain(|name| name != package);
        self.application.retain(|name| name != package);
        self
    }

    pub fn is_empty(&self) -> bool { self.system.is_empty() && self.application.is_empty() }
}

/// Removes repeated names, keeping the first occurrence of each.
pub fn dedupe<'a, I: Iterator<Item = &'a String>>(names: I) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for name in names {
        if !unique.contains(name) {
            unique.push(name.clone());
        }
    }

    unique
}
