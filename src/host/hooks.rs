use std::fmt::{self, Display, Formatter};

/// Configuration scripts which run around the system and application install phases.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Hook {
    PreInstallSystem,
    PostInstallSystem,
    PreInstallApplication,
    PostInstallApplication,
}

impl Hook {
    /// The argument given to the hook wrapper, if the hook does anything.
    pub fn wrapper_argument(self) -> Option<&'static str> {
        match self {
            Hook::PreInstallSystem => Some("preinst_system_packages"),
            Hook::PostInstallSystem => Some("config_system_packages"),
            Hook::PreInstallApplication => None,
            Hook::PostInstallApplication => Some("config_ion_packages"),
        }
    }
}

impl Display for Hook {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.write_str(match self {
            Hook::PreInstallSystem => "system pre-install hook",
            Hook::PostInstallSystem => "system configuration hook",
            Hook::PreInstallApplication => "application pre-install hook",
            Hook::PostInstallApplication => "application configuration hook",
        })
    }
}
