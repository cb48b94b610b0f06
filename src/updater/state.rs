use num_traits::FromPrimitive;
use std::fmt::{self, Display};

#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, Eq, FromPrimitive, PartialEq)]
pub enum UpdateState {
    #[default]
    Unknown = 0,
    CheckingForUpdate = 1,
    UpdatesAvailable = 2,
    NoUpdates = 3,
    UpdateCheckFailed = 4,
    Downloading = 5,
    DownloadFailed = 6,
    ReadyToInstall = 7,
    Installing = 8,
    InstallFailed = 9,
    FinishedInstalling = 10,
}

impl From<UpdateState> for &'static str {
    fn from(state: UpdateState) -> Self {
        match state {
            UpdateState::Unknown => "Unknown",
            UpdateState::CheckingForUpdate => "Checking for update",
            UpdateState::UpdatesAvailable => "Available",
            UpdateState::NoUpdates => "No updates",
            UpdateState::UpdateCheckFailed => "Update failure",
            UpdateState::Downloading => "Downloading",
            UpdateState::DownloadFailed => "Download failure",
            UpdateState::ReadyToInstall => "Ready to install",
            UpdateState::Installing => "Installing",
            UpdateState::InstallFailed => "Install failure",
            UpdateState::FinishedInstalling => "Finished installing",
        }
    }
}

impl Display for UpdateState {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(<&'static str>::from(*self))
    }
}

impl UpdateState {
    /// Recovers a state from the label written to the status record.
    ///
    /// Progress strings carry a trailing `<current>/<total>` count, which is ignored.
    pub fn from_label(label: &str) -> Option<Self> {
        (0u8..).map_while(UpdateState::from_u8).find(|state| {
            match label.strip_prefix(<&'static str>::from(*state)) {
                Some("") => true,
                Some(rest) => rest.strip_prefix(' ').is_some_and(|count| count.contains('/')),
                None => false,
            }
        })
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            UpdateState::UpdateCheckFailed | UpdateState::DownloadFailed | UpdateState::InstallFailed
        )
    }
}

/// Controller events which move the state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trigger {
    PollStarted,
    UpdatesFound,
    NoUpdatesFound,
    IndexRefreshFailed,
    DownloadStarted,
    DownloadFailed,
    DownloadSucceeded,
    InstallStarted,
    InstallFailed,
    InstallSucceeded,
}

impl Trigger {
    /// The state entered when this trigger fires.
    pub fn target(self) -> UpdateState {
        match self {
            Trigger::PollStarted => UpdateState::CheckingForUpdate,
            Trigger::UpdatesFound => UpdateState::UpdatesAvailable,
            Trigger::NoUpdatesFound => UpdateState::NoUpdates,
            Trigger::IndexRefreshFailed => UpdateState::UpdateCheckFailed,
            Trigger::DownloadStarted => UpdateState::Downloading,
            Trigger::DownloadFailed => UpdateState::DownloadFailed,
            Trigger::DownloadSucceeded => UpdateState::ReadyToInstall,
            Trigger::InstallStarted => UpdateState::Installing,
            Trigger::InstallFailed => UpdateState::InstallFailed,
            Trigger::InstallSucceeded => UpdateState::FinishedInstalling,
        }
    }

    /// Whether `from` is a state this trigger is expected to fire in.
    ///
    /// A fresh controller is `Unknown`, so download and install accept it.
    pub fn expects(self, from: UpdateState) -> bool {
        use UpdateState::*;

        match self {
            Trigger::PollStarted => true,
            Trigger::UpdatesFound | Trigger::NoUpdatesFound | Trigger::IndexRefreshFailed => {
                from == CheckingForUpdate
            }
            Trigger::DownloadStarted => matches!(from, UpdatesAvailable | DownloadFailed | Unknown),
            Trigger::DownloadFailed | Trigger::DownloadSucceeded => from == Downloading,
            Trigger::InstallStarted => matches!(from, ReadyToInstall | InstallFailed | Unknown),
            Trigger::InstallFailed | Trigger::InstallSucceeded => from == Installing,
        }
    }
}

/// The single transition function of the update state machine.
///
/// Returns the new state, and whether `from` was an expected source state. Unexpected
/// sources are still transitioned, since callers own the ordering of operations.
pub fn transition(from: UpdateState, trigger: Trigger) -> (UpdateState, bool) {
    (trigger.target(), trigger.expects(from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(UpdateState::FinishedInstalling, Trigger::PollStarted => (UpdateState::CheckingForUpdate, true) ; "poll restarts after install")]
    #[test_case(UpdateState::CheckingForUpdate, Trigger::UpdatesFound => (UpdateState::UpdatesAvailable, true) ; "updates found")]
    #[test_case(UpdateState::CheckingForUpdate, Trigger::NoUpdatesFound => (UpdateState::NoUpdates, true) ; "no updates")]
    #[test_case(UpdateState::CheckingForUpdate, Trigger::IndexRefreshFailed => (UpdateState::UpdateCheckFailed, true) ; "refresh failed")]
    #[test_case(UpdateState::UpdatesAvailable, Trigger::DownloadStarted => (UpdateState::Downloading, true) ; "download after poll")]
    #[test_case(UpdateState::Unknown, Trigger::DownloadStarted => (UpdateState::Downloading, true) ; "download by fresh controller")]
    #[test_case(UpdateState::NoUpdates, Trigger::DownloadStarted => (UpdateState::Downloading, false) ; "download without updates")]
    #[test_case(UpdateState::Downloading, Trigger::DownloadSucceeded => (UpdateState::ReadyToInstall, true) ; "download succeeded")]
    #[test_case(UpdateState::Downloading, Trigger::DownloadFailed => (UpdateState::DownloadFailed, true) ; "download failed")]
    #[test_case(UpdateState::ReadyToInstall, Trigger::InstallStarted => (UpdateState::Installing, true) ; "install after download")]
    #[test_case(UpdateState::UpdatesAvailable, Trigger::InstallStarted => (UpdateState::Installing, false) ; "install before download")]
    #[test_case(UpdateState::Installing, Trigger::InstallSucceeded => (UpdateState::FinishedInstalling, true) ; "install succeeded")]
    #[test_case(UpdateState::Downloading, Trigger::InstallFailed => (UpdateState::InstallFailed, false) ; "install failed while downloading")]
    fn transitions(from: UpdateState, trigger: Trigger) -> (UpdateState, bool) {
        transition(from, trigger)
    }

    #[test_case("Ready to install" => Some(UpdateState::ReadyToInstall) ; "plain label")]
    #[test_case("Downloading 3/12" => Some(UpdateState::Downloading) ; "progress label")]
    #[test_case("Install failure" => Some(UpdateState::InstallFailed) ; "failure label")]
    #[test_case("WARNING: insufficient disk space for update" => None ; "warning")]
    #[test_case("Installing things" => None ; "unrelated suffix")]
    fn from_label(label: &str) -> Option<UpdateState> { UpdateState::from_label(label) }

    #[test]
    fn codes() {
        assert_eq!(UpdateState::from_u8(0), Some(UpdateState::Unknown));
        assert_eq!(UpdateState::from_u8(10), Some(UpdateState::FinishedInstalling));
        assert_eq!(UpdateState::from_u8(11), None);
    }
}
