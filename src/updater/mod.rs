mod errors;
mod progress;
mod state;

pub use self::{
    errors::{ConfigError, UpdateError},
    progress::ProgressCounter,
    state::{transition, Trigger, UpdateState},
};

use crate::{
    apt::{AptEvent, IndexError, Lookup, Mark, PackageIndex},
    config::Config,
    host::{Hook, Host, NodeRole},
    manifest::{dedupe, EffectivePackageLists, ManifestError, PackageManifest},
    misc::format_error,
    status::{MessageLevel, StatusSink},
};
use std::path::Path;

const MIB: u64 = 1024 * 1024;

pub const INSUFFICIENT_SPACE: &str = "WARNING: insufficient disk space for update";

pub const APPLICATION_DOWNLOAD_FAILED: &str = "Application packages failed to download!";

/// A package which requires an upgrade or a fresh install.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub mark: Mark,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Candidates {
    pub system: Vec<Candidate>,
    /// Never repeats a package of the system list.
    pub application: Vec<Candidate>,
}

impl Candidates {
    pub fn names(&self) -> Vec<String> {
        self.system.iter().chain(&self.application).map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize { self.system.len() + self.application.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DownloadOutcome {
    pub system: Vec<String>,
    pub application: Vec<String>,
    pub system_ok: bool,
    pub application_ok: bool,
}

impl DownloadOutcome {
    pub fn succeeded(&self) -> bool { self.system_ok && self.application_ok }

    /// Every package which the download was attempted for.
    pub fn packages(&self) -> Vec<String> {
        self.system.iter().chain(&self.application).cloned().collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InstallOutcome {
    pub self_package_installed: bool,
    /// `None` when the phase was never reached.
    pub system: Option<bool>,
    pub application: Option<bool>,
}

impl InstallOutcome {
    pub fn succeeded(&self) -> bool {
        self.self_package_installed && self.system == Some(true) && self.application == Some(true)
    }
}

/// Polls for, downloads, and installs the packages which the manifest assigns to this node.
///
/// Operations are expected to be called in the order poll, download, install. Calling them
/// out of order is logged, but not rejected.
pub struct Controller<I, S, H> {
    config: Config,
    index: I,
    sink: S,
    host: H,
    role: NodeRole,
    lists: EffectivePackageLists,
    state: UpdateState,
    progress: ProgressCounter,
    candidates: Candidates,
    dry_run: bool,
}

impl<I: PackageIndex, S: StatusSink, H: Host> Controller<I, S, H> {
    /// Detects the node role and reads the manifest. No package index calls are made.
    pub fn new(config: Config, index: I, sink: S, host: H) -> Result<Self, ConfigError> {
        let role = host.node_role()?;
        Self::with_role(config, role, index, sink, host).map_err(ConfigError::from)
    }

    /// Reads the manifest for a node whose role is already known.
    pub fn with_role(
        config: Config,
        role: NodeRole,
        index: I,
        sink: S,
        host: H,
    ) -> Result<Self, ManifestError> {
        info!("this host is a {} node", role);

        let mut controller = Self {
            dry_run: config.dry_run,
            config,
            index,
            sink,
            host,
            role,
            lists: EffectivePackageLists::default(),
            state: UpdateState::default(),
            progress: ProgressCounter::default(),
            candidates: Candidates::default(),
        };

        controller.refresh_package_lists()?;
        Ok(controller)
    }

    pub fn state(&self) -> UpdateState { self.state }

    pub fn role(&self) -> NodeRole { self.role }

    pub fn progress(&self) -> &ProgressCounter { &self.progress }

    /// Candidates found by the last poll or download.
    pub fn candidates(&self) -> &Candidates { &self.candidates }

    pub fn lists(&self) -> &EffectivePackageLists { &self.lists }

    /// Marks and counts packages during install without committing them.
    pub fn set_dry_run(&mut self, dry_run: bool) { self.dry_run = dry_run; }

    /// Re-reads the manifest and the hardware variant, recomputing the effective lists.
    pub fn refresh_package_lists(&mut self) -> Result<&EffectivePackageLists, ManifestError> {
        let manifest = PackageManifest::load(&self.config.package_list)?;

        let variant = if self.host.is_primary_variant() {
            &self.config.primary_variant
        } else {
            &self.config.fallback_variant
        };

        self.lists =
            manifest.role_set(&self.config.application_family, variant)?.effective(self.role);

        debug!("system packages: {}", self.lists.system.join(", "));
        debug!("application packages: {}", self.lists.application.join(", "));
        Ok(&self.lists)
    }

    /// Refreshes the package index and reports the packages which require action.
    pub fn poll(&mut self) -> Result<Vec<String>, UpdateError> {
        self.fire(Trigger::PollStarted);

        let result = self.find_candidates();
        match result {
            Ok(ref names) if names.is_empty() => {
                info!("no updates available");
                self.fire(Trigger::NoUpdatesFound);
            }
            Ok(ref names) => {
                info!("there are {} updates: {}", names.len(), names.join(", "));
                self.fire(Trigger::UpdatesFound);
                self.check_disk_space(names);
            }
            Err(_) => self.fire(Trigger::IndexRefreshFailed),
        }

        result
    }

    /// Publishes the status of a failure which happened outside of the controller's operations.
    pub fn publish_failure(&mut self, state: UpdateState) {
        publish(&mut self.sink, state.into());
    }

    /// Posts an operational alert, which is best-effort.
    pub fn notify(&mut self, level: MessageLevel, message: &str) {
        post(&mut self.sink, level, message);
    }

    /// Fetches the archives of every candidate, system packages first.
    ///
    /// A failure of one family does not prevent the other from being fetched.
    pub fn download(&mut self) -> Result<DownloadOutcome, UpdateError> {
        self.fire(Trigger::DownloadStarted);

        let result = self.download_families();
        match result {
            Ok(ref outcome) if outcome.succeeded() => self.fire(Trigger::DownloadSucceeded),
            _ => self.fire(Trigger::DownloadFailed),
        }

        result
    }

    /// Installs the updater's own package, then the system and application packages, with
    /// their configuration hooks.
    pub fn install(&mut self) -> Result<InstallOutcome, UpdateError> {
        self.fire(Trigger::InstallStarted);

        let result = self.install_phases();
        match result {
            Ok(ref outcome) if outcome.succeeded() => {
                info!("successfully installed all updates");
                self.fire(Trigger::InstallSucceeded);
            }
            _ => {
                error!("failed to install updates");
                self.fire(Trigger::InstallFailed);
            }
        }

        result
    }

    /// Megabytes which must be downloaded to act on the given packages.
    pub fn required_download_space(&mut self, packages: &[String]) -> Result<u64, IndexError> {
        if packages.is_empty() {
            return Ok(0);
        }

        self.index.clear_marks();
        for name in packages {
            if let Lookup::Package(info) = self.index.lookup(name)? {
                if let Some(mark) = info.required_action() {
                    self.index.mark(name, mark);
                }
            }
        }

        let bytes = self.index.required_download_bytes();
        self.index.clear_marks();
        Ok(bytes? / MIB)
    }

    /// Megabytes free on the filesystem of `path`, or `-1` if unknown.
    pub fn free_space(&self, path: &Path) -> i64 { self.host.free_space_mb(path) }

    fn find_candidates(&mut self) -> Result<Vec<String>, UpdateError> {
        if let Err(why) = self.index.refresh() {
            warn!("could not update the package index: {}", format_error(&why));
            return Err(UpdateError::IndexRefresh(why));
        }

        self.refresh_package_lists()?;

        let lists = self.lists.clone();
        self.candidates = self.build_candidates(&lists).map_err(UpdateError::Index)?;
        Ok(self.candidates.names())
    }

    fn download_families(&mut self) -> Result<DownloadOutcome, UpdateError> {
        self.refresh_package_lists()?;
        self.refresh_index()?;

        let lists = self.lists.clone();
        let candidates = self.build_candidates(&lists).map_err(UpdateError::Index)?;

        self.progress.reset(UpdateState::Downloading.into(), candidates.len());
        publish(&mut self.sink, &self.progress.to_string());

        match self.index.autoclean() {
            Ok(()) => info!("autocleaned the package cache"),
            Err(why) => warn!("error during autoclean: {}", format_error(&why)),
        }

        debug!("downloading system packages");
        let system_ok = match self.fetch(&candidates.system) {
            Ok(()) => true,
            Err(why) => {
                error!("problem downloading system packages: {}", format_error(&why));
                false
            }
        };

        debug!("downloading application packages");
        let application_ok = match self.fetch(&candidates.application) {
            Ok(()) => true,
            Err(why) => {
                error!("problem downloading application packages: {}", format_error(&why));
                post(&mut self.sink, MessageLevel::Error, APPLICATION_DOWNLOAD_FAILED);
                false
            }
        };

        let outcome = DownloadOutcome {
            system: candidates.system.iter().map(|c| c.name.clone()).collect(),
            application: candidates.application.iter().map(|c| c.name.clone()).collect(),
            system_ok,
            application_ok,
        };

        self.candidates = candidates;
        Ok(outcome)
    }

    fn install_phases(&mut self) -> Result<InstallOutcome, UpdateError> {
        self.refresh_index()?;

        let self_package = self.config.self_package.clone();
        self.progress.reset(UpdateState::Installing.into(), 1);

        if let Err(why) = self.install_self(&self_package) {
            error!("could not install {}: {}", self_package, format_error(&why));
            post(
                &mut self.sink,
                MessageLevel::Error,
                &format!("Could not install {}! Update aborted.", self_package),
            );

            return Ok(InstallOutcome {
                self_package_installed: false,
                system: None,
                application: None,
            });
        }

        // The package just installed may ship a different manifest.
        self.refresh_package_lists()?;
        self.index.reopen().map_err(UpdateError::Index)?;

        let lists = self.lists.clone().without(&self_package);
        let candidates = self.build_candidates(&lists).map_err(UpdateError::Index)?;

        self.progress.reset(UpdateState::Installing.into(), candidates.len());
        publish(&mut self.sink, &self.progress.to_string());

        self.run_hook(Hook::PreInstallSystem);
        let system = self.commit(&candidates.system, "system");
        self.run_hook(Hook::PostInstallSystem);

        self.run_hook(Hook::PreInstallApplication);
        let application = self.commit(&candidates.application, "application");
        self.run_hook(Hook::PostInstallApplication);

        self.candidates = candidates;

        Ok(InstallOutcome {
            self_package_installed: true,
            system: Some(system),
            application: Some(application),
        })
    }

    fn install_self(&mut self, package: &str) -> Result<(), IndexError> {
        let action = match self.index.lookup(package)? {
            Lookup::Package(info) => info.required_action(),
            _ => {
                warn!("{} is not in the package index", package);
                None
            }
        };

        match action {
            Some(mark) => self.commit_batch(&[Candidate { name: package.to_owned(), mark }]),
            None => {
                info!("{} is up to date", package);
                Ok(())
            }
        }
    }

    fn commit(&mut self, packages: &[Candidate], family: &str) -> bool {
        match self.commit_batch(packages) {
            Ok(()) => true,
            Err(why) => {
                error!("failed to install {} packages: {}", family, format_error(&why));
                false
            }
        }
    }

    fn commit_batch(&mut self, packages: &[Candidate]) -> Result<(), IndexError> {
        if packages.is_empty() {
            return Ok(());
        }

        let dry_run = self.dry_run;
        let Self { index, progress, sink, .. } = self;

        index.clear_marks();
        for candidate in packages {
            index.mark(&candidate.name, candidate.mark);
        }

        if dry_run {
            for candidate in packages {
                progress.tick();
                info!("dry run: installing {} ({})", candidate.name, progress);
                publish(sink, &progress.to_string());
            }

            index.clear_marks();
            return Ok(());
        }

        let result = index.commit_marked(&mut |event| {
            if let AptEvent::SettingUp { package } = event {
                if packages.iter().any(|c| c.name == package) {
                    progress.tick();
                    publish(sink, &progress.to_string());
                }
            }
        });

        index.clear_marks();
        result
    }

    fn fetch(&mut self, packages: &[Candidate]) -> Result<(), IndexError> {
        if packages.is_empty() {
            return Ok(());
        }

        let Self { index, progress, sink, .. } = self;

        index.clear_marks();
        for candidate in packages {
            index.mark(&candidate.name, candidate.mark);
        }

        let result = index.fetch_marked(&mut |event| {
            if let AptEvent::Fetched { package, .. } = event {
                if packages.iter().any(|c| c.name == package) {
                    progress.tick();
                    publish(sink, &progress.to_string());
                }
            }
        });

        index.clear_marks();
        result
    }

    /// Resolves virtual names to their providers, and keeps the names requiring action.
    fn build_candidates(&mut self, lists: &EffectivePackageLists) -> Result<Candidates, IndexError> {
        let system = action_list(&mut self.index, &lists.system)?;
        let mut application = action_list(&mut self.index, &lists.application)?;
        application.retain(|candidate| !system.iter().any(|s| s.name == candidate.name));

        Ok(Candidates { system, application })
    }

    /// Advisory only: a shortfall is reported, but nothing is aborted.
    fn check_disk_space(&mut self, packages: &[String]) {
        let required = match self.required_download_space(packages) {
            Ok(required) => required,
            Err(why) => {
                warn!("could not compute the required download space: {}", format_error(&why));
                return;
            }
        };

        let free = self.free_space(&self.config.download_dir);
        if free < 0 {
            warn!(
                "free space of {} is unknown; {} MB are required",
                self.config.download_dir.display(),
                required
            );
            return;
        }

        info!("{} MB required, {} MB available", required, free);
        if (free as u64) < required {
            warn!("insufficient disk space for update");
            publish(&mut self.sink, INSUFFICIENT_SPACE);
        }
    }

    /// Re-syncs the package index, falling back to the existing index if that fails.
    fn refresh_index(&mut self) -> Result<(), UpdateError> {
        if let Err(why) = self.index.refresh() {
            warn!("could not update the package index: {}", format_error(&why));
            self.index.reopen().map_err(UpdateError::Index)?;
        }

        Ok(())
    }

    fn run_hook(&mut self, hook: Hook) {
        if let Err(why) = self.host.run_hook(hook) {
            error!("{}: {:#}", hook, why);
        }
    }

    fn fire(&mut self, trigger: Trigger) {
        let (next, expected) = transition(self.state, trigger);

        if !expected {
            warn!("{:?} while the updater is in the {:?} state", trigger, self.state);
        }

        if next == self.state {
            return;
        }

        info!("state: {} -> {}", self.state, next);
        self.state = next;
        publish(&mut self.sink, next.into());
    }
}

fn action_list<I: PackageIndex>(
    index: &mut I,
    names: &[String],
) -> Result<Vec<Candidate>, IndexError> {
    let mut expanded = Vec::with_capacity(names.len());
    for name in names {
        match index.lookup(name)? {
            Lookup::Package(_) => expanded.push(name.clone()),
            Lookup::Virtual(providers) => {
                debug!("{} is provided by {}", name, providers.join(", "));
                expanded.extend(providers);
            }
            Lookup::Missing => warn!("package {} is not in the package index", name),
        }
    }

    let (mut upgrades, mut installs) = (0, 0);
    let mut actions = Vec::new();
    for name in dedupe(expanded.iter()) {
        let info = match index.lookup(&name)? {
            Lookup::Package(info) => info,
            _ => continue,
        };

        let mark = match info.required_action() {
            Some(mark) => mark,
            None => continue,
        };

        let candidate = info.candidate.as_deref().unwrap_or_default();
        match mark {
            Mark::Upgrade => {
                upgrades += 1;
                debug!("version {} available for {}", candidate, name);
            }
            Mark::Install => {
                installs += 1;
                debug!("{} not found, will install version {}", name, candidate);
            }
        }

        actions.push(Candidate { name, mark });
    }

    debug!(
        "checked {} packages, found {} upgradable and {} new",
        expanded.len(),
        upgrades,
        installs
    );

    Ok(actions)
}

/// Status writes are best-effort.
fn publish<S: StatusSink>(sink: &mut S, status: &str) {
    if let Err(why) = sink.set_status(status) {
        warn!("failed to publish status {:?}: {:#}", status, why);
    }
}

fn post<S: StatusSink>(sink: &mut S, level: MessageLevel, message: &str) {
    if let Err(why) = sink.post_message(level, message) {
        warn!("failed to post {} message {:?}: {:#}", level, message, why);
    }
}
