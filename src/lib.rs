#![deny(clippy::all)]

#[macro_use]
extern crate enclose;

#[macro_use]
extern crate log;

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate serde_derive;

/// Package index access through apt
pub mod apt;

/// Runtime configuration of the updater
pub mod config;

/// Scheduled tasks, and the detached installer
pub mod daemon;

/// Node role, hardware variant, disk space, and install hooks
pub mod host;

/// Logging setup shared by the CLI, the scheduler, and the detached installer
pub mod logging;

/// Parsing of the package list manifest
pub mod manifest;

/// Miscellaneous functions used throughout the library.
pub mod misc;

/// Where update status is published for the web UI
pub mod status;

/// The update controller and its state machine
pub mod updater;

pub const DEFAULT_CONFIG: &str = "/etc/ion-tsconfig/updater.json";

pub const VAR_LIB_DIR: &str = "/var/lib/ion-tsconfig";
