#[macro_use]
extern crate log;

pub mod error {
    use ion_tsconfig::{config::LoadError, daemon::TaskError};
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum Error {
        #[error("failed to load the updater configuration")]
        Config(#[from] LoadError),

        #[error("failed to set up logging")]
        Logging(#[from] fern::InitError),

        #[error("failed to read the update status")]
        Status(#[source] anyhow::Error),

        #[error("updater task failed")]
        Task(#[from] TaskError),

        #[error("the packages were not all downloaded")]
        DownloadFailed,

        #[error("the packages were not all installed")]
        InstallFailed,

        #[error("root is required for this operation")]
        NotRoot,
    }
}

use self::error::Error;
use clap::{Arg, ArgMatches, Command};
use ion_tsconfig::{
    config::Config,
    daemon::{self, TaskError},
    logging::setup_logging,
    misc::format_error,
    status::StatusFile,
    updater::UpdateState,
    DEFAULT_CONFIG,
};
use log::LevelFilter;
use std::{path::PathBuf, process::exit};

pub fn main() {
    let clap = Command::new("ion-tsconfig")
        .about("Torrent Server update utility")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .help("location of the updater configuration")
                .long("config")
                .short('c')
                .takes_value(true)
                .value_name("PATH")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .help("log debug messages")
                .long("verbose")
                .short('v')
                .global(true),
        )
        .subcommand(Command::new("poll").about("check for package updates"))
        .subcommand(
            Command::new("download").about("download package updates without installing them").arg(
                Arg::new("install")
                    .help("install the updates in the background once they are downloaded")
                    .long("install"),
            ),
        )
        .subcommand(
            Command::new("install")
                .about("install downloaded package updates in a detached process")
                .arg(
                    Arg::new("foreground")
                        .help("install in this process, and wait for the install to finish")
                        .long("foreground"),
                )
                .arg(Arg::new("detached").long("detached").hide(true)),
        )
        .subcommand(Command::new("status").about("show the last recorded update status"))
        .subcommand(Command::new("service").about("check for updates on a fixed interval"));

    if let Err(why) = main_(&clap.get_matches()) {
        eprintln!("ion-tsconfig: {}", format_error(&why));
        exit(1);
    }
}

fn main_(matches: &ArgMatches) -> Result<(), Error> {
    let (name, matches) = match matches.subcommand() {
        Some(subcommand) => subcommand,
        None => unreachable!("clap argument parsing failed"),
    };

    let config_path = PathBuf::from(matches.value_of("config").unwrap_or(DEFAULT_CONFIG));
    let config = Config::load(&config_path)?;

    let filter = if matches.is_present("verbose") { LevelFilter::Debug } else { LevelFilter::Info };

    if name == "status" {
        setup_logging(filter, None)?;
        return status(&config);
    }

    if !nix::unistd::geteuid().is_root() {
        return Err(Error::NotRoot);
    }

    setup_logging(filter, Some(&config.log_file))?;

    match name {
        "poll" => {
            let packages = daemon::check_updates(&config, &config_path)?;
            if packages.is_empty() {
                println!("no updates available");
            } else {
                println!("{} updates available:", packages.len());
                for package in packages {
                    println!("  {}", package);
                }
            }
        }
        "download" => {
            let auto_install = matches.is_present("install") || config.auto_install;
            let outcome = daemon::download_updates(&config, &config_path, auto_install)?;
            println!("downloaded {} packages", outcome.packages().len());
            if !outcome.succeeded() {
                return Err(Error::DownloadFailed);
            }
        }
        "install" => {
            if matches.is_present("detached") || matches.is_present("foreground") {
                info!("installing updates in process {}", std::process::id());
                if !daemon::run_detached_install(&config)?.succeeded() {
                    return Err(Error::InstallFailed);
                }
            } else {
                let pid = daemon::spawn_detached_installer(&config_path)
                    .map_err(|why| Error::Task(TaskError::Detach(why)))?;
                println!("installing updates in the background (process {})", pid);
            }
        }
        "service" => daemon::run_scheduler(config, config_path)?,
        _ => unreachable!("clap argument parsing failed"),
    }

    Ok(())
}

fn status(config: &Config) -> Result<(), Error> {
    match StatusFile::read(&config.status_file).map_err(Error::Status)? {
        Some(record) => {
            println!("{} (updated {})", record.ts_update_status, record.updated.to_rfc2822());
            if UpdateState::from_label(&record.ts_update_status).is_some_and(UpdateState::is_failure) {
                println!("see {} for details", config.log_file.display());
            }
        }
        None => println!("no update status has been recorded"),
    }

    Ok(())
}
