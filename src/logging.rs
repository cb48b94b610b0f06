use fern::{Dispatch, InitError};
use log::{Level, LevelFilter, Record};
use std::{fs, io, path::Path};
use yansi::Color;

/// Log files larger than this are rolled over before a process attaches to them.
pub const ROLLOVER_BYTES: u64 = 1024 * 1024;

/// Number of rolled-over log files which are kept.
pub const BACKUP_COUNT: u32 = 5;

/// Must be called once per process. The detached installer is a new process, and therefore
/// sets up its own dispatch rather than inheriting one.
pub fn setup_logging(filter: LevelFilter, log_file: Option<&Path>) -> Result<(), InitError> {
    let location = |record: &Record| match (record.file(), record.line()) {
        (Some(file), Some(line)) => format!("{}:{}", strip_src(file), line),
        _ => String::new(),
    };

    let stderr = Dispatch::new()
        .format(move |out, message, record| {
            let color = match record.level() {
                Level::Trace => Color::Cyan.style().bold(),
                Level::Debug => Color::Blue.style().bold(),
                Level::Error => Color::Red.style().bold(),
                Level::Warn => Color::Yellow.style().bold(),
                Level::Info => Color::Green.style().bold(),
            };

            out.finish(format_args!(
                "[{:5}] {}: {}",
                color.paint(record.level()),
                Color::Magenta.paint(location(record)),
                message
            ))
        })
        .chain(io::stderr());

    let mut dispatch = Dispatch::new()
        // Exclude logs for crates that we use
        .level(LevelFilter::Off)
        // Include only the logs for this crate
        .level_for("ion_tsconfig", filter)
        .chain(stderr);

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        if let Err(why) = rollover(path, ROLLOVER_BYTES, BACKUP_COUNT) {
            eprintln!("failed to roll over log file at {:?}: {}", path, why);
        }

        let file = Dispatch::new()
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "{}\t{}\t{}\t{}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    location(record),
                    message
                ))
            })
            .chain(fern::log_file(path)?);

        dispatch = dispatch.chain(file);
    }

    dispatch.apply()?;
    Ok(())
}

/// Shifts `log` to `log.1`, `log.1` to `log.2`, and so on, if `log` exceeds `max_bytes`.
///
/// The oldest backup beyond `backups` is discarded. Returns `true` if a rollover occurred.
pub fn rollover(path: &Path, max_bytes: u64, backups: u32) -> io::Result<bool> {
    let size = match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(why) if why.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(why) => return Err(why),
    };

    if size <= max_bytes {
        return Ok(false);
    }

    let backup = |n: u32| {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".{}", n));
        std::path::PathBuf::from(name)
    };

    if backups == 0 {
        fs::remove_file(path)?;
        return Ok(true);
    }

    let oldest = backup(backups);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for n in (1..backups).rev() {
        let from = backup(n);
        if from.exists() {
            fs::rename(&from, backup(n + 1))?;
        }
    }

    fs::rename(path, backup(1))?;
    Ok(true)
}

fn strip_src(input: &str) -> &str { input.split("src/").nth(1).unwrap_or(input) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_src() {
        assert_eq!(super::strip_src("/build/ion-tsconfig/src/updater/mod.rs"), "updater/mod.rs");
        assert_eq!(super::strip_src("main.rs"), "main.rs");
    }

    #[test]
    fn small_log_is_not_rolled_over() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("tsconfig.log");
        fs::write(&log, "short").unwrap();

        assert!(!rollover(&log, 1024, 5).unwrap());
        assert!(log.exists());
    }

    #[test]
    fn missing_log_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!rollover(&dir.path().join("absent.log"), 1024, 5).unwrap());
    }

    #[test]
    fn large_log_shifts_backups() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("tsconfig.log");
        let first = dir.path().join("tsconfig.log.1");
        let second = dir.path().join("tsconfig.log.2");

        fs::write(&first, "older").unwrap();
        fs::write(&log, "0123456789").unwrap();

        assert!(rollover(&log, 4, 5).unwrap());
        assert!(!log.exists());
        assert_eq!(fs::read_to_string(&first).unwrap(), "0123456789");
        assert_eq!(fs::read_to_string(&second).unwrap(), "older");
    }

    #[test]
    fn oldest_backup_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("tsconfig.log");
        let first = dir.path().join("tsconfig.log.1");
        let second = dir.path().join("tsconfig.log.2");
        let third = dir.path().join("tsconfig.log.3");

        fs::write(&first, "one").unwrap();
        fs::write(&second, "two").unwrap();
        fs::write(&log, "current").unwrap();

        assert!(rollover(&log, 1, 2).unwrap());
        assert_eq!(fs::read_to_string(&first).unwrap(), "current");
        assert_eq!(fs::read_to_string(&second).unwrap(), "one");
        assert!(!third.exists());
    }
}
