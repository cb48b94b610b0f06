use anyhow::Context;
use chrono::{DateTime, Local};
use std::{
    fmt::{self, Display, Formatter},
    fs::{self, OpenOptions, Permissions},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

/// Tag attached to every message posted by the updater.
pub const MESSAGE_TAG: &str = "updates";

const STATUS_MODE: u32 = 0o644;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl Display for MessageLevel {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.write_str(match self {
            MessageLevel::Info => "info",
            MessageLevel::Success => "success",
            MessageLevel::Warning => "warning",
            MessageLevel::Error => "error",
        })
    }
}

/// Where the human-readable update status, and operational alerts, are published.
///
/// Writes are last-writer-wins. Callers treat failures as best-effort.
pub trait StatusSink {
    fn set_status(&mut self, status: &str) -> anyhow::Result<()>;

    fn post_message(&mut self, level: MessageLevel, message: &str) -> anyhow::Result<()>;
}

impl<S: StatusSink + ?Sized> StatusSink for Box<S> {
    fn set_status(&mut self, status: &str) -> anyhow::Result<()> { (**self).set_status(status) }

    fn post_message(&mut self, level: MessageLevel, message: &str) -> anyhow::Result<()> {
        (**self).post_message(level, message)
    }
}

/// The persisted status record.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StatusRecord {
    pub ts_update_status: String,
    pub updated: DateTime<Local>,
}

#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct Message {
    pub level: MessageLevel,
    pub message: String,
    pub tags: String,
    pub posted: DateTime<Local>,
}

/// Status record and message log kept as files for the web UI of the head node.
pub struct StatusFile {
    status: PathBuf,
    messages: PathBuf,
}

impl StatusFile {
    pub fn new(status: PathBuf, messages: PathBuf) -> Self { Self { status, messages } }

    /// Reads the last status written, if any.
    pub fn read(path: &Path) -> anyhow::Result<Option<StatusRecord>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(why) if why.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(why) => {
                return Err(why).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .with_context(|| format!("status record at {} is malformed", path.display()))
    }
}

impl StatusSink for StatusFile {
    fn set_status(&mut self, status: &str) -> anyhow::Result<()> {
        let record = StatusRecord { ts_update_status: status.to_owned(), updated: Local::now() };
        let parent = self.status.parent().unwrap_or_else(|| Path::new("."));

        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .context("failed to create temporary status file")?;

        serde_json::to_writer(&mut temp, &record).context("failed to serialize status")?;

        // Read by the web UI, which does not run as root.
        temp.as_file()
            .set_permissions(Permissions::from_mode(STATUS_MODE))
            .context("failed to set permissions of the status file")?;

        temp.persist(&self.status)
            .with_context(|| format!("failed to replace {}", self.status.display()))?;

        Ok(())
    }

    fn post_message(&mut self, level: MessageLevel, message: &str) -> anyhow::Result<()> {
        let message = Message {
            level,
            message: message.to_owned(),
            tags: MESSAGE_TAG.to_owned(),
            posted: Local::now(),
        };

        if let Some(parent) = self.messages.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut line = serde_json::to_string(&message).context("failed to serialize message")?;
        line.push('\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.messages)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .with_context(|| format!("failed to append to {}", self.messages.display()))
    }
}

/// Compute nodes have no access to the status record.
pub struct NullSink;

impl StatusSink for NullSink {
    fn set_status(&mut self, status: &str) -> anyhow::Result<()> {
        debug!("status: {}", status);
        Ok(())
    }

    fn post_message(&mut self, level: MessageLevel, message: &str) -> anyhow::Result<()> {
        debug!("{} message: {}", level, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(dir: &Path) -> StatusFile {
        StatusFile::new(dir.join("lib/status.json"), dir.join("lib/messages.jsonl"))
    }

    #[test]
    fn status_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink(dir.path());

        sink.set_status("Checking for update").unwrap();
        sink.set_status("Available").unwrap();

        let record = StatusFile::read(&dir.path().join("lib/status.json")).unwrap().unwrap();
        assert_eq!(record.ts_update_status, "Available");
    }

    #[test]
    fn status_is_world_readable() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink(dir.path());
        sink.set_status("Available").unwrap();

        let metadata = fs::metadata(dir.path().join("lib/status.json")).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o644);
    }

    #[test]
    fn missing_status() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(StatusFile::read(&dir.path().join("status.json")).unwrap(), None);
    }

    #[test]
    fn messages_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = sink(dir.path());

        sink.post_message(MessageLevel::Error, "Application packages failed to download!").unwrap();
        sink.post_message(MessageLevel::Success, "Upgrade completed successfully!").unwrap();

        let log = fs::read_to_string(dir.path().join("lib/messages.jsonl")).unwrap();
        let messages = log
            .lines()
            .map(|line| serde_json::from_str::<Message>(line).unwrap())
            .collect::<Vec<_>>();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].level, MessageLevel::Error);
        assert_eq!(messages[0].tags, MESSAGE_TAG);
        assert_eq!(messages[1].message, "Upgrade completed successfully!");
    }

    #[test]
    fn boxed_sink() {
        let mut sink: Box<dyn StatusSink> = Box::new(NullSink);
        assert!(sink.set_status("Installing").is_ok());
        assert!(sink.post_message(MessageLevel::Info, "hello").is_ok());
    }
}
