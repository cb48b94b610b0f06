use std::{
    io::{self, BufRead, BufReader, Read},
    process::{Command, ExitStatus, Stdio},
    thread,
};

/// Default options used by all apt-get invocations in ion-tsconfig.
pub fn apt_get() -> Command {
    let mut cmd = Command::new("apt-get");
    cmd.env("DEBIAN_FRONTEND", "noninteractive")
        .env("LANG", "C")
        .args(&["-y", "-o", "Dpkg::Options::=--force-confdef"])
        .args(&["-o", "Dpkg::Options::=--force-confold"]);
    cmd
}

pub fn apt_cache() -> Command {
    let mut cmd = Command::new("apt-cache");
    cmd.env("LANG", "C");
    cmd
}

pub trait StatusExt {
    fn as_result(self) -> io::Result<()>;
}

impl StatusExt for ExitStatus {
    fn as_result(self) -> io::Result<()> {
        if self.success() {
            Ok(())
        } else if let Some(127) = self.code() {
            Err(io::Error::new(io::ErrorKind::NotFound, "command was not found"))
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("command failed with exit status: {}", self),
            ))
        }
    }
}

/// Runs a command to completion, returning its stdout if it exited successfully.
pub fn output(cmd: &mut Command) -> io::Result<String> {
    let output = cmd.stdin(Stdio::null()).output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            debug!("{:?}: {}", cmd, stderr);
        }
    }

    output.status.as_result().map(|_| String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs a command, handing each line of its stdout to `callback` as it arrives.
///
/// Stderr is collected on a separate thread and logged when the command fails.
pub fn stream_lines(cmd: &mut Command, callback: &mut dyn FnMut(&str)) -> io::Result<()> {
    let mut child =
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;

    let stderr = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buffer = String::new();
            let _ = stderr.read_to_string(&mut buffer);
            buffer
        })
    });

    // Output is not always UTF-8, and the pipe must stay open until the child exits.
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer);
                    callback(line.trim_end_matches(&['\n', '\r'][..]));
                }
                Err(why) if why.kind() == io::ErrorKind::Interrupted => (),
                Err(why) => {
                    warn!("failed to read output of {:?}: {}", cmd, why);
                    let _ = io::copy(&mut reader, &mut io::sink());
                    break;
                }
            }
        }
    }

    let status = child.wait()?;

    if let Some(stderr) = stderr.and_then(|handle| handle.join().ok()) {
        let stderr = stderr.trim();
        if !status.success() && !stderr.is_empty() {
            error!("{:?}: {}", cmd, stderr);
        }
    }

    status.as_result()
}

pub fn format_error(source: &(dyn std::error::Error + 'static)) -> String {
    let mut out = source.to_string();

    let mut source = source.source();
    while let Some(why) = source {
        out.push_str(": ");
        out.push_str(&why.to_string());
        source = why.source();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("failed to fetch packages")]
    struct Outer(#[source] io::Error);

    #[test]
    fn format_error_chain() {
        let error = Outer(io::Error::new(io::ErrorKind::Other, "network unreachable"));
        assert_eq!(format_error(&error), "failed to fetch packages: network unreachable");
    }

    #[test]
    fn exit_status_as_result() {
        let ok = Command::new("true").status().unwrap();
        assert!(ok.as_result().is_ok());

        let failed = Command::new("false").status().unwrap();
        assert!(failed.as_result().is_err());
    }

    #[test]
    fn stream_lines_in_order() {
        let mut lines = Vec::new();
        stream_lines(Command::new("printf").arg("one\\ntwo\\n"), &mut |line| {
            lines.push(line.to_owned())
        })
        .unwrap();

        assert_eq!(lines, vec!["one".to_owned(), "two".to_owned()]);
    }

    #[test]
    fn stream_lines_survives_invalid_utf8() {
        let script = "printf 'Setting up ion-db (1) ...\\n\\351t\\351\\n'; \
                      i=0; while [ $i -lt 20000 ]; do echo \"line $i\"; i=$((i+1)); done";

        let mut lines = Vec::new();
        stream_lines(Command::new("sh").args(&["-c", script]), &mut |line| {
            lines.push(line.to_owned())
        })
        .unwrap();

        assert_eq!(lines.len(), 20002);
        assert_eq!(lines[1], "\u{FFFD}t\u{FFFD}");
        assert_eq!(lines.last().map(String::as_str), Some("line 19999"));
    }
}
