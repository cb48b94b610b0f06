use crate::misc::StatusExt;
use std::{
    env, io,
    os::unix::process::CommandExt,
    path::Path,
    process::{Command, Stdio},
    thread,
};

/// Re-executes this binary as `install --detached` in a new session.
///
/// The installer outlives the caller, and is free to replace the caller's files. The caller
/// does not wait on it; a thread reaps the child if the caller happens to outlive it.
pub fn spawn_detached_installer(config_path: &Path) -> io::Result<u32> {
    let exe = env::current_exe()?;

    let mut command = Command::new(exe);
    command
        .arg("--config")
        .arg(config_path)
        .args(&["install", "--detached"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    unsafe {
        command.pre_exec(|| nix::unistd::setsid().map(|_| ()).map_err(io::Error::from));
    }

    let mut child = command.spawn()?;
    let pid = child.id();

    thread::spawn(move || match child.wait() {
        Ok(status) => debug!("detached installer {} exited with {}", pid, status),
        Err(why) => warn!("failed to reap detached installer {}: {}", pid, why),
    });

    Ok(pid)
}

/// Starts the background task worker if it is not already running.
pub fn restart_worker(service: &str) {
    info!("ensuring that {} is running", service);

    let result = Command::new("service")
        .args(&[service, "start"])
        .stdin(Stdio::null())
        .status()
        .and_then(StatusExt::as_result);

    if let Err(why) = result {
        error!("failed to start {}: {}", service, why);
    }
}
