//! Game worker processes.
//!
//! A worker is the game's own server, started from the manifest's
//! `server_cmd` inside the staged package directory. The command line goes
//! to the platform shell as is, so compound commands and variable
//! assignments work. On unix the shell leads its own process group and
//! every signal goes to the whole group, which reaches the game whether or
//! not the shell stayed in between.
//!
//! The room owns its worker. Dropping a [`WorkerProcess`] kills the group;
//! the graceful path is [`WorkerProcess::terminate`].

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::RoomError;

/// A running game server process.
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    pid: Option<u32>,
}

impl WorkerProcess {
    /// Starts `command` through the platform shell with `cwd` as the
    /// working directory.
    ///
    /// # Errors
    /// [`RoomError::SpawnFailed`] if the shell cannot be started.
    pub fn spawn(command: &str, cwd: &Path) -> Result<Self, RoomError> {
        let mut cmd = shell_command(command);
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(RoomError::SpawnFailed)?;
        let pid = child.id();
        tracing::info!(?pid, %command, cwd = %cwd.display(), "worker started");
        Ok(Self { child, pid })
    }

    /// OS process id of the shell, which is also the process group id on
    /// unix.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns `true` if the shell has not exited yet.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Stops the worker: SIGTERM to the group first, a kill once `grace`
    /// runs out. Always reaps the shell. Whatever is left of the group
    /// after that is killed.
    pub async fn terminate(mut self, grace: Duration) {
        if !self.is_running() {
            tracing::debug!(pid = ?self.pid, "worker already exited");
            self.kill_group();
            return;
        }

        if self.signal_group_terminate() {
            match tokio::time::timeout(grace, self.child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::info!(pid = ?self.pid, %status, "worker stopped");
                    self.kill_group();
                    return;
                }
                Ok(Err(e)) => {
                    tracing::warn!(pid = ?self.pid, error = %e, "waiting for worker failed");
                }
                Err(_) => {
                    tracing::warn!(pid = ?self.pid, grace_ms = grace.as_millis() as u64, "worker ignored SIGTERM, killing");
                }
            }
        }

        self.kill_group();
        if let Err(e) = self.child.kill().await {
            tracing::warn!(pid = ?self.pid, error = %e, "failed to kill worker");
        } else {
            tracing::info!(pid = ?self.pid, "worker killed");
        }
    }

    #[cfg(unix)]
    fn group(&self) -> Option<nix::unistd::Pid> {
        self.pid
            .and_then(|pid| i32::try_from(pid).ok())
            .map(nix::unistd::Pid::from_raw)
    }

    #[cfg(unix)]
    fn signal_group_terminate(&self) -> bool {
        use nix::sys::signal::{killpg, Signal};

        let Some(group) = self.group() else {
            return false;
        };
        match killpg(group, Signal::SIGTERM) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(pgid = %group, error = %e, "SIGTERM failed");
                false
            }
        }
    }

    /// SIGKILL to every process left in the group. A group that is
    /// already empty is not an error.
    #[cfg(unix)]
    fn kill_group(&self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};

        let Some(group) = self.group() else {
            return;
        };
        match killpg(group, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::debug!(pgid = %group, error = %e, "SIGKILL to group failed"),
        }
    }

    #[cfg(not(unix))]
    fn signal_group_terminate(&self) -> bool {
        false
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        // An unreaped shell keeps the group id reserved, so the group
        // cannot belong to anyone else yet.
        if self.child.id().is_some() {
            self.kill_group();
        }
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).process_group(0);
    cmd
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Instant;

    use super::*;

    fn alive(pid: u32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        kill(Pid::from_raw(pid as i32), None).is_ok()
    }

    /// Running, as opposed to gone or a zombie nobody has reaped yet.
    #[cfg(target_os = "linux")]
    fn running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z"),
            Err(_) => false,
        }
    }

    async fn wait_for(path: &Path) {
        for _ in 0..100 {
            if path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} never appeared", path.display());
    }

    #[tokio::test]
    async fn test_spawn_runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = WorkerProcess::spawn("touch started.flag", dir.path()).unwrap();
        for _ in 0..100 {
            if !worker.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(dir.path().join("started.flag").exists());
    }

    #[tokio::test]
    async fn test_terminate_stops_cooperative_worker() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = WorkerProcess::spawn("sleep 30", dir.path()).unwrap();
        let pid = worker.pid().unwrap();
        assert!(worker.is_running());

        let started = Instant::now();
        worker.terminate(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!alive(pid));
    }

    #[tokio::test]
    async fn test_terminate_kills_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let worker = WorkerProcess::spawn("sh -c 'trap \"\" TERM; exec sleep 30'", dir.path()).unwrap();
        let pid = worker.pid().unwrap();
        // Give the trap time to install.
        tokio::time::sleep(Duration::from_millis(200)).await;

        worker.terminate(Duration::from_millis(200)).await;
        assert!(!alive(pid));
    }

    #[tokio::test]
    async fn test_compound_command_runs_and_terminates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("bin")).unwrap();
        let mut worker =
            WorkerProcess::spawn("cd bin && touch ran.flag && sleep 30", dir.path()).unwrap();
        let pid = worker.pid().unwrap();

        wait_for(&dir.path().join("bin/ran.flag")).await;
        assert!(worker.is_running());

        let started = Instant::now();
        worker.terminate(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!alive(pid));
    }

    #[tokio::test]
    async fn test_env_prefixed_command_sees_variable() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = WorkerProcess::spawn(
            "PORT=9123 sh -c 'touch \"$PORT.flag\"; sleep 30'",
            dir.path(),
        )
        .unwrap();
        let pid = worker.pid().unwrap();

        wait_for(&dir.path().join("9123.flag")).await;
        assert!(worker.is_running());

        let started = Instant::now();
        worker.terminate(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!alive(pid));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_drop_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let worker =
            WorkerProcess::spawn("sleep 30 & echo $! > sleeper.pid; wait", dir.path()).unwrap();
        let pid_file = dir.path().join("sleeper.pid");
        wait_for(&pid_file).await;
        let mut sleeper = String::new();
        for _ in 0..100 {
            sleeper = std::fs::read_to_string(&pid_file).unwrap();
            if sleeper.ends_with('\n') {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let sleeper: u32 = sleeper.trim().parse().unwrap();
        assert!(running(sleeper));

        drop(worker);
        for _ in 0..100 {
            if !running(sleeper) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!running(sleeper));
    }
}
