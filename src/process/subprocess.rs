//! Simulator subprocess execution with a wall-clock timeout
//!
//! The child runs in its own process group so that a timeout can take down
//! the launcher and every rank it spawned.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::command::SimCommand;
use crate::utils::file_safe;

/// Subprocess errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Failed waiting for {program}: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },

    #[error("Failed to create output file {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where a run's output goes
#[derive(Clone, Debug)]
pub struct ProcessIo {
    pub working_dir: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

impl ProcessIo {
    /// Run in `working_dir`, capturing to `<output_dir>/<stem>.out` and `.err`.
    /// The stem is made file-safe so captures stay inside `output_dir`.
    pub fn new(working_dir: impl Into<PathBuf>, output_dir: &Path, stem: &str) -> Self {
        let stem = file_safe(stem);
        Self {
            working_dir: working_dir.into(),
            stdout: output_dir.join(format!("{stem}.out")),
            stderr: output_dir.join(format!("{stem}.err")),
        }
    }
}

/// How a subprocess ended
#[derive(Clone, Debug)]
pub struct ProcessOutcome {
    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,

    /// Terminating signal, if any
    pub signal: Option<i32>,

    /// Killed because the timeout expired
    pub timed_out: bool,

    pub elapsed: Duration,
}

impl ProcessOutcome {
    pub fn describe(&self) -> String {
        match (self.timed_out, self.exit_code, self.signal) {
            (true, _, _) => format!("timed out after {}s", self.elapsed.as_secs()),
            (false, Some(code), _) => format!("exit code {code}"),
            (false, None, Some(signal)) => format!("killed by signal {signal}"),
            (false, None, None) => "terminated abnormally".to_string(),
        }
    }
}

/// Run a command, killing its process group if it outlives the timeout
pub async fn run_with_timeout(
    command: &SimCommand,
    io: &ProcessIo,
    timeout: Duration,
) -> Result<ProcessOutcome, ProcessError> {
    let program = command.program().to_string();
    let stdout = create_output(&io.stdout)?;
    let stderr = create_output(&io.stderr)?;

    let mut std_command = std::process::Command::new(&program);
    std_command
        .args(command.argv())
        .current_dir(&io.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        std_command.process_group(0);
    }

    let mut child = Command::from(std_command)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

    debug!("Started {} (pid {:?})", command, child.id());
    let mut group = GroupGuard::new(child.id());
    let start = Instant::now();

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            group.disarm();
            Ok(ProcessOutcome {
                exit_code: status.code(),
                signal: exit_signal(&status),
                timed_out: false,
                elapsed: start.elapsed(),
            })
        }
        Ok(Err(source)) => Err(ProcessError::Wait { program, source }),
        Err(_) => {
            warn!(
                "{} exceeded {}s timeout, killing process tree",
                program,
                timeout.as_secs()
            );
            kill_tree(&mut child).await;
            group.disarm();
            Ok(ProcessOutcome {
                exit_code: None,
                signal: None,
                timed_out: true,
                elapsed: start.elapsed(),
            })
        }
    }
}

fn create_output(path: &Path) -> Result<File, ProcessError> {
    File::create(path).map_err(|source| ProcessError::Output {
        path: path.to_path_buf(),
        source,
    })
}

/// Kills the child's process group when dropped before the child is reaped.
///
/// `kill_on_drop` only reaches the direct child; ranks started by `mpirun`
/// live in the same group and go down with this guard.
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    /// The child was reaped; its group id may be reused
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            debug!("Killing process group {} on cancellation", pgid);
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        debug!("killpg({}) failed: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Kill the child's process group, then the child itself, and reap it
async fn kill_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_group(pid);
    }

    if let Err(e) = child.kill().await {
        debug!("Failed to kill child: {}", e);
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_capture_paths_stay_in_output_dir() {
        let io = ProcessIo::new("/suites", Path::new("/out/demo"), "../escape");
        assert_eq!(io.stdout, PathBuf::from("/out/demo/___escape.out"));
        assert_eq!(io.stderr, PathBuf::from("/out/demo/___escape.err"));
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let dir = tempdir().unwrap();
        let model = script(dir.path(), "model.sh", "echo hello\necho oops >&2\nexit 3\n");
        let io = ProcessIo::new(dir.path(), dir.path(), "case");

        let outcome = run_with_timeout(
            &SimCommand::new("sh", model),
            &io,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(outcome.exit_code, Some(3));
        assert!(!outcome.timed_out);
        assert_eq!(outcome.describe(), "exit code 3");
        assert_eq!(std::fs::read_to_string(&io.stdout).unwrap(), "hello\n");
        assert_eq!(std::fs::read_to_string(&io.stderr).unwrap(), "oops\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_process_group() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("survivor");
        // The background sleeper shares the process group and must die too
        let body = format!(
            "(sleep 2; touch {}) &\nsleep 30\n",
            marker.to_string_lossy()
        );
        let model = script(dir.path(), "slow.sh", &body);
        let io = ProcessIo::new(dir.path(), dir.path(), "slow");

        let outcome = run_with_timeout(
            &SimCommand::new("sh", model),
            &io,
            Duration::from_millis(300),
        )
        .await
        .unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
        assert!(outcome.describe().starts_with("timed out"));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_kills_process_group() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("survivor");
        let body = format!(
            "(sleep 2; touch {}) &\nsleep 30\n",
            marker.to_string_lossy()
        );
        let model = script(dir.path(), "rank.sh", &body);
        let io = ProcessIo::new(dir.path(), dir.path(), "rank");

        let handle = tokio::spawn(async move {
            run_with_timeout(&SimCommand::new("sh", model), &io, Duration::from_secs(60)).await
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempdir().unwrap();
        let io = ProcessIo::new(dir.path(), dir.path(), "missing");
        let result = run_with_timeout(
            &SimCommand::new("/nonexistent/sst-binary", "model.py"),
            &io,
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }
}
