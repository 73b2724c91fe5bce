//! Spawning, feeding and reaping child processes

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, instrument};

use crate::config::{Config, StdinMode};
use crate::process::ProcessError;
use crate::process::quote::shell_pipeline;
use crate::types::ProcessResult;

/// Per-invocation options
#[derive(Debug, Clone)]
pub struct RunOptions<'a> {
    /// Wall-clock budget; the child is killed once it runs out
    pub timeout: Duration,

    /// Payload for the child's standard input
    pub stdin: Option<&'a str>,

    /// Working directory for the child
    pub working_dir: Option<&'a Path>,

    /// Extra environment variables
    pub env: Vec<(&'a str, &'a str)>,
}

impl<'a> RunOptions<'a> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            stdin: None,
            working_dir: None,
            env: Vec::new(),
        }
    }

    pub fn stdin(mut self, input: Option<&'a str>) -> Self {
        self.stdin = input;
        self
    }

    pub fn working_dir(mut self, dir: &'a Path) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.env.extend(vars);
        self
    }
}

/// Runs external programs and captures their output
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Cap on captured bytes per stream
    max_output_bytes: u64,

    /// How stdin reaches the child
    stdin_mode: StdinMode,

    /// Shell used by [`StdinMode::Shell`]
    shell: PathBuf,
}

impl ProcessRunner {
    pub fn new(max_output_bytes: u64, stdin_mode: StdinMode, shell: impl Into<PathBuf>) -> Self {
        Self {
            max_output_bytes,
            stdin_mode,
            shell: shell.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.limits.max_output_bytes,
            config.execution.stdin_mode,
            &config.execution.shell,
        )
    }

    pub fn stdin_mode(&self) -> StdinMode {
        self.stdin_mode
    }

    /// Run `program` with `args` until it exits or the timeout elapses.
    ///
    /// The argument vector is passed to the program directly. The shell is only
    /// involved when stdin is supplied and the runner is in
    /// [`StdinMode::Shell`], in which case every part of the command line is
    /// quoted first.
    #[instrument(skip(self, args, options), fields(program = %program.display(), timeout = ?options.timeout))]
    pub async fn run<A>(
        &self,
        program: &Path,
        args: &[A],
        options: RunOptions<'_>,
    ) -> Result<ProcessResult, ProcessError>
    where
        A: AsRef<OsStr>,
    {
        if program.as_os_str().is_empty() {
            return Err(ProcessError::EmptyCommand);
        }

        let (mut command, piped_input) = match (options.stdin, self.stdin_mode) {
            (Some(input), StdinMode::Shell) => {
                let args: Vec<String> = args
                    .iter()
                    .map(|arg| arg.as_ref().to_string_lossy().into_owned())
                    .collect();
                let line = shell_pipeline(&program.to_string_lossy(), &args, Some(input));
                debug!(shell = %self.shell.display(), %line, "running through shell");

                let mut command = Command::new(&self.shell);
                command.arg("-c").arg(line).stdin(Stdio::null());
                (command, None)
            }
            (input, _) => {
                let mut command = Command::new(program);
                command.args(args).stdin(if input.is_some() {
                    Stdio::piped()
                } else {
                    Stdio::null()
                });
                (command, input)
            }
        };

        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout reaches everything the child forks
        #[cfg(unix)]
        command.process_group(0);
        if let Some(dir) = options.working_dir {
            command.current_dir(dir);
        }
        command.envs(options.env.iter().copied());

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: program.display().to_string(),
            source,
        })?;
        let group = ProcessGroup::new(child.id());

        let stdin_pipe = child.stdin.take();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let limit = self.max_output_bytes;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let waited = tokio::time::timeout(options.timeout, async {
            let ((), (), (), status) = tokio::try_join!(
                feed(stdin_pipe, piped_input),
                drain(stdout_pipe, limit, &mut stdout),
                drain(stderr_pipe, limit, &mut stderr),
                child.wait(),
            )?;
            Ok::<_, std::io::Error>(status)
        })
        .await;

        let (status, killed) = match waited {
            Ok(status) => (status?, false),
            Err(_) => {
                debug!("timeout elapsed, killing process group");
                group.kill();
                // The child may already be reaped while a grandchild keeps the pipes open
                if let Err(e) = child.start_kill() {
                    debug!(error = %e, "child already exited");
                }
                (child.wait().await?, true)
            }
        };

        let result = ProcessResult {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: status.code(),
            signal: exit_signal(&status),
            killed,
        };

        debug!(
            exit_code = ?result.exit_code,
            signal = ?result.signal,
            killed,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "process finished"
        );

        Ok(result)
    }
}

/// The process group led by a spawned child.
///
/// Dropping it kills whatever is left in the group, which covers both a
/// finished child that left background jobs behind and a run whose future was
/// dropped midway.
#[derive(Debug)]
struct ProcessGroup {
    pgid: Option<i32>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    fn kill(&self) {
        if let Some(pgid) = self.pgid {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: i32) {
    // SAFETY: kill(2) takes no pointers; a negative pid addresses the group
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == -1 {
        let err = std::io::Error::last_os_error();
        // ESRCH: the group is already empty
        if err.raw_os_error() != Some(libc::ESRCH) {
            debug!(pgid, error = %err, "failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) {}

async fn feed(pipe: Option<ChildStdin>, input: Option<&str>) -> std::io::Result<()> {
    let (Some(mut pipe), Some(input)) = (pipe, input) else {
        return Ok(());
    };

    match pipe.write_all(input.as_bytes()).await {
        // The child is free to exit without reading its input
        Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

async fn drain<R>(pipe: Option<R>, limit: u64, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(());
    };

    (&mut pipe).take(limit).read_to_end(buf).await?;
    // Keep reading so the child never blocks on a full pipe
    tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await?;
    Ok(())
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
