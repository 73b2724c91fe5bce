//! Compile-and-run pipeline
//!
//! Validates a submission, stages it into a fresh workspace, builds it with
//! the external toolchain, optionally runs the result, and removes the
//! workspace before returning, whatever happened along the way.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub use crate::pipeline::build::{Toolchain, build_error};

mod build;
mod execute;

use crate::config::{Config, ConfigError, StdinMode};
use crate::process::{ProcessError, ProcessRunner};
use crate::types::{PipelineOutcome, SubmissionRequest};
use crate::workspace::{Workspace, WorkspaceError, guard};

/// Whether to stop after building or also run the executable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Build,
    Run,
}

/// Internal failures that are not part of the submission's outcome
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Orchestrates one compile (and optional run) per request
///
/// Requests share nothing but the workspace root, under which each one gets
/// its own uniquely named directory, so a single pipeline can serve any
/// number of concurrent requests.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    workspace_root: PathBuf,
    toolchain: Toolchain,
    runner: ProcessRunner,
}

impl Pipeline {
    /// Create a pipeline, resolving relative paths against the current directory
    pub fn new(config: Config) -> Result<Self, PipelineError> {
        config.validate()?;
        let workspace_root = std::path::absolute(&config.workspace_root)?;
        let toolchain = Toolchain::from_config(&config.toolchain)?;
        let runner = ProcessRunner::from_config(&config);

        debug!(
            workspace_root = %workspace_root.display(),
            toolchain = %toolchain.program().display(),
            "pipeline ready"
        );

        Ok(Self {
            config,
            workspace_root,
            toolchain,
            runner,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Absolute directory that holds the per-request workspaces
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Build the submission without running it
    pub async fn build(
        &self,
        request: &SubmissionRequest,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.process(request, Mode::Build).await
    }

    /// Build the submission and run the result
    pub async fn run(&self, request: &SubmissionRequest) -> Result<PipelineOutcome, PipelineError> {
        self.process(request, Mode::Run).await
    }

    /// Process one submission.
    ///
    /// The workspace is released on every path out of the pipeline. If this
    /// future is dropped midway, running children are killed and the
    /// workspace's `Drop` removes the directory.
    #[instrument(skip(self, request), fields(entrypoint = %request.entrypoint, files = request.files.len()))]
    pub async fn process(
        &self,
        request: &SubmissionRequest,
        mode: Mode,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut workspace = Workspace::new(&self.workspace_root);
        let workspace_id = workspace.id();

        let result = self.process_in(&mut workspace, request, mode).await;

        debug!(workspace = %workspace_id, "cleaning up");
        workspace.cleanup().await;

        match &result {
            Ok(outcome) => info!(workspace = %workspace_id, outcome = outcome.kind(), "submission processed"),
            Err(e) => warn!(workspace = %workspace_id, error = %e, "internal failure"),
        }
        result
    }

    async fn process_in(
        &self,
        workspace: &mut Workspace,
        request: &SubmissionRequest,
        mode: Mode,
    ) -> Result<PipelineOutcome, PipelineError> {
        debug!("validating");
        if let Err(message) = validate(request, workspace.root(), self.runner.stdin_mode()) {
            return Ok(PipelineOutcome::validation(message));
        }

        debug!("staging");
        match workspace.stage(&request.files).await {
            Ok(_) => {}
            Err(WorkspaceError::InvalidPath(message)) => {
                return Ok(PipelineOutcome::validation(message));
            }
            Err(e) => {
                warn!(error = %e, "failed to stage files");
                return Ok(PipelineOutcome::validation(
                    "Failed to write the submitted files.",
                ));
            }
        }

        let entrypoint = match workspace.resolve(&request.entrypoint) {
            Ok(path) => path,
            Err(e) => return Ok(PipelineOutcome::validation(e.to_string())),
        };
        let executable = workspace.executable_path();

        debug!("building");
        let compilation = build::build(
            &self.runner,
            &self.toolchain,
            workspace.root(),
            &entrypoint,
            &executable,
            self.config.limits.build_timeout(),
        )
        .await?;

        if let Some(exit) = build_error(
            &compilation,
            self.config.execution.build_stdout_is_failure,
        ) {
            return Ok(PipelineOutcome::CompilationFailure {
                exit,
                stdout: compilation.stdout,
                stderr: compilation.stderr,
            });
        }

        workspace.record(executable.clone());

        if mode == Mode::Build {
            return Ok(PipelineOutcome::Success {
                stdout: compilation.stdout,
                stderr: compilation.stderr,
            });
        }

        if !tokio::fs::try_exists(&executable).await? {
            warn!(executable = %executable.display(), "toolchain reported success but produced no executable");
            return Ok(PipelineOutcome::CompilationFailure {
                exit: compilation.exit_info(),
                stdout: compilation.stdout,
                stderr: compilation.stderr,
            });
        }

        debug!("executing");
        let execution = execute::execute(
            &self.runner,
            &executable,
            request,
            workspace.root(),
            self.config.limits.run_timeout(),
        )
        .await?;

        Ok(match execution.exit_error() {
            Some(exit) => PipelineOutcome::ExecutionFailure {
                exit,
                stdout: execution.stdout,
                stderr: execution.stderr,
            },
            None => PipelineOutcome::Success {
                stdout: execution.stdout,
                stderr: execution.stderr,
            },
        })
    }
}

/// Check the request shape and every filename before anything is written
fn validate(
    request: &SubmissionRequest,
    root: &Path,
    stdin_mode: StdinMode,
) -> Result<(), String> {
    if !request.files.contains_key(&request.entrypoint) {
        return Err(format!(
            "Entrypoint {} not found in files.",
            request.entrypoint
        ));
    }

    // Neither an argv entry nor a shell command line can carry a NUL
    if let Some(index) = request.args.iter().position(|arg| arg.contains('\0')) {
        return Err(format!("Argument {index} contains a NUL byte."));
    }
    if stdin_mode == StdinMode::Shell && request.stdin().is_some_and(|s| s.contains('\0')) {
        return Err("Stdin contains a NUL byte.".to_string());
    }

    guard::resolve_all(request.files.keys().map(String::as_str), root)
        .map(|_| ())
        .map_err(|e| e.to_string())
}
