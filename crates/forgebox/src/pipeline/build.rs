//! Build step
//!
//! Invokes the toolchain as `<launcher...> build -o <output> <entrypoint>` and
//! decides whether the result counts as a successful build.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, instrument};

use crate::config::ToolchainConfig;
use crate::process::{ProcessError, ProcessRunner, RunOptions};
use crate::types::{ExitInfo, ProcessResult};

/// Resolved toolchain launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    program: PathBuf,
    launcher_args: Vec<String>,
    subcommand: String,
    env: HashMap<String, String>,
}

impl Toolchain {
    /// Resolve the configured launcher.
    ///
    /// A relative program path containing a separator is made absolute against
    /// the current directory, because builds run with the workspace as their
    /// working directory. Bare names are left for `PATH` lookup.
    pub fn from_config(config: &ToolchainConfig) -> std::io::Result<Self> {
        let (program, launcher_args) = config
            .command
            .split_first()
            .ok_or_else(|| std::io::Error::other("toolchain command is empty"))?;

        let program = PathBuf::from(program);
        let program = if program.is_relative() && program.components().count() > 1 {
            std::path::absolute(&program)?
        } else {
            program
        };

        Ok(Self {
            program,
            launcher_args: launcher_args.to_vec(),
            subcommand: config.build_subcommand.clone(),
            env: config.env.clone(),
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument vector for building `entrypoint` into `output`
    pub fn build_args(&self, output: &Path, entrypoint: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.launcher_args.iter().map(OsString::from).collect();
        args.push(OsString::from(&self.subcommand));
        args.push(OsString::from("-o"));
        args.push(output.as_os_str().to_owned());
        args.push(entrypoint.as_os_str().to_owned());
        args
    }
}

/// Run the toolchain's build subcommand
#[instrument(skip(runner, toolchain))]
pub async fn build(
    runner: &ProcessRunner,
    toolchain: &Toolchain,
    workspace_root: &Path,
    entrypoint: &Path,
    output: &Path,
    timeout: Duration,
) -> Result<ProcessResult, ProcessError> {
    let args = toolchain.build_args(output, entrypoint);
    debug!(?args, "invoking toolchain");

    let options = RunOptions::new(timeout)
        .working_dir(workspace_root)
        .envs(toolchain.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    runner.run(toolchain.program(), &args, options).await
}

/// Exit details if the build counts as failed.
///
/// A non-zero exit, a signal or a timeout always fails the build. With
/// `stdout_is_failure`, so does any output on stdout, which the toolchain
/// reserves for diagnostics.
pub fn build_error(result: &ProcessResult, stdout_is_failure: bool) -> Option<ExitInfo> {
    result.exit_error().or_else(|| {
        (stdout_is_failure && !result.stdout.is_empty()).then(|| result.exit_info())
    })
}
