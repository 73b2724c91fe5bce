//! A library for compiling and running untrusted source bundles.
//!
//! Forgebox takes a set of source files and an entrypoint, writes them into a
//! throwaway workspace directory, invokes an external toolchain to build the
//! entrypoint, optionally runs the produced executable with the supplied
//! arguments and stdin, and removes the workspace afterwards no matter how the
//! run ended.
//!
//! # Features
//!
//! - **Path validation** — Submitted filenames are whitelisted and must resolve inside the workspace.
//! - **Isolated workspaces** — One randomly named directory per request, always removed.
//! - **Bounded processes** — Wall-clock timeouts and capped output capture for build and run.
//! - **Typed outcomes** — Compile, execution and validation failures are values, not errors.
//! - **TOML configuration** — Toolchain, limits and stdin handling are configurable.

pub use config::{
    Config, ConfigError, EXAMPLE_CONFIG, ExecutionConfig, LimitsConfig, StdinMode,
    ToolchainConfig,
};
pub use pipeline::{Mode, Pipeline, PipelineError, Toolchain};
pub use process::{ProcessError, ProcessRunner, RunOptions};
pub use types::{
    DEFAULT_ENTRYPOINT, ExitInfo, PipelineOutcome, ProcessResult, Response, ResponseError,
    SubmissionRequest,
};
pub use workspace::{Workspace, WorkspaceError};

pub mod config;
pub mod pipeline;
pub mod process;
pub mod types;
pub mod workspace;
