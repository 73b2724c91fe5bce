use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../forgebox.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for Forgebox
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Directory holding one subdirectory per request.
    ///
    /// Relative paths are resolved against the working directory of the
    /// process when the pipeline is created.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// External toolchain invocation
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Per-process limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// How the built executable is launched and judged
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Configuration for the external compiler
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolchainConfig {
    /// Launcher argument vector; `build -o <output> <entrypoint>` is appended
    #[serde(default = "default_toolchain_command")]
    pub command: Vec<String>,

    /// Name of the build subcommand
    #[serde(default = "default_build_subcommand")]
    pub build_subcommand: String,

    /// Extra environment variables for the build step
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            command: default_toolchain_command(),
            build_subcommand: default_build_subcommand(),
            env: HashMap::new(),
        }
    }
}

/// Wall-clock and output limits, applied to each process separately
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LimitsConfig {
    /// Build step timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub build_timeout_ms: u64,

    /// Execution step timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub run_timeout_ms: u64,

    /// Maximum captured bytes per output stream
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,
}

impl LimitsConfig {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            build_timeout_ms: default_timeout_ms(),
            run_timeout_ms: default_timeout_ms(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

/// How stdin reaches the built executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdinMode {
    /// Write the payload to the child's stdin pipe
    #[default]
    Pipe,

    /// Pipe the payload through a shell command line built with quoted arguments
    Shell,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub stdin_mode: StdinMode,

    /// Shell used when `stdin_mode = "shell"`
    #[serde(default = "default_shell")]
    pub shell: PathBuf,

    /// Treat any stdout from the build step as a compilation failure.
    ///
    /// When disabled only the exit status decides.
    #[serde(default = "default_true")]
    pub build_stdout_is_failure: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            stdin_mode: StdinMode::default(),
            shell: default_shell(),
            build_stdout_is_failure: true,
        }
    }
}

impl Config {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the workspace root
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Set the toolchain launcher
    pub fn with_toolchain<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.toolchain.command = command.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            toolchain: ToolchainConfig::default(),
            limits: LimitsConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_toolchain_command() -> Vec<String> {
    vec!["san/bin/san".to_string()]
}

fn default_build_subcommand() -> String {
    "build".to_string()
}

fn default_timeout_ms() -> u64 {
    25_000
}

fn default_max_output_bytes() -> u64 {
    1024 * 1024
}

fn default_shell() -> PathBuf {
    PathBuf::from("/bin/sh")
}

fn default_true() -> bool {
    true
}
