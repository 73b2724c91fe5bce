use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

/// Entrypoint used when a request does not name one
pub const DEFAULT_ENTRYPOINT: &str = "main.sn";

/// Maximum length of a submitted filename or entrypoint, in characters
pub const MAX_NAME_LEN: usize = 256;

/// A bundle of source files to build (and optionally run)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmissionRequest {
    /// Relative filename → file contents
    #[serde(default)]
    pub files: BTreeMap<String, String>,

    /// File the toolchain starts compiling from; must be a key of `files`
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,

    /// Arguments passed to the built executable
    #[serde(default)]
    pub args: Vec<String>,

    /// Payload fed to the built executable's standard input
    #[serde(default)]
    pub stdin: Option<String>,
}

impl SubmissionRequest {
    /// Create a request from a file map and an entrypoint
    pub fn new(files: BTreeMap<String, String>, entrypoint: impl Into<String>) -> Self {
        Self {
            files,
            entrypoint: entrypoint.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// Add a single file
    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }

    /// Set the runtime arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the stdin payload
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// The stdin payload, with an empty string counting as absent
    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref().filter(|s| !s.is_empty())
    }
}

impl Default for SubmissionRequest {
    fn default() -> Self {
        Self::new(BTreeMap::new(), DEFAULT_ENTRYPOINT)
    }
}

fn default_entrypoint() -> String {
    DEFAULT_ENTRYPOINT.to_string()
}

/// Captured result of one child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// Standard output, lossily decoded as UTF-8
    pub stdout: String,

    /// Standard error, lossily decoded as UTF-8
    pub stderr: String,

    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,

    /// Signal number if the process was killed by a signal
    pub signal: Option<i32>,

    /// Whether the process was killed because it ran past its timeout
    pub killed: bool,
}

impl ProcessResult {
    /// Check if the process exited with code 0 within its timeout
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.killed && self.exit_code == Some(0)
    }

    /// Process details if the run counts as an error
    pub fn exit_error(&self) -> Option<ExitInfo> {
        if self.is_success() {
            None
        } else {
            Some(self.exit_info())
        }
    }

    /// Process details regardless of outcome
    pub fn exit_info(&self) -> ExitInfo {
        ExitInfo {
            killed: self.killed,
            code: self.exit_code,
            signal: self.signal,
        }
    }
}

/// Exit details reported for compilation and execution failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExitInfo {
    pub killed: bool,
    pub code: Option<i32>,
    #[serde(serialize_with = "serialize_signal")]
    pub signal: Option<i32>,
}

fn serialize_signal<S>(signal: &Option<i32>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match signal {
        Some(signo) => serializer.serialize_str(&signal_name(*signo)),
        None => serializer.serialize_none(),
    }
}

/// Conventional name for a POSIX signal number
pub fn signal_name(signo: i32) -> String {
    let name = match signo {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        5 => "SIGTRAP",
        6 => "SIGABRT",
        7 => "SIGBUS",
        8 => "SIGFPE",
        9 => "SIGKILL",
        10 => "SIGUSR1",
        11 => "SIGSEGV",
        12 => "SIGUSR2",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        24 => "SIGXCPU",
        25 => "SIGXFSZ",
        _ => return format!("SIG{signo}"),
    };
    name.to_string()
}

/// The single result of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Build (and run, if requested) succeeded
    Success { stdout: String, stderr: String },

    /// The toolchain rejected the submission
    CompilationFailure {
        exit: ExitInfo,
        stdout: String,
        stderr: String,
    },

    /// The built executable failed, timed out or was signalled
    ExecutionFailure {
        exit: ExitInfo,
        stdout: String,
        stderr: String,
    },

    /// The request itself was unacceptable
    ValidationFailure { message: String },
}

impl PipelineOutcome {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::CompilationFailure { .. } => "compilation_failure",
            Self::ExecutionFailure { .. } => "execution_failure",
            Self::ValidationFailure { .. } => "validation_failure",
        }
    }
}

/// JSON body handed back to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseError {
    Exit(ExitInfo),
    Message(String),
}

impl Response {
    /// Generic failure for internal errors; details stay in the logs
    pub fn internal_error() -> Self {
        Self {
            success: false,
            error: Some(ResponseError::Message(
                "An internal error occurred while processing the submission.".to_string(),
            )),
            stdout: None,
            stderr: None,
        }
    }
}

impl From<PipelineOutcome> for Response {
    fn from(outcome: PipelineOutcome) -> Self {
        match outcome {
            PipelineOutcome::Success { stdout, stderr } => Self {
                success: true,
                error: None,
                stdout: Some(stdout),
                stderr: Some(stderr),
            },
            PipelineOutcome::CompilationFailure {
                exit,
                stdout,
                stderr,
            }
            | PipelineOutcome::ExecutionFailure {
                exit,
                stdout,
                stderr,
            } => Self {
                success: false,
                error: Some(ResponseError::Exit(exit)),
                stdout: Some(stdout),
                stderr: Some(stderr),
            },
            PipelineOutcome::ValidationFailure { message } => Self {
                success: false,
                error: Some(ResponseError::Message(message)),
                stdout: None,
                stderr: None,
            },
        }
    }
}
