//! Execution step
//!
//! Runs the freshly built executable with the request's arguments and stdin.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::process::{ProcessError, ProcessRunner, RunOptions};
use crate::types::{ProcessResult, SubmissionRequest};

/// Execute the built program
#[instrument(skip(runner, request), fields(args = request.args.len(), stdin = request.stdin().is_some()))]
pub async fn execute(
    runner: &ProcessRunner,
    executable: &Path,
    request: &SubmissionRequest,
    workspace_root: &Path,
    timeout: Duration,
) -> Result<ProcessResult, ProcessError> {
    debug!(stdin_mode = ?runner.stdin_mode(), "executing program");

    let options = RunOptions::new(timeout)
        .stdin(request.stdin())
        .working_dir(workspace_root);

    runner.run(executable, &request.args, options).await
}
