use std::time::{Duration, Instant};

use forgebox::PipelineOutcome;

use super::{TestPipeline, program, request};

#[tokio::test]
async fn test_build_only_success_passes_stderr_through() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .build(&program("# forgebox:compile-note\necho never printed"))
        .await
        .expect("pipeline failed");

    match outcome {
        PipelineOutcome::Success { stdout, stderr } => {
            assert_eq!(stdout, "");
            assert!(stderr.starts_with("note: built "), "stderr: {stderr}");
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test]
async fn test_build_only_does_not_run_the_program() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .build(&program("echo ran; exit 3"))
        .await
        .expect("pipeline failed");

    assert_eq!(
        outcome,
        PipelineOutcome::Success {
            stdout: String::new(),
            stderr: String::new(),
        }
    );
}

#[tokio::test]
async fn test_compile_error() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .build(&program("# forgebox:compile-error"))
        .await
        .expect("pipeline failed");

    match outcome {
        PipelineOutcome::CompilationFailure {
            exit,
            stdout,
            stderr,
        } => {
            assert_eq!(exit.code, Some(1));
            assert!(!exit.killed);
            assert_eq!(exit.signal, None);
            assert_eq!(stdout, "");
            assert!(stderr.contains("forced compile error"));
        }
        other => panic!("expected compilation failure, got {other:?}"),
    }
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test]
async fn test_compile_error_stops_run_mode() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .run(&program("# forgebox:compile-error\necho should not run"))
        .await
        .expect("pipeline failed");

    assert!(matches!(outcome, PipelineOutcome::CompilationFailure { .. }));
}

#[tokio::test]
async fn test_build_stdout_counts_as_failure() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .run(&program("# forgebox:compile-stdout\necho hi"))
        .await
        .expect("pipeline failed");

    match outcome {
        PipelineOutcome::CompilationFailure { exit, stdout, .. } => {
            assert_eq!(exit.code, Some(0));
            assert!(!exit.killed);
            assert!(stdout.contains("reported on stdout"));
        }
        other => panic!("expected compilation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_build_stdout_allowed_when_lenient() {
    let test = TestPipeline::with_config(|config| {
        config.execution.build_stdout_is_failure = false;
    });
    let outcome = test
        .pipeline
        .build(&program("# forgebox:compile-stdout"))
        .await
        .expect("pipeline failed");

    match outcome {
        PipelineOutcome::Success { stdout, .. } => {
            assert!(stdout.contains("reported on stdout"));
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_build_timeout() {
    let test = TestPipeline::with_config(|config| config.limits.build_timeout_ms = 300);
    let started = Instant::now();
    let outcome = test
        .pipeline
        .build(&program("# forgebox:compile-hang"))
        .await
        .expect("pipeline failed");

    match outcome {
        PipelineOutcome::CompilationFailure { exit, .. } => assert!(exit.killed),
        other => panic!("expected compilation failure, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test]
async fn test_nested_entrypoint() {
    let test = TestPipeline::new();
    let request = request(
        &[
            ("src/app/main.sn", "#!/bin/sh\necho nested\n"),
            ("src/util.sn", "unused\n"),
        ],
        "src/app/main.sn",
    );

    let outcome = test.pipeline.run(&request).await.expect("pipeline failed");
    assert_eq!(
        outcome,
        PipelineOutcome::Success {
            stdout: "nested\n".into(),
            stderr: String::new(),
        }
    );
}

#[tokio::test]
async fn test_missing_executable_in_run_mode() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .run(&program("# forgebox:compile-nothing"))
        .await
        .expect("pipeline failed");

    assert!(matches!(outcome, PipelineOutcome::CompilationFailure { .. }));

    // build mode only looks at the toolchain's own verdict
    let outcome = test
        .pipeline
        .build(&program("# forgebox:compile-nothing"))
        .await
        .expect("pipeline failed");
    assert!(outcome.is_success());
}
