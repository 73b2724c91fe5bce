use std::time::Duration;

use forgebox::{PipelineError, ProcessError};

use super::{TestPipeline, program};

#[tokio::test]
async fn test_every_outcome_leaves_nothing_behind() {
    let test = TestPipeline::with_config(|config| config.limits.run_timeout_ms = 300);
    let programs = [
        "echo ok",
        "# forgebox:compile-error",
        "# forgebox:compile-stdout",
        "exit 1",
        "exec sleep 30",
        "mkdir -p out/deeper && echo x > out/deeper/file && echo y > stray",
    ];

    for body in programs {
        test.pipeline
            .run(&program(body))
            .await
            .expect("pipeline failed");
        assert_eq!(test.leftovers(), 0, "leftovers after {body:?}");
    }
}

#[tokio::test]
async fn test_launch_failure_is_internal_and_cleaned() {
    let test = TestPipeline::with_config(|config| {
        config.toolchain.command = vec!["/nonexistent/san/bin/san".to_string()];
    });

    let err = test
        .pipeline
        .run(&program("echo hi"))
        .await
        .expect_err("expected internal failure");

    assert!(matches!(
        err,
        PipelineError::Process(ProcessError::Spawn { .. })
    ));
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test]
async fn test_cancelled_request_is_cleaned() {
    let test = TestPipeline::new();
    let request = program("exec sleep 30");

    let cancelled =
        tokio::time::timeout(Duration::from_millis(500), test.pipeline.run(&request)).await;

    assert!(cancelled.is_err(), "request should still be running");
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test]
async fn test_cancelled_request_kills_background_jobs() {
    let test = TestPipeline::new();
    let outside = tempfile::tempdir().expect("failed to create marker dir");
    let marker = outside.path().join("alive");
    let request = program(&format!(
        "(sleep 1; echo alive > '{}') &\nwait",
        marker.display()
    ));

    let cancelled =
        tokio::time::timeout(Duration::from_millis(500), test.pipeline.run(&request)).await;
    assert!(cancelled.is_err(), "request should still be running");

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!marker.exists(), "background job outlived the cancelled request");
    assert_eq!(test.leftovers(), 0);
}
