use forgebox::{PipelineOutcome, Response};

use super::{TestPipeline, program, request};

fn expect_validation(outcome: PipelineOutcome) -> String {
    match outcome {
        PipelineOutcome::ValidationFailure { message } => message,
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_entrypoint() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .run(&request(&[("lib.sn", "x")], "main.sn"))
        .await
        .expect("pipeline failed");

    assert_eq!(
        expect_validation(outcome),
        "Entrypoint main.sn not found in files."
    );
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test]
async fn test_empty_submission() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .build(&request(&[], "main.sn"))
        .await
        .expect("pipeline failed");

    expect_validation(outcome);
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test]
async fn test_rejected_filenames_write_nothing() {
    let test = TestPipeline::new();
    let bad_names = [
        "../evil.sn",
        "a/../../evil.sn",
        "/etc/passwd",
        "bad$name.sn",
        "semi;colon.sn",
        "",
        ".",
        "dir/..",
    ];

    for bad in bad_names {
        let outcome = test
            .pipeline
            .run(&request(&[("main.sn", "#!/bin/sh\n"), (bad, "x")], "main.sn"))
            .await
            .expect("pipeline failed");

        let message = expect_validation(outcome);
        assert_eq!(message, format!("Filename '{bad}' is not a valid path."));
        assert_eq!(test.leftovers(), 0, "directory created for {bad:?}");
    }
}

#[tokio::test]
async fn test_bad_entrypoint_name() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .run(&request(&[("../main.sn", "#!/bin/sh\n")], "../main.sn"))
        .await
        .expect("pipeline failed");

    expect_validation(outcome);
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test]
async fn test_overlong_filename() {
    let test = TestPipeline::new();
    let long = format!("{}.sn", "a".repeat(300));
    let outcome = test
        .pipeline
        .run(&request(&[(&long, "#!/bin/sh\n")], &long))
        .await
        .expect("pipeline failed");

    expect_validation(outcome);
}

#[tokio::test]
async fn test_staging_failure_is_reported_and_cleaned() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .run(&request(
            &[("a.sn", "#!/bin/sh\n"), ("a.sn/b.sn", "x")],
            "a.sn",
        ))
        .await
        .expect("pipeline failed");

    assert_eq!(
        expect_validation(outcome),
        "Failed to write the submitted files."
    );
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test]
async fn test_validation_response_json() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .run(&request(&[("lib.sn", "x")], "main.sn"))
        .await
        .expect("pipeline failed");

    let json = serde_json::to_value(Response::from(outcome)).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "success": false,
            "error": "Entrypoint main.sn not found in files."
        })
    );
}

#[tokio::test]
async fn test_argument_with_nul() {
    let test = TestPipeline::new();
    let outcome = test
        .pipeline
        .run(&program("echo hi").with_args(["a\0b"]))
        .await
        .expect("pipeline failed");

    assert_eq!(
        expect_validation(outcome),
        "Argument 0 contains a NUL byte."
    );
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test]
async fn test_shell_stdin_with_nul() {
    let test = TestPipeline::shell_stdin();
    let outcome = test
        .pipeline
        .run(&program("cat").with_stdin("a\0b"))
        .await
        .expect("pipeline failed");

    assert_eq!(expect_validation(outcome), "Stdin contains a NUL byte.");
    assert_eq!(test.leftovers(), 0);
}
