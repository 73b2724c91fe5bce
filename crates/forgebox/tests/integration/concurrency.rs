use std::collections::HashSet;
use std::sync::Arc;

use forgebox::PipelineOutcome;
use tokio::task::JoinSet;

use super::{TestPipeline, program};

fn stdout_of(outcome: PipelineOutcome) -> String {
    match outcome {
        PipelineOutcome::Success { stdout, .. } => stdout,
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_identical_requests_get_separate_workspaces() {
    let test = TestPipeline::new();
    let request = program("pwd; ls");

    let (a, b) = tokio::join!(test.pipeline.run(&request), test.pipeline.run(&request));
    let a = stdout_of(a.expect("pipeline failed"));
    let b = stdout_of(b.expect("pipeline failed"));

    assert_ne!(a, b);
    assert_eq!(test.leftovers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_requests_do_not_interfere() {
    let test = TestPipeline::new();
    let pipeline = Arc::new(test.pipeline.clone());

    let mut tasks = JoinSet::new();
    for i in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        tasks.spawn(async move {
            let request = program("echo \"$1 $(pwd)\"; sleep 0.1").with_args([i.to_string()]);
            pipeline.run(&request).await
        });
    }

    let mut seen_dirs = HashSet::new();
    let mut seen_ids = HashSet::new();
    while let Some(joined) = tasks.join_next().await {
        let stdout = stdout_of(joined.expect("task panicked").expect("pipeline failed"));
        let (id, dir) = stdout.trim_end().split_once(' ').expect("unexpected output");
        assert!(seen_ids.insert(id.to_string()));
        assert!(seen_dirs.insert(dir.to_string()), "workspace {dir} reused");
    }

    assert_eq!(seen_ids.len(), 8);
    assert_eq!(test.leftovers(), 0);
}
