//! Engine lifecycle under concurrency: shared initialization, retry after
//! failure, output isolation, prompt routing, background preloads.

use std::sync::Arc;
use std::time::Duration;

use pyground::{
    EngineConfig, EngineError, EngineState, ExecutionEngine, FakeInterpreterRuntime, NullPrompt,
    PreloadStrategy, QueuedPrompt,
};

#[tokio::test]
async fn test_concurrent_initializers_share_one_load() {
    let runtime = Arc::new(FakeInterpreterRuntime::new().with_load_delay(Duration::from_millis(50)));
    let engine = ExecutionEngine::new(runtime.clone());

    let (a, b, c) = tokio::join!(
        engine.initialize(),
        engine.initialize(),
        engine.initialize(),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(runtime.load_count(), 1);
}

#[tokio::test]
async fn test_concurrent_initializers_share_one_failure() {
    let runtime = Arc::new(
        FakeInterpreterRuntime::new()
            .with_load_delay(Duration::from_millis(50))
            .failing_loads(1),
    );
    let engine = ExecutionEngine::new(runtime.clone());

    let (a, b) = tokio::join!(engine.initialize(), engine.initialize());
    assert!(matches!(a, Err(EngineError::ScriptLoadFailed(_))));
    assert!(matches!(b, Err(EngineError::ScriptLoadFailed(_))));
    assert_eq!(runtime.load_count(), 1);
    assert_eq!(engine.state(), EngineState::Error);

    // The failed attempt released its slot; the next call starts over.
    engine.initialize().await.unwrap();
    assert_eq!(runtime.load_count(), 2);
    assert_eq!(engine.state(), EngineState::Ready);
}

#[tokio::test]
async fn test_output_is_isolated_between_runs() {
    let engine = ExecutionEngine::new(Arc::new(FakeInterpreterRuntime::new()));

    let first = engine.run("print one\nwarn oops").await.unwrap();
    assert_eq!(first.stdout, "one\n");
    assert_eq!(first.stderr, "oops\n");

    let second = engine.run("print two").await.unwrap();
    assert_eq!(second.stdout, "two\n");
    assert_eq!(second.stderr, "");
}

#[tokio::test]
async fn test_prompt_replies_reach_the_program() {
    let engine = ExecutionEngine::with_config(
        Arc::new(FakeInterpreterRuntime::new()),
        EngineConfig::default(),
        Arc::new(QueuedPrompt::new(["Ada", "Lovelace"])),
    );

    let report = engine.run("ask first name?\nask last name?").await.unwrap();
    assert_eq!(report.stdout, "Ada\nLovelace\n");
    assert!(report.is_success());
}

#[tokio::test]
async fn test_exhausted_prompt_reads_as_empty() {
    let engine = ExecutionEngine::with_config(
        Arc::new(FakeInterpreterRuntime::new()),
        EngineConfig::default(),
        Arc::new(QueuedPrompt::new(["only"])),
    );

    let report = engine.run("ask a?\nask b?").await.unwrap();
    assert_eq!(report.stdout, "only\n\n");
}

#[tokio::test]
async fn test_scientific_preload_installs_in_background() {
    let runtime = Arc::new(FakeInterpreterRuntime::new());
    let engine = ExecutionEngine::with_config(
        runtime.clone(),
        EngineConfig {
            preload: PreloadStrategy::Scientific,
            index_url: None,
        },
        Arc::new(NullPrompt),
    );

    engine.initialize().await.unwrap();
    // Ready comes first; the heavy stack trickles in afterwards.
    assert_eq!(engine.state(), EngineState::Ready);
    assert!(runtime
        .installed_packages()
        .contains(&"micropip".to_string()));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if runtime.installed_packages().contains(&"numpy".to_string()) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "background preload never arrived"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_run_after_failed_boot_reports_unavailable() {
    let runtime = Arc::new(FakeInterpreterRuntime::new().failing_loads(1));
    let engine = ExecutionEngine::new(runtime);

    let err = engine.run("print hi").await.unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));

    // The engine recovers on the next call without operator intervention.
    let report = engine.run("print hi").await.unwrap();
    assert_eq!(report.stdout, "hi\n");
}
