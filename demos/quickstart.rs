use std::sync::Arc;

use pyground::{
    FakeIdentityBackend, FakeInterpreterRuntime, Playground, PlaygroundError, SnippetDraft,
};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("🐍 pyground starting (scripted fake interpreter)...");

    let backend = Arc::new(FakeIdentityBackend::new().with_account("ada", "pw"));
    let playground = Playground::builder(Arc::new(FakeInterpreterRuntime::new()))
        .identity_backend(backend)
        .guest_limit(3)
        .build()
        .await
        .expect("Failed to build playground");

    println!("📋 Running as guest (3 executions allowed)...");
    for program in ["print hello", "ask what is your name?", "fail oops"] {
        match playground.run_code(program).await {
            Ok(report) => {
                print!("{}", report.stdout);
                eprint!("{}", report.stderr);
                println!(
                    "✅ ran {:?} in {:?} (faulted: {})",
                    program,
                    report.duration,
                    report.error.is_some()
                );
            }
            Err(err) => println!("❌ {}", err),
        }
        println!(
            "   runs left: {:?}",
            playground.remaining_executions().expect("quota readable")
        );
    }

    // The allowance is spent; the next run is gated.
    match playground.run_code("print blocked").await {
        Err(PlaygroundError::Quota(err)) => println!("🚦 gated as expected: {}", err),
        other => println!("unexpected: {:?}", other.map(|r| r.stdout)),
    }

    println!("\n🔑 Signing in to lift the gate...");
    let identity = playground
        .login("ada", "pw")
        .await
        .expect("Failed to sign in");
    println!("✅ signed in as {} (id {})", identity.display_name, identity.id);

    let report = playground
        .run_code("print welcome back")
        .await
        .expect("Failed to run");
    print!("{}", report.stdout);

    let saved = playground
        .save_snippet(SnippetDraft {
            title: "greeting".to_string(),
            code: "print welcome back".to_string(),
            existing_id: None,
        })
        .await
        .expect("Failed to save snippet");
    println!("💾 saved snippet #{} ({})", saved.id, saved.title);

    println!("\n📚 Built-in example programs:");
    for example in playground.examples() {
        println!("   {}: {}", example.name, example.title);
    }
}
