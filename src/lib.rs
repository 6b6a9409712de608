//! # pyground
//!
//! `pyground` is the embeddable core of a browser-style Python playground:
//! everything around the interpreter except the UI. It owns:
//!
//! - **Interpreter lifecycle**: lazy, single-flight initialization with an
//!   observable `Uninitialized / Loading / Ready / Error` state machine, so
//!   any number of callers can race `run_code` safely.
//! - **Execution**: captured stdout/stderr per run, wall-time measurement,
//!   and interactive `input()` routed through a pluggable [`PromptSource`].
//! - **Packages**: on-demand installs plus `Minimal`/`Packaging`/`Scientific`
//!   preload strategies with background warm-up.
//! - **Sessions**: a persisted identity cache that adopts a fresh snapshot
//!   instantly and confirms it with the identity service in the background,
//!   degrading to guest when the service is unreachable.
//! - **Guest quota**: a persisted execution counter that gates anonymous
//!   users after a fixed number of runs; signed-in users are never gated.
//! - **Snippets**: owner-scoped saved programs with an update-vs-fork
//!   decision seam, plus the built-in example programs.
//! - **Interpreter seam**: the engine talks to [`InterpreterRuntime`]; a
//!   scripted fake ships for tests and the `wasm-runtime` feature adds a
//!   wasmtime-backed adapter speaking a small linear-memory ABI.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pyground::{FakeInterpreterRuntime, Playground};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Swap in `WasmInterpreterRuntime` (feature `wasm-runtime`) to run
//!     // a real interpreter bundle.
//!     let runtime = Arc::new(FakeInterpreterRuntime::new());
//!     let playground = Playground::builder(runtime).build().await.unwrap();
//!
//!     let report = playground.run_code("print hello").await.unwrap();
//!     print!("{}", report.stdout);
//!     println!("runs left: {:?}", playground.remaining_executions().unwrap());
//! }
//! ```
//!
//! # Feature Flags
//!
//! | Flag | Description |
//! |------|-------------|
//! | `wasm-runtime` | Bundles the wasmtime-backed interpreter adapter |

pub mod api;
pub mod application;
pub mod core;
pub mod engine;
pub mod error;
pub mod quota;
pub mod session;
pub mod snippets;
pub mod store;

pub use crate::api::{Playground, PlaygroundBuilder};
pub use crate::application::{ExecutionRequest, Orchestrator};
pub use crate::core::{
    FakeIdGenerator, FakeTimeProvider, IdGenerator, RealIdGenerator, RealTimeProvider,
    RuntimeContext, TimeProvider,
};
pub use crate::engine::{
    CapturedOutput, EngineConfig, EngineError, EngineState, ExecutionEngine, ExecutionReport,
    FakeInterpreterRuntime, InterpreterError, InterpreterHandle, InterpreterRuntime, LoadOptions,
    NullPrompt, OutputSink, PreloadStrategy, PromptSource, QueuedPrompt, RunIo, SourceOutcome,
    StreamKind,
};
#[cfg(feature = "wasm-runtime")]
pub use crate::engine::{BundleSource, WasmInterpreterRuntime, WasmRuntimeConfig};
pub use crate::error::PlaygroundError;
pub use crate::quota::{GateDecision, QuotaError, QuotaGate, GUEST_EXECUTION_LIMIT};
pub use crate::session::{
    CachedAuth, FakeIdentityBackend, HttpBackendConfig, HttpIdentityBackend, Identity,
    IdentityBackend, OfflineIdentityBackend, SessionCache, SessionError, SessionProbe,
    AUTH_CACHE_TTL_MILLIS,
};
pub use crate::snippets::{
    example_by_name, example_programs, AlwaysSaveAsNew, AlwaysUpdate, ExampleProgram,
    MemorySnippetStore, SaveDecider, SaveDecision, SavedSnippet, SnippetDraft, SnippetError,
    SnippetStore, SnippetSummary,
};
pub use crate::store::{
    FileStore, KeyValueStore, MemoryStore, StoreError, KEY_AUTH_CAPTURED_AT, KEY_AUTH_IDENTITY,
    KEY_GUEST_EXECUTION_COUNT,
};
