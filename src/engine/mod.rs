//! Python execution engine.
//!
//! Owns the interpreter lifecycle (lazy single-flight initialization with a
//! broadcast state machine), the run path with captured stdout/stderr, and
//! package installation. The interpreter itself sits behind the
//! [`InterpreterRuntime`] seam; a scripted fake ships for tests and the
//! `wasm-runtime` feature adds a wasmtime-backed implementation.

pub mod error;
pub mod executor;
pub mod fake;
pub mod interpreter;
pub mod output;
#[cfg(feature = "wasm-runtime")]
pub mod wasm;

pub use error::EngineError;
pub use executor::{EngineConfig, EngineState, ExecutionEngine, ExecutionReport};
pub use fake::FakeInterpreterRuntime;
pub use interpreter::{
    InterpreterError, InterpreterHandle, InterpreterRuntime, LoadOptions, NullPrompt,
    PreloadStrategy, PromptSource, QueuedPrompt, RunIo, SourceOutcome,
};
pub use output::{CapturedOutput, OutputSink, StreamKind};
#[cfg(feature = "wasm-runtime")]
pub use wasm::{BundleSource, WasmInterpreterRuntime, WasmRuntimeConfig};
