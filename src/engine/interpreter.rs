//! The embedded-interpreter collaborator seam.
//!
//! The engine only knows how to `load` a runtime into a handle and feed that
//! handle source text; Python semantics live entirely behind these traits.
//! [`FakeInterpreterRuntime`](super::FakeInterpreterRuntime) is the scripted
//! implementation; `wasm-runtime` adds a wasmtime-backed one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::output::{OutputSink, StreamKind};

#[derive(Debug, Clone, Error)]
pub enum InterpreterError {
    #[error("Interpreter bundle unavailable: {0}")]
    BundleUnavailable(String),
    #[error("Interpreter setup failed: {0}")]
    Setup(String),
    #[error("Interpreter runtime fault: {0}")]
    Runtime(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Which packages the engine installs around initialization.
///
/// The source project shipped two near-duplicate engines for this; here it is
/// one engine with a constructor-time choice. `Packaging` installs the
/// package tooling eagerly (a failure fails initialization); `Scientific`
/// additionally pulls the heavy stack in the background after the engine is
/// ready, with failures logged rather than fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreloadStrategy {
    /// No package installation at startup.
    Minimal,
    /// Install package tooling during initialization.
    #[default]
    Packaging,
    /// Package tooling eagerly, scientific stack in the background.
    Scientific,
}

impl PreloadStrategy {
    /// Installed during initialization; a failure fails the attempt.
    pub fn eager_packages(&self) -> &'static [&'static str] {
        match self {
            PreloadStrategy::Minimal => &[],
            PreloadStrategy::Packaging | PreloadStrategy::Scientific => &["micropip"],
        }
    }

    /// Installed after `Ready` in a background task; failures are logged.
    pub fn background_packages(&self) -> &'static [&'static str] {
        match self {
            PreloadStrategy::Scientific => &["numpy", "pandas", "matplotlib"],
            _ => &[],
        }
    }
}

/// Options passed to [`InterpreterRuntime::load`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadOptions {
    pub preload: PreloadStrategy,
    /// Optional package index override for installs.
    pub index_url: Option<String>,
}

/// Outcome of running one piece of source text.
///
/// `error` carries the user-code fault text (a traceback summary); it is data,
/// not a failure of the interpreter itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub error: Option<String>,
}

impl SourceOutcome {
    pub fn completed() -> Self {
        Self { error: None }
    }

    pub fn faulted(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }
}

/// Synchronous user-prompt surface backing the interpreter's read-a-line.
///
/// There is no blocking stdin here: when user code asks for input, the
/// runtime routes the request to this function and treats `None` as an empty
/// line, the way the source playground routed `input()` to a browser prompt.
pub trait PromptSource: Send + Sync {
    fn prompt_line(&self, message: &str) -> Option<String>;
}

/// Prompt surface that always declines. Interactive reads resolve to "".
#[derive(Debug, Default)]
pub struct NullPrompt;

impl PromptSource for NullPrompt {
    fn prompt_line(&self, _message: &str) -> Option<String> {
        None
    }
}

/// Prompt surface fed from a fixed reply queue; exhausted replies decline.
#[derive(Debug, Default)]
pub struct QueuedPrompt {
    replies: parking_lot::Mutex<std::collections::VecDeque<String>>,
}

impl QueuedPrompt {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: parking_lot::Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }
}

impl PromptSource for QueuedPrompt {
    fn prompt_line(&self, _message: &str) -> Option<String> {
        self.replies.lock().pop_front()
    }
}

/// Output and prompt wiring handed to a handle for the duration of one run.
#[derive(Clone)]
pub struct RunIo {
    sink: Arc<OutputSink>,
    prompt: Arc<dyn PromptSource>,
}

impl RunIo {
    pub fn new(sink: Arc<OutputSink>, prompt: Arc<dyn PromptSource>) -> Self {
        Self { sink, prompt }
    }

    pub fn write_stdout(&self, text: &str) {
        self.sink.write(StreamKind::Stdout, text);
    }

    pub fn write_stderr(&self, text: &str) {
        self.sink.write(StreamKind::Stderr, text);
    }

    /// Resolve one interactive read-a-line request. `None` means the user
    /// declined; runtimes substitute an empty line.
    pub fn prompt_line(&self, message: &str) -> Option<String> {
        self.prompt.prompt_line(message)
    }
}

/// A loaded interpreter instance.
#[async_trait]
pub trait InterpreterHandle: Send + Sync {
    /// Execute source text, streaming output through `io`. User-code faults
    /// come back in the [`SourceOutcome`]; `Err` is reserved for faults of
    /// the interpreter itself.
    async fn run_source(&self, source: &str, io: &RunIo) -> Result<SourceOutcome, InterpreterError>;

    /// Install a package into the interpreter environment.
    async fn install_package(&self, package: &str) -> Result<(), InterpreterError>;
}

/// Factory for interpreter handles; `load` is the expensive bundle
/// download/compile step the engine runs exactly once.
#[async_trait]
pub trait InterpreterRuntime: Send + Sync {
    async fn load(&self, options: &LoadOptions)
        -> Result<Arc<dyn InterpreterHandle>, InterpreterError>;
}
