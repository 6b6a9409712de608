use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::error::EngineError;
use super::interpreter::{
    InterpreterError, InterpreterHandle, InterpreterRuntime, LoadOptions, NullPrompt,
    PreloadStrategy, PromptSource, RunIo, SourceOutcome,
};
use super::output::OutputSink;

/// Interpreter lifecycle, broadcast to status listeners.
///
/// `Error` is terminal for the attempt that produced it, not for the engine:
/// a later `initialize()` starts a fresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Uninitialized,
    Loading,
    Ready,
    Error,
}

/// Constructor-time engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub preload: PreloadStrategy,
    /// Optional package index override passed to the runtime.
    pub index_url: Option<String>,
}

/// Result of one completed run.
///
/// A user-code fault is a *completed* run: `error` holds the fault text, the
/// streams hold whatever was written before it, and the engine stays `Ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub error: Option<String>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

type SharedInit = Shared<BoxFuture<'static, Result<(), EngineError>>>;

#[derive(Default)]
struct InitSlot {
    generation: u64,
    flight: Option<SharedInit>,
}

/// Owns the embedded interpreter's lifecycle and the run path.
///
/// `initialize()` is concurrency-safe: callers arriving while an attempt is
/// in flight attach to that same attempt and observe its outcome, so exactly
/// one underlying load happens no matter how many callers race. Runs must be
/// serialized by the caller (the orchestrator holds the run slot); the sink
/// drain discipline assumes no two runs overlap.
#[derive(Clone)]
pub struct ExecutionEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    runtime: Arc<dyn InterpreterRuntime>,
    config: EngineConfig,
    sink: Arc<OutputSink>,
    prompt: Arc<dyn PromptSource>,
    handle: RwLock<Option<Arc<dyn InterpreterHandle>>>,
    init: Mutex<InitSlot>,
    state_tx: watch::Sender<EngineState>,
    state_rx: watch::Receiver<EngineState>,
}

impl ExecutionEngine {
    pub fn new(runtime: Arc<dyn InterpreterRuntime>) -> Self {
        Self::with_config(runtime, EngineConfig::default(), Arc::new(NullPrompt))
    }

    pub fn with_config(
        runtime: Arc<dyn InterpreterRuntime>,
        config: EngineConfig,
        prompt: Arc<dyn PromptSource>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Uninitialized);
        Self {
            inner: Arc::new(EngineInner {
                runtime,
                config,
                sink: Arc::new(OutputSink::new()),
                prompt,
                handle: RwLock::new(None),
                init: Mutex::new(InitSlot::default()),
                state_tx,
                state_rx,
            }),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.inner.state_rx.borrow()
    }

    /// Watch receiver for state transitions (UI status line). Listening is
    /// optional; nothing in the run path depends on it.
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.inner.state_rx.clone()
    }

    /// Bring the interpreter online. Idempotent; concurrent callers share one
    /// attempt. After a failure the next call starts a fresh attempt.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        let (generation, flight) = {
            let mut slot = self.inner.init.lock();
            if self.inner.handle.read().is_some() {
                return Ok(());
            }
            match &slot.flight {
                Some(flight) => (slot.generation, flight.clone()),
                None => {
                    slot.generation += 1;
                    let flight: SharedInit = drive_init(self.inner.clone()).boxed().shared();
                    slot.flight = Some(flight.clone());
                    (slot.generation, flight)
                }
            }
        };

        let result = flight.await;

        // The attempt concluded; release the slot so the handle field is the
        // record of success and a failed attempt can be retried. Guarded by
        // generation so a finisher never clears a newer attempt.
        let mut slot = self.inner.init.lock();
        if slot.generation == generation {
            slot.flight = None;
        }
        result
    }

    /// Execute user code, capturing stdout/stderr and neutralizing
    /// interactive reads through the injected prompt surface.
    pub async fn run(&self, code: &str) -> Result<ExecutionReport, EngineError> {
        if let Err(err) = self.initialize().await {
            return Err(EngineError::Unavailable(err.to_string()));
        }
        let handle = self
            .inner
            .handle
            .read()
            .clone()
            .ok_or_else(|| EngineError::Unavailable("interpreter handle missing".to_string()))?;

        // Discard anything a previous run left behind.
        let _ = self.inner.sink.drain();

        let io = RunIo::new(self.inner.sink.clone(), self.inner.prompt.clone());
        let started = Instant::now();
        let outcome = match handle.run_source(code, &io).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // A fault of the interpreter mid-run is reported like a
                // user-code fault; the engine itself stays Ready.
                warn!(error = %err, "interpreter fault during run");
                io.write_stderr(&format!("{}\n", err));
                SourceOutcome::faulted(err.to_string())
            }
        };
        let duration = started.elapsed();
        let captured = self.inner.sink.drain();

        Ok(ExecutionReport {
            stdout: captured.stdout,
            stderr: captured.stderr,
            duration,
            error: outcome.error,
        })
    }

    /// Install a package into the running interpreter.
    pub async fn install_package(&self, package: &str) -> Result<(), EngineError> {
        if let Err(err) = self.initialize().await {
            return Err(EngineError::Unavailable(err.to_string()));
        }
        let handle = self
            .inner
            .handle
            .read()
            .clone()
            .ok_or_else(|| EngineError::Unavailable("interpreter handle missing".to_string()))?;
        handle
            .install_package(package)
            .await
            .map_err(|err| EngineError::PackageInstall {
                package: package.to_string(),
                message: err.to_string(),
            })
    }
}

async fn drive_init(inner: Arc<EngineInner>) -> Result<(), EngineError> {
    let _ = inner.state_tx.send(EngineState::Loading);
    info!(preload = ?inner.config.preload, "loading interpreter runtime");

    let options = LoadOptions {
        preload: inner.config.preload,
        index_url: inner.config.index_url.clone(),
    };
    let handle = match inner.runtime.load(&options).await {
        Ok(handle) => handle,
        Err(err) => {
            warn!(error = %err, "interpreter load failed");
            let _ = inner.state_tx.send(EngineState::Error);
            return Err(map_load_error(err));
        }
    };

    for package in inner.config.preload.eager_packages().iter().copied() {
        if let Err(err) = handle.install_package(package).await {
            warn!(package, error = %err, "preload install failed");
            let _ = inner.state_tx.send(EngineState::Error);
            return Err(EngineError::InitializationFailed(format!(
                "install {}: {}",
                package, err
            )));
        }
    }

    *inner.handle.write() = Some(handle.clone());
    let _ = inner.state_tx.send(EngineState::Ready);
    info!("interpreter ready");

    let background = inner.config.preload.background_packages();
    if !background.is_empty() {
        tokio::spawn(async move {
            for package in background.iter().copied() {
                if let Err(err) = handle.install_package(package).await {
                    debug!(package, error = %err, "background install failed");
                }
            }
        });
    }
    Ok(())
}

fn map_load_error(err: InterpreterError) -> EngineError {
    match err {
        InterpreterError::BundleUnavailable(msg) => EngineError::ScriptLoadFailed(msg),
        other => EngineError::InitializationFailed(other.to_string()),
    }
}
