//! Scripted interpreter for tests and demos.
//!
//! The fake executes a tiny line language instead of Python, enough to drive
//! every engine path deterministically:
//!
//! - `print <text>`  write text + newline to stdout
//! - `warn <text>`   write text + newline to stderr
//! - `ask <msg>`     resolve one prompt and write the reply to stdout
//! - `fail <msg>`    raise a user-code fault (stops the run)
//! - `sleep <ms>`    suspend, for overlap tests
//!
//! Unknown lines are ignored. Load failures and delays are injectable.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::interpreter::{
    InterpreterError, InterpreterHandle, InterpreterRuntime, LoadOptions, RunIo, SourceOutcome,
};

#[derive(Default)]
struct FakeState {
    load_calls: AtomicU32,
    run_calls: AtomicU32,
    installed: Mutex<Vec<String>>,
}

pub struct FakeInterpreterRuntime {
    state: Arc<FakeState>,
    load_delay: Option<Duration>,
    run_delay: Option<Duration>,
    failing_loads: AtomicU32,
    failing_installs: Mutex<Vec<String>>,
}

impl Default for FakeInterpreterRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeInterpreterRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(FakeState::default()),
            load_delay: None,
            run_delay: None,
            failing_loads: AtomicU32::new(0),
            failing_installs: Mutex::new(Vec::new()),
        }
    }

    /// Suspend `load` for `delay`, so concurrent initializers overlap.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Suspend each `run_source` for `delay`.
    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    /// Fail the next `attempts` load calls with `BundleUnavailable`.
    pub fn failing_loads(self, attempts: u32) -> Self {
        self.failing_loads.store(attempts, Ordering::SeqCst);
        self
    }

    /// Make installs of `package` fail.
    pub fn failing_install(self, package: impl Into<String>) -> Self {
        self.failing_installs.lock().push(package.into());
        self
    }

    pub fn load_count(&self) -> u32 {
        self.state.load_calls.load(Ordering::SeqCst)
    }

    pub fn run_count(&self) -> u32 {
        self.state.run_calls.load(Ordering::SeqCst)
    }

    pub fn installed_packages(&self) -> Vec<String> {
        self.state.installed.lock().clone()
    }
}

#[async_trait]
impl InterpreterRuntime for FakeInterpreterRuntime {
    async fn load(
        &self,
        _options: &LoadOptions,
    ) -> Result<Arc<dyn InterpreterHandle>, InterpreterError> {
        self.state.load_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        let remaining = self.failing_loads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_loads.store(remaining - 1, Ordering::SeqCst);
            return Err(InterpreterError::BundleUnavailable(
                "bundle fetch failed".to_string(),
            ));
        }
        Ok(Arc::new(FakeInterpreterHandle {
            state: self.state.clone(),
            run_delay: self.run_delay,
            failing_installs: self.failing_installs.lock().clone(),
        }))
    }
}

pub struct FakeInterpreterHandle {
    state: Arc<FakeState>,
    run_delay: Option<Duration>,
    failing_installs: Vec<String>,
}

#[async_trait]
impl InterpreterHandle for FakeInterpreterHandle {
    async fn run_source(&self, source: &str, io: &RunIo) -> Result<SourceOutcome, InterpreterError> {
        self.state.run_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.run_delay {
            tokio::time::sleep(delay).await;
        }
        for line in source.lines() {
            let line = line.trim();
            let (directive, rest) = match line.split_once(' ') {
                Some((d, r)) => (d, r),
                None => (line, ""),
            };
            match directive {
                "print" => io.write_stdout(&format!("{}\n", rest)),
                "warn" => io.write_stderr(&format!("{}\n", rest)),
                "ask" => {
                    let reply = io.prompt_line(rest).unwrap_or_default();
                    io.write_stdout(&format!("{}\n", reply));
                }
                "fail" => {
                    io.write_stderr(&format!("{}\n", rest));
                    return Ok(SourceOutcome::faulted(rest));
                }
                "sleep" => {
                    let millis: u64 = rest.parse().unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                }
                _ => {}
            }
        }
        Ok(SourceOutcome::completed())
    }

    async fn install_package(&self, package: &str) -> Result<(), InterpreterError> {
        if self.failing_installs.iter().any(|p| p == package) {
            return Err(InterpreterError::Runtime(format!(
                "no matching distribution for {}",
                package
            )));
        }
        self.state.installed.lock().push(package.to_string());
        Ok(())
    }
}
