//! Wasm-backed interpreter runtime using wasmtime.
//!
//! The interpreter bundle is a wasm module implementing a small linear-memory
//! ABI. Exports: `memory`, `alloc(len) -> ptr`, `dealloc(ptr, len)`,
//! `run(src_ptr, src_len) -> header_ptr` and optionally
//! `install(name_ptr, name_len) -> status`. The header is eight bytes of
//! little-endian `(out_ptr, out_len)` naming a JSON payload
//! `{"error": null | "..."}`. Output streams and interactive reads flow
//! through host imports `env.emit(stream, ptr, len)` and
//! `env.prompt(q_ptr, q_len, buf_ptr, buf_cap) -> len`.
//!
//! One store lives for the whole session so interpreter globals and installed
//! packages persist across runs. Runaway code is bounded by fuel metering,
//! not wall-clock timeouts.

use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine as _;
use serde_json::Value;
use wasmtime::{
    Caller, Engine, Linker, Memory, Module, Store, StoreLimits, StoreLimitsBuilder, TypedFunc,
};

use super::interpreter::{
    InterpreterError, InterpreterHandle, InterpreterRuntime, LoadOptions, NullPrompt, RunIo,
    SourceOutcome,
};
use super::output::OutputSink;

const MAX_RESULT_BYTES: usize = 16 * 1024 * 1024;

/// Where the interpreter bundle comes from.
#[derive(Clone, Debug)]
pub enum BundleSource {
    /// Base64-encoded wasm, or WAT as a dev/test convenience.
    Inline(String),
    /// A `.wasm` file on disk.
    File(PathBuf),
}

/// Wasm runtime configuration.
#[derive(Clone, Debug)]
pub struct WasmRuntimeConfig {
    pub bundle: BundleSource,
    /// Max linear memory pages (64KB per page).
    pub max_memory_pages: u32,
    /// Max fuel per run for instruction counting.
    pub max_fuel: u64,
    /// Enable fuel metering.
    pub enable_fuel: bool,
}

impl WasmRuntimeConfig {
    pub fn new(bundle: BundleSource) -> Self {
        Self {
            bundle,
            max_memory_pages: 2048,
            max_fuel: 1_000_000_000,
            enable_fuel: true,
        }
    }
}

struct StoreState {
    limits: StoreLimits,
    io: RunIo,
}

/// Loads the bundle into a fresh wasmtime instance per session.
pub struct WasmInterpreterRuntime {
    config: WasmRuntimeConfig,
}

impl WasmInterpreterRuntime {
    pub fn new(config: WasmRuntimeConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl InterpreterRuntime for WasmInterpreterRuntime {
    async fn load(&self, _options: &LoadOptions) -> Result<Arc<dyn InterpreterHandle>, InterpreterError> {
        let config = self.config.clone();
        let session = tokio::task::spawn_blocking(move || WasmSession::boot(&config))
            .await
            .map_err(|e| InterpreterError::Setup(e.to_string()))??;
        Ok(Arc::new(WasmInterpreterHandle {
            session: tokio::sync::Mutex::new(Some(session)),
        }))
    }
}

/// Live interpreter session. Calls are serialized through the mutex; the
/// session moves into a blocking task for each call and back out afterwards.
pub struct WasmInterpreterHandle {
    session: tokio::sync::Mutex<Option<WasmSession>>,
}

#[async_trait::async_trait]
impl InterpreterHandle for WasmInterpreterHandle {
    async fn run_source(&self, source: &str, io: &RunIo) -> Result<SourceOutcome, InterpreterError> {
        let mut slot = self.session.lock().await;
        let mut session = slot
            .take()
            .ok_or_else(|| InterpreterError::Runtime("interpreter state lost".to_string()))?;
        let source = source.to_string();
        let io = io.clone();
        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = session.run_source(&source, &io);
            (session, result)
        })
        .await
        .map_err(|e| InterpreterError::Runtime(e.to_string()))?;
        *slot = Some(session);
        result
    }

    async fn install_package(&self, package: &str) -> Result<(), InterpreterError> {
        let mut slot = self.session.lock().await;
        let mut session = slot
            .take()
            .ok_or_else(|| InterpreterError::Runtime("interpreter state lost".to_string()))?;
        let package = package.to_string();
        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = session.install(&package);
            (session, result)
        })
        .await
        .map_err(|e| InterpreterError::Runtime(e.to_string()))?;
        *slot = Some(session);
        result
    }
}

struct WasmSession {
    store: Store<StoreState>,
    memory: Memory,
    alloc: TypedFunc<i32, i32>,
    dealloc: TypedFunc<(i32, i32), ()>,
    run: TypedFunc<(i32, i32), i32>,
    install: Option<TypedFunc<(i32, i32), i32>>,
    max_fuel: u64,
    enable_fuel: bool,
}

impl WasmSession {
    fn boot(config: &WasmRuntimeConfig) -> Result<Self, InterpreterError> {
        let bytes = load_bundle_bytes(&config.bundle)?;
        if bytes.len() < 4 || !bytes.starts_with(b"\0asm") {
            return Err(InterpreterError::BundleUnavailable(
                "invalid wasm magic header".to_string(),
            ));
        }

        let mut engine_cfg = wasmtime::Config::new();
        if config.enable_fuel {
            engine_cfg.consume_fuel(true);
        }
        let engine =
            Engine::new(&engine_cfg).map_err(|e| InterpreterError::Setup(e.to_string()))?;

        let module = Module::new(&engine, &bytes)
            .map_err(|e| InterpreterError::BundleUnavailable(e.to_string()))?;

        let mut linker = Linker::new(&engine);
        linker
            .func_wrap(
                "env",
                "emit",
                |mut caller: Caller<'_, StoreState>,
                 stream: i32,
                 ptr: i32,
                 len: i32|
                 -> anyhow::Result<()> {
                    let memory = caller
                        .get_export("memory")
                        .and_then(|e| e.into_memory())
                        .ok_or_else(|| anyhow::anyhow!("missing export: memory"))?;
                    let mut buf = vec![0u8; len as usize];
                    memory.read(&caller, ptr as usize, &mut buf)?;
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    let io = caller.data().io.clone();
                    if stream == 0 {
                        io.write_stdout(&text);
                    } else {
                        io.write_stderr(&text);
                    }
                    Ok(())
                },
            )
            .map_err(|e| InterpreterError::Setup(e.to_string()))?;
        linker
            .func_wrap(
                "env",
                "prompt",
                |mut caller: Caller<'_, StoreState>,
                 q_ptr: i32,
                 q_len: i32,
                 buf_ptr: i32,
                 buf_cap: i32|
                 -> anyhow::Result<i32> {
                    let memory = caller
                        .get_export("memory")
                        .and_then(|e| e.into_memory())
                        .ok_or_else(|| anyhow::anyhow!("missing export: memory"))?;
                    let mut question = vec![0u8; q_len as usize];
                    memory.read(&caller, q_ptr as usize, &mut question)?;
                    let question = String::from_utf8_lossy(&question).into_owned();
                    // A declined prompt reads as an empty line.
                    let reply = caller.data().io.prompt_line(&question).unwrap_or_default();
                    let bytes = reply.as_bytes();
                    let n = bytes.len().min(buf_cap as usize);
                    memory.write(&mut caller, buf_ptr as usize, &bytes[..n])?;
                    Ok(n as i32)
                },
            )
            .map_err(|e| InterpreterError::Setup(e.to_string()))?;

        let limits = StoreLimitsBuilder::new()
            .memory_size(config.max_memory_pages as usize * 64 * 1024)
            .build();
        let mut store = Store::new(
            &engine,
            StoreState {
                limits,
                io: RunIo::new(Arc::new(OutputSink::new()), Arc::new(NullPrompt)),
            },
        );
        store.limiter(|state| &mut state.limits);
        if config.enable_fuel {
            store
                .set_fuel(config.max_fuel)
                .map_err(|e| InterpreterError::Setup(e.to_string()))?;
        }

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| InterpreterError::Setup(e.to_string()))?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| InterpreterError::Setup("bundle missing export: memory".to_string()))?;
        let alloc = instance
            .get_typed_func::<i32, i32>(&mut store, "alloc")
            .map_err(|_| InterpreterError::Setup("bundle missing export: alloc".to_string()))?;
        let dealloc = instance
            .get_typed_func::<(i32, i32), ()>(&mut store, "dealloc")
            .map_err(|_| InterpreterError::Setup("bundle missing export: dealloc".to_string()))?;
        let run = instance
            .get_typed_func::<(i32, i32), i32>(&mut store, "run")
            .map_err(|_| InterpreterError::Setup("bundle missing export: run".to_string()))?;
        let install = instance
            .get_typed_func::<(i32, i32), i32>(&mut store, "install")
            .ok();

        Ok(Self {
            store,
            memory,
            alloc,
            dealloc,
            run,
            install,
            max_fuel: config.max_fuel,
            enable_fuel: config.enable_fuel,
        })
    }

    fn refuel(&mut self) -> Result<(), InterpreterError> {
        if self.enable_fuel {
            self.store
                .set_fuel(self.max_fuel)
                .map_err(|e| InterpreterError::Runtime(e.to_string()))?;
        }
        Ok(())
    }

    fn write_guest(&mut self, bytes: &[u8]) -> Result<i32, InterpreterError> {
        let ptr = self
            .alloc
            .call(&mut self.store, bytes.len() as i32)
            .map_err(map_trap)?;
        self.memory
            .write(&mut self.store, ptr as usize, bytes)
            .map_err(|e| InterpreterError::Runtime(e.to_string()))?;
        Ok(ptr)
    }

    fn run_source(&mut self, source: &str, io: &RunIo) -> Result<SourceOutcome, InterpreterError> {
        self.store.data_mut().io = io.clone();
        self.refuel()?;

        let src = source.as_bytes();
        let src_ptr = self.write_guest(src)?;
        let header_ptr = self
            .run
            .call(&mut self.store, (src_ptr, src.len() as i32))
            .map_err(map_trap)?;

        let mut header = [0u8; 8];
        self.memory
            .read(&self.store, header_ptr as usize, &mut header)
            .map_err(|e| InterpreterError::Runtime(e.to_string()))?;
        let out_ptr = i32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let out_len = i32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if out_len > MAX_RESULT_BYTES {
            return Err(InterpreterError::Runtime(format!(
                "oversized result: {} bytes",
                out_len
            )));
        }

        let mut out_bytes = vec![0u8; out_len];
        self.memory
            .read(&self.store, out_ptr, &mut out_bytes)
            .map_err(|e| InterpreterError::Runtime(e.to_string()))?;
        let payload: Value = serde_json::from_slice(&out_bytes)
            .map_err(|e| InterpreterError::Runtime(format!("malformed result payload: {}", e)))?;
        let error = payload
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string);

        let _ = self
            .dealloc
            .call(&mut self.store, (src_ptr, src.len() as i32));

        Ok(SourceOutcome { error })
    }

    fn install(&mut self, package: &str) -> Result<(), InterpreterError> {
        let install = match &self.install {
            Some(f) => f.clone(),
            None => {
                return Err(InterpreterError::Unsupported(
                    "package installation".to_string(),
                ))
            }
        };
        self.refuel()?;

        let name = package.as_bytes();
        let name_ptr = self.write_guest(name)?;
        let status = install
            .call(&mut self.store, (name_ptr, name.len() as i32))
            .map_err(map_trap)?;
        let _ = self
            .dealloc
            .call(&mut self.store, (name_ptr, name.len() as i32));

        if status != 0 {
            return Err(InterpreterError::Runtime(format!(
                "package install failed: {} (status {})",
                package, status
            )));
        }
        Ok(())
    }
}

fn load_bundle_bytes(source: &BundleSource) -> Result<Vec<u8>, InterpreterError> {
    match source {
        BundleSource::File(path) => std::fs::read(path).map_err(|e| {
            InterpreterError::BundleUnavailable(format!("{}: {}", path.display(), e))
        }),
        BundleSource::Inline(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(InterpreterError::BundleUnavailable(
                    "empty interpreter bundle".to_string(),
                ));
            }
            if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(trimmed.as_bytes())
            {
                return Ok(bytes);
            }
            wat::parse_str(trimmed).map_err(|e| InterpreterError::BundleUnavailable(e.to_string()))
        }
    }
}

fn map_trap(err: wasmtime::Error) -> InterpreterError {
    let msg = err.to_string();
    if msg.to_lowercase().contains("fuel") {
        InterpreterError::Runtime("fuel exhausted".to_string())
    } else {
        InterpreterError::Runtime(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::interpreter::{PreloadStrategy, QueuedPrompt};

    const ALLOC_FUNCS: &str = r#"
  (global $heap (mut i32) (i32.const 1024))
  (func (export "alloc") (param $size i32) (result i32)
    (local $addr i32)
    global.get $heap
    local.set $addr
    global.get $heap
    local.get $size
    i32.add
    global.set $heap
    local.get $addr)
  (func (export "dealloc") (param i32 i32))
"#;

    fn echo_bundle() -> String {
        format!(
            r#"(module
  (import "env" "emit" (func $emit (param i32 i32 i32)))
  (memory (export "memory") 1)
{ALLOC_FUNCS}
  (data (i32.const 16) "{{\"error\":null}}")
  (data (i32.const 64) "\10\00\00\00\0e\00\00\00")
  (func (export "run") (param $ptr i32) (param $len i32) (result i32)
    (call $emit (i32.const 0) (local.get $ptr) (local.get $len))
    (i32.const 64))
  (func (export "install") (param i32 i32) (result i32) (i32.const 0))
)"#
        )
    }

    fn fault_bundle() -> String {
        format!(
            r#"(module
  (import "env" "emit" (func $emit (param i32 i32 i32)))
  (memory (export "memory") 1)
{ALLOC_FUNCS}
  (data (i32.const 0) "boom\n")
  (data (i32.const 16) "{{\"error\":\"boom\"}}")
  (data (i32.const 64) "\10\00\00\00\10\00\00\00")
  (func (export "run") (param i32 i32) (result i32)
    (call $emit (i32.const 1) (i32.const 0) (i32.const 5))
    (i32.const 64))
)"#
        )
    }

    fn prompt_bundle() -> String {
        format!(
            r#"(module
  (import "env" "emit" (func $emit (param i32 i32 i32)))
  (import "env" "prompt" (func $prompt (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
{ALLOC_FUNCS}
  (data (i32.const 0) "name? ")
  (data (i32.const 16) "{{\"error\":null}}")
  (data (i32.const 64) "\10\00\00\00\0e\00\00\00")
  (func (export "run") (param i32 i32) (result i32)
    (local $n i32)
    (local.set $n (call $prompt (i32.const 0) (i32.const 6) (i32.const 256) (i32.const 64)))
    (call $emit (i32.const 0) (i32.const 256) (local.get $n))
    (i32.const 64))
)"#
        )
    }

    fn spin_bundle() -> String {
        r#"(module
  (memory (export "memory") 1)
  (func (export "alloc") (param i32) (result i32) (i32.const 512))
  (func (export "dealloc") (param i32 i32))
  (func (export "run") (param i32 i32) (result i32)
    (local $i i32)
    (local.set $i (i32.const 0))
    (loop $loop
      local.get $i
      i32.const 1
      i32.add
      local.tee $i
      i32.const 100000000
      i32.lt_s
      br_if $loop)
    (i32.const 0))
)"#
        .to_string()
    }

    fn runtime_over(wat: String) -> WasmInterpreterRuntime {
        WasmInterpreterRuntime::new(WasmRuntimeConfig::new(BundleSource::Inline(wat)))
    }

    fn options() -> LoadOptions {
        LoadOptions {
            preload: PreloadStrategy::Minimal,
            index_url: None,
        }
    }

    fn plain_io() -> (Arc<OutputSink>, RunIo) {
        let sink = Arc::new(OutputSink::new());
        let io = RunIo::new(sink.clone(), Arc::new(NullPrompt));
        (sink, io)
    }

    #[tokio::test]
    async fn test_run_echoes_source_to_stdout() {
        let handle = runtime_over(echo_bundle()).load(&options()).await.unwrap();
        let (sink, io) = plain_io();

        let outcome = handle.run_source("print('x')", &io).await.unwrap();
        assert_eq!(outcome, SourceOutcome::completed());
        assert_eq!(sink.drain().stdout, "print('x')");
    }

    #[tokio::test]
    async fn test_run_reports_guest_error() {
        let handle = runtime_over(fault_bundle()).load(&options()).await.unwrap();
        let (sink, io) = plain_io();

        let outcome = handle.run_source("1/0", &io).await.unwrap();
        assert_eq!(outcome.error.as_deref(), Some("boom"));
        assert_eq!(sink.drain().stderr, "boom\n");
    }

    #[tokio::test]
    async fn test_prompt_round_trip() {
        let handle = runtime_over(prompt_bundle())
            .load(&options())
            .await
            .unwrap();
        let sink = Arc::new(OutputSink::new());
        let io = RunIo::new(sink.clone(), Arc::new(QueuedPrompt::new(["Ada"])));

        let outcome = handle.run_source("input()", &io).await.unwrap();
        assert_eq!(outcome, SourceOutcome::completed());
        assert_eq!(sink.drain().stdout, "Ada");
    }

    #[tokio::test]
    async fn test_fuel_exhaustion_is_a_runtime_fault() {
        let mut config = WasmRuntimeConfig::new(BundleSource::Inline(spin_bundle()));
        config.max_fuel = 10_000;
        let handle = WasmInterpreterRuntime::new(config)
            .load(&options())
            .await
            .unwrap();

        let (_sink, io) = plain_io();
        let err = handle
            .run_source("while True: pass", &io)
            .await
            .unwrap_err();
        match err {
            InterpreterError::Runtime(msg) => assert!(msg.contains("fuel")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_install_via_export() {
        let handle = runtime_over(echo_bundle()).load(&options()).await.unwrap();
        handle.install_package("micropip").await.unwrap();
    }

    #[tokio::test]
    async fn test_install_without_export_is_unsupported() {
        let handle = runtime_over(fault_bundle()).load(&options()).await.unwrap();
        let err = handle.install_package("micropip").await.unwrap_err();
        assert!(matches!(err, InterpreterError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_invalid_bundle_is_unavailable() {
        let runtime = runtime_over("AAAA".to_string());
        let err = runtime
            .load(&options())
            .await
            .err()
            .expect("load should fail");
        assert!(matches!(err, InterpreterError::BundleUnavailable(_)));
    }

    #[tokio::test]
    async fn test_bundle_missing_run_export_fails_setup() {
        let wat = r#"(module (memory (export "memory") 1))"#;
        let runtime = runtime_over(wat.to_string());
        let err = runtime
            .load(&options())
            .await
            .err()
            .expect("load should fail");
        assert!(matches!(err, InterpreterError::Setup(_)));
    }
}
