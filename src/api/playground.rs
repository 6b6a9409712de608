//! High-level playground facade and builder.

use std::sync::Arc;

use tokio::sync::watch;

use crate::application::{ExecutionRequest, Orchestrator};
use crate::core::RuntimeContext;
use crate::engine::{
    EngineConfig, EngineState, ExecutionEngine, ExecutionReport, InterpreterRuntime, NullPrompt,
    PreloadStrategy, PromptSource,
};
use crate::error::PlaygroundError;
use crate::quota::{QuotaGate, GUEST_EXECUTION_LIMIT};
use crate::session::{Identity, IdentityBackend, OfflineIdentityBackend, SessionCache};
use crate::snippets::{
    example_programs, AlwaysUpdate, ExampleProgram, MemorySnippetStore, SaveDecider, SavedSnippet,
    SnippetDraft, SnippetStore, SnippetSummary,
};
use crate::store::{KeyValueStore, MemoryStore};

/// The assembled playground.
///
/// Use [`Playground::builder(runtime)`](Self::builder) to obtain a
/// configured instance; every collaborator has a working default, so the
/// minimal embedding is `Playground::builder(runtime).build().await`.
pub struct Playground {
    engine: ExecutionEngine,
    session: Arc<SessionCache>,
    quota: Arc<QuotaGate>,
    orchestrator: Orchestrator,
}

impl Playground {
    pub fn builder(runtime: Arc<dyn InterpreterRuntime>) -> PlaygroundBuilder {
        PlaygroundBuilder::new(runtime)
    }

    /// Run user code through the full gate/engine pipeline.
    pub async fn run_code(&self, code: &str) -> Result<ExecutionReport, PlaygroundError> {
        self.orchestrator.submit(ExecutionRequest::new(code)).await
    }

    /// Warm the interpreter up ahead of the first run.
    pub async fn initialize(&self) -> Result<(), PlaygroundError> {
        self.engine.initialize().await?;
        Ok(())
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn subscribe_engine_state(&self) -> watch::Receiver<EngineState> {
        self.engine.subscribe_state()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    /// Sign in. A successful login clears the guest execution counter.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity, PlaygroundError> {
        let identity = self.session.login(username, password).await?;
        self.quota.reset()?;
        Ok(identity)
    }

    /// Sign out. The guest counter is deliberately left as it was.
    pub async fn logout(&self) -> Result<(), PlaygroundError> {
        self.session.logout().await?;
        Ok(())
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, PlaygroundError> {
        Ok(self.session.register(username, email, password).await?)
    }

    /// Re-check the session with the identity service.
    pub async fn refresh_session(&self) -> Result<Option<Identity>, PlaygroundError> {
        Ok(self.session.refresh().await?)
    }

    /// Runs left for the current identity; `None` when signed in.
    pub fn remaining_executions(&self) -> Result<Option<u32>, PlaygroundError> {
        let identity = self.session.identity();
        let decision = self.quota.may_execute(identity.as_ref())?;
        Ok(decision.remaining)
    }

    pub async fn install_package(&self, package: &str) -> Result<(), PlaygroundError> {
        self.engine.install_package(package).await?;
        Ok(())
    }

    pub async fn save_snippet(&self, draft: SnippetDraft) -> Result<SavedSnippet, PlaygroundError> {
        self.orchestrator.save_snippet(draft).await
    }

    pub async fn list_snippets(&self) -> Result<Vec<SnippetSummary>, PlaygroundError> {
        self.orchestrator.list_snippets().await
    }

    pub async fn get_snippet(&self, id: i64) -> Result<SavedSnippet, PlaygroundError> {
        self.orchestrator.get_snippet(id).await
    }

    pub async fn delete_snippet(&self, id: i64) -> Result<(), PlaygroundError> {
        self.orchestrator.delete_snippet(id).await
    }

    /// Built-in starter programs.
    pub fn examples(&self) -> &'static [ExampleProgram] {
        example_programs()
    }
}

/// Builder for [`Playground`]. Every collaborator has a default: offline
/// identity, in-memory stores, silent prompt, update-on-resave.
pub struct PlaygroundBuilder {
    runtime: Arc<dyn InterpreterRuntime>,
    backend: Arc<dyn IdentityBackend>,
    store: Arc<dyn KeyValueStore>,
    snippets: Option<Arc<dyn SnippetStore>>,
    prompt: Arc<dyn PromptSource>,
    decider: Arc<dyn SaveDecider>,
    preload: PreloadStrategy,
    index_url: Option<String>,
    guest_limit: u32,
    context: RuntimeContext,
}

impl PlaygroundBuilder {
    pub fn new(runtime: Arc<dyn InterpreterRuntime>) -> Self {
        Self {
            runtime,
            backend: Arc::new(OfflineIdentityBackend),
            store: Arc::new(MemoryStore::new()),
            snippets: None,
            prompt: Arc::new(NullPrompt),
            decider: Arc::new(AlwaysUpdate),
            preload: PreloadStrategy::default(),
            index_url: None,
            guest_limit: GUEST_EXECUTION_LIMIT,
            context: RuntimeContext::default(),
        }
    }

    pub fn identity_backend(mut self, backend: Arc<dyn IdentityBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = store;
        self
    }

    pub fn snippet_store(mut self, snippets: Arc<dyn SnippetStore>) -> Self {
        self.snippets = Some(snippets);
        self
    }

    pub fn prompt_source(mut self, prompt: Arc<dyn PromptSource>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn save_decider(mut self, decider: Arc<dyn SaveDecider>) -> Self {
        self.decider = decider;
        self
    }

    pub fn preload(mut self, preload: PreloadStrategy) -> Self {
        self.preload = preload;
        self
    }

    pub fn package_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = Some(url.into());
        self
    }

    pub fn guest_limit(mut self, limit: u32) -> Self {
        self.guest_limit = limit;
        self
    }

    pub fn context(mut self, context: RuntimeContext) -> Self {
        self.context = context;
        self
    }

    /// Assemble the playground and restore persisted session state.
    pub async fn build(self) -> Result<Playground, PlaygroundError> {
        let engine = ExecutionEngine::with_config(
            self.runtime,
            EngineConfig {
                preload: self.preload,
                index_url: self.index_url,
            },
            self.prompt,
        );
        let session = Arc::new(SessionCache::new(
            self.backend,
            self.store.clone(),
            self.context.clone(),
        ));
        session.bootstrap().await?;

        let quota = Arc::new(QuotaGate::with_limit(self.store, self.guest_limit));
        let snippets = self
            .snippets
            .unwrap_or_else(|| Arc::new(MemorySnippetStore::new(self.context.clone())));
        let orchestrator = Orchestrator::new(
            engine.clone(),
            session.clone(),
            quota.clone(),
            snippets,
            self.decider,
            self.context,
        );

        Ok(Playground {
            engine,
            session,
            quota,
            orchestrator,
        })
    }
}
