use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::RuntimeContext;
use crate::engine::{ExecutionEngine, ExecutionReport};
use crate::error::PlaygroundError;
use crate::quota::QuotaGate;
use crate::session::{Identity, SessionCache, SessionError};
use crate::snippets::{
    SaveDecider, SaveDecision, SavedSnippet, SnippetDraft, SnippetStore, SnippetSummary,
};

/// One user-submitted run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub code: String,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// Composes session, quota and engine into the submit flow, and owns the
/// run slot that keeps runs serial.
pub struct Orchestrator {
    engine: ExecutionEngine,
    session: Arc<SessionCache>,
    quota: Arc<QuotaGate>,
    snippets: Arc<dyn SnippetStore>,
    decider: Arc<dyn SaveDecider>,
    context: RuntimeContext,
    run_active: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        engine: ExecutionEngine,
        session: Arc<SessionCache>,
        quota: Arc<QuotaGate>,
        snippets: Arc<dyn SnippetStore>,
        decider: Arc<dyn SaveDecider>,
        context: RuntimeContext,
    ) -> Self {
        Self {
            engine,
            session,
            quota,
            snippets,
            decider,
            context,
            run_active: AtomicBool::new(false),
        }
    }

    /// Run user code end to end: gate first, engine up, count the guest run,
    /// execute. A second submit while one is in flight is rejected with
    /// [`PlaygroundError::RunInProgress`].
    ///
    /// Ordering guarantees: the quota counter is untouched when the gate
    /// rejects or the engine fails to come up, and is incremented once the
    /// run is committed, before user code executes. A user-code fault
    /// therefore still consumes the execution.
    pub async fn submit(&self, request: ExecutionRequest) -> Result<ExecutionReport, PlaygroundError> {
        let _slot =
            RunSlot::acquire(&self.run_active).ok_or(PlaygroundError::RunInProgress)?;
        let run_id = self.context.id_generator.next_id();

        let identity = self.session.identity();
        self.quota.check(identity.as_ref())?;

        self.engine.initialize().await?;
        if identity.is_none() {
            let used = self.quota.record_execution()?;
            debug!(run_id = %run_id, used, "guest run recorded");
        }

        let report = self.engine.run(&request.code).await?;
        info!(
            run_id = %run_id,
            duration_ms = report.duration.as_millis() as u64,
            faulted = report.error.is_some(),
            "run finished"
        );
        Ok(report)
    }

    /// Save the draft for the signed-in user. A draft loaded from an
    /// existing snippet goes through the injected [`SaveDecider`].
    pub async fn save_snippet(&self, draft: SnippetDraft) -> Result<SavedSnippet, PlaygroundError> {
        let identity = self.require_identity()?;
        let title = self.effective_title(&draft);

        if let Some(id) = draft.existing_id {
            if self.decider.decide(&draft, id) == SaveDecision::UpdateExisting {
                let updated = self.snippets.update(identity.id, id, &title, &draft.code).await?;
                return Ok(updated);
            }
        }
        let inserted = self.snippets.insert(identity.id, &title, &draft.code).await?;
        Ok(inserted)
    }

    pub async fn list_snippets(&self) -> Result<Vec<SnippetSummary>, PlaygroundError> {
        let identity = self.require_identity()?;
        Ok(self.snippets.list(identity.id).await?)
    }

    pub async fn get_snippet(&self, id: i64) -> Result<SavedSnippet, PlaygroundError> {
        let identity = self.require_identity()?;
        Ok(self.snippets.get(identity.id, id).await?)
    }

    pub async fn delete_snippet(&self, id: i64) -> Result<(), PlaygroundError> {
        let identity = self.require_identity()?;
        self.snippets.delete(identity.id, id).await?;
        Ok(())
    }

    fn require_identity(&self) -> Result<Identity, PlaygroundError> {
        self.session
            .identity()
            .ok_or_else(|| SessionError::AuthRequired.into())
    }

    fn effective_title(&self, draft: &SnippetDraft) -> String {
        let trimmed = draft.title.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
        let stamp = DateTime::from_timestamp_millis(self.context.now_millis())
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%d %H:%M:%S");
        format!("Untitled Code {}", stamp)
    }
}

/// RAII claim on the single run slot; releases on drop, including when the
/// run errors out.
struct RunSlot<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunSlot<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
