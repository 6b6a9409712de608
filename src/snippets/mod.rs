//! Saved code snippets.
//!
//! Snippets belong to a signed-in user; every operation is scoped to the
//! owner's id, so a missing row and someone else's row are indistinguishable
//! (`NotFound`). Storage sits behind [`SnippetStore`]; the crate ships an
//! in-memory implementation. The "update the existing snippet or save a new
//! one" question is answered by an injected [`SaveDecider`], the headless
//! form of a confirmation dialog.

pub mod examples;
mod memory;

pub use examples::{example_by_name, example_programs, ExampleProgram};
pub use memory::MemorySnippetStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SnippetError {
    #[error("Snippet not found: {0}")]
    NotFound(i64),
    #[error("Snippet storage error: {0}")]
    Storage(String),
}

/// A stored snippet, full row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSnippet {
    pub id: i64,
    pub title: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Listing shape: everything but the code body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetSummary {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// What the user asked to save.
#[derive(Debug, Clone, Default)]
pub struct SnippetDraft {
    pub title: String,
    pub code: String,
    /// Id of the snippet this draft was loaded from, if any.
    pub existing_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDecision {
    UpdateExisting,
    SaveAsNew,
}

/// Decides between updating a loaded snippet and saving a fresh copy.
pub trait SaveDecider: Send + Sync {
    fn decide(&self, draft: &SnippetDraft, existing_id: i64) -> SaveDecision;
}

/// Re-saving a loaded snippet overwrites it.
#[derive(Debug, Default)]
pub struct AlwaysUpdate;

impl SaveDecider for AlwaysUpdate {
    fn decide(&self, _draft: &SnippetDraft, _existing_id: i64) -> SaveDecision {
        SaveDecision::UpdateExisting
    }
}

/// Every save creates a new snippet.
#[derive(Debug, Default)]
pub struct AlwaysSaveAsNew;

impl SaveDecider for AlwaysSaveAsNew {
    fn decide(&self, _draft: &SnippetDraft, _existing_id: i64) -> SaveDecision {
        SaveDecision::SaveAsNew
    }
}

/// Owner-scoped snippet persistence.
#[async_trait]
pub trait SnippetStore: Send + Sync {
    async fn insert(
        &self,
        user_id: i64,
        title: &str,
        code: &str,
    ) -> Result<SavedSnippet, SnippetError>;

    async fn update(
        &self,
        user_id: i64,
        id: i64,
        title: &str,
        code: &str,
    ) -> Result<SavedSnippet, SnippetError>;

    /// Summaries ordered by `last_modified`, newest first.
    async fn list(&self, user_id: i64) -> Result<Vec<SnippetSummary>, SnippetError>;

    async fn get(&self, user_id: i64, id: i64) -> Result<SavedSnippet, SnippetError>;

    async fn delete(&self, user_id: i64, id: i64) -> Result<(), SnippetError>;
}
