//! External collaborators of the intelligence panel.
//!
//! The panel only talks to these through the traits below:
//! - [`AnalysisService`] summarizes threads and attachments
//! - [`DraftService`] generates reply drafts
//! - [`TaskSink`] persists accepted suggestions as tasks
//!
//! Implementations:
//! - `ai_service`: latency-simulating service for demos and local runs
//! - `http_client`: JSON client for a real intelligence backend
//! - `task_service`: in-memory task store

pub mod ai_service;
pub mod http_client;
pub mod task_service;

pub use ai_service::SimulatedAiService;
pub use http_client::HttpIntelligenceClient;
pub use task_service::{InMemoryTaskStore, Task};

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{EntityId, TaskId, ThreadId};

/// What kind of analysis is requested for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Summary of a whole thread.
    ThreadSummary,
    /// Summary of a single attachment.
    AttachmentSummary,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnalysisKind::ThreadSummary => "thread_summary",
            AnalysisKind::AttachmentSummary => "attachment_summary",
        })
    }
}

/// Importance classification returned by analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    #[default]
    Medium,
    Low,
}

/// A labelled value pulled out of the analyzed content ("Deadline: Oct 15").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHighlight {
    pub label: String,
    pub value: String,
}

impl EntityHighlight {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Response of [`AnalysisService::analyze`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(alias = "summary")]
    pub summary_text: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub importance: Importance,
    /// Actions the user may turn into tasks.
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EntityHighlight>,
}

impl AnalysisResponse {
    /// Creates a response with only a summary.
    pub fn summary(text: impl Into<String>) -> Self {
        Self {
            summary_text: text.into(),
            key_points: Vec::new(),
            document_type: None,
            importance: Importance::default(),
            suggested_actions: Vec::new(),
            entities: Vec::new(),
        }
    }

    pub fn with_key_points(mut self, points: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.key_points = points.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_suggested_actions(
        mut self,
        actions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggested_actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }
}

/// Tone requested for a reply draft.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Brief and direct.
    Brief,
    /// Professional default.
    #[default]
    Normal,
    /// Formal and polished.
    Formal,
    Casual,
    /// Proposes a meeting.
    Meeting,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tone::Brief => "brief",
            Tone::Normal => "normal",
            Tone::Formal => "formal",
            Tone::Casual => "casual",
            Tone::Meeting => "meeting",
        })
    }
}

/// Context handed to the draft service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadContext {
    pub thread_id: ThreadId,
    pub subject: String,
    pub sender: String,
    pub body: String,
    /// Summary of the selected attachment, when one is displayed.
    pub attachment_summary: Option<String>,
    /// Free-form user instructions ("mention I'm out until Thursday").
    pub instructions: Option<String>,
}

/// A fill-in marker left in a generated draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub key: String,
    pub description: String,
    pub suggested_value: Option<String>,
}

/// Response of [`DraftService::draft`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftResponse {
    pub content: String,
    #[serde(default)]
    pub placeholders: Vec<Placeholder>,
}

impl DraftResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            placeholders: Vec::new(),
        }
    }
}

/// A task to create from an accepted suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub source_thread_id: ThreadId,
    pub is_ai_generated: bool,
}

/// Summarizes threads and attachments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Analyzes an entity. May be slow and may fail.
    async fn analyze(&self, entity_id: &EntityId, kind: AnalysisKind) -> Result<AnalysisResponse>;
}

/// Generates reply drafts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DraftService: Send + Sync {
    /// Drafts a reply in the given tone.
    async fn draft(&self, tone: Tone, context: &ThreadContext) -> Result<DraftResponse>;
}

/// Persists accepted suggestions as tasks.
///
/// No idempotency is assumed: every call creates a new task.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskSink: Send + Sync {
    /// Creates a task and returns its id.
    async fn add_task(&self, task: NewTask) -> Result<TaskId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_kind_wire_names() {
        let json = serde_json::to_string(&AnalysisKind::AttachmentSummary).unwrap();
        assert_eq!(json, "\"attachment_summary\"");
        assert_eq!(AnalysisKind::ThreadSummary.to_string(), "thread_summary");
    }

    #[test]
    fn analysis_response_defaults_optional_fields() {
        let response: AnalysisResponse =
            serde_json::from_str(r#"{"summary_text":"Budget variance of 15%"}"#).unwrap();
        assert_eq!(response.importance, Importance::Medium);
        assert!(response.key_points.is_empty());
        assert!(response.suggested_actions.is_empty());
    }

    #[test]
    fn tone_default_is_normal() {
        assert_eq!(Tone::default(), Tone::Normal);
        let tone: Tone = serde_json::from_str("\"meeting\"").unwrap();
        assert_eq!(tone, Tone::Meeting);
    }
}
