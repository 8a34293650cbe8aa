//! HTTP client for a remote intelligence backend.
//!
//! Endpoints, relative to the configured base URL:
//! - `GET  api/threads/{id}/intel`
//! - `GET  api/attachments/{id}/intel`
//! - `POST api/drafts/`
//! - `POST api/tasks/`

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    AnalysisKind, AnalysisResponse, AnalysisService, DraftResponse, DraftService, NewTask,
    TaskSink, ThreadContext, Tone,
};
use crate::domain::{EntityId, TaskId, ThreadId};

/// Connect timeout for backend requests. Overall call deadlines are
/// enforced by the panel.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct DraftRequestBody<'a> {
    thread_id: &'a ThreadId,
    tone: Tone,
    additional_context: Option<String>,
}

#[derive(Debug, Serialize)]
struct TaskRequestBody<'a> {
    title: &'a str,
    thread_id: &'a ThreadId,
    is_ai_generated: bool,
}

#[derive(Debug, Deserialize)]
struct TaskCreated {
    task_id: TaskId,
}

/// JSON client for the intelligence backend.
#[derive(Debug, Clone)]
pub struct HttpIntelligenceClient {
    client: Client,
    base_url: Url,
}

impl HttpIntelligenceClient {
    /// Creates a client for the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: normalize_base(base_url)?,
        })
    }

    /// URL of the analysis endpoint for an entity.
    pub fn analysis_url(&self, entity_id: &EntityId) -> Result<Url> {
        let path = match entity_id {
            EntityId::Thread(id) => format!("api/threads/{id}/intel"),
            EntityId::Attachment(id) => format!("api/attachments/{id}/intel"),
        };
        self.base_url
            .join(&path)
            .with_context(|| format!("invalid analysis path for {entity_id}"))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid endpoint {path}"))
    }
}

/// Ensures the base URL ends with a slash so relative joins append.
fn normalize_base(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).with_context(|| format!("invalid base URL {base_url}"))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Joins the optional draft inputs into the backend's single context field.
fn additional_context(context: &ThreadContext) -> Option<String> {
    let parts: Vec<&str> = [
        context.instructions.as_deref(),
        context.attachment_summary.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("backend returned {status}: {body}"))
}

#[async_trait]
impl AnalysisService for HttpIntelligenceClient {
    async fn analyze(&self, entity_id: &EntityId, kind: AnalysisKind) -> Result<AnalysisResponse> {
        let url = self.analysis_url(entity_id)?;
        tracing::debug!(%url, %kind, "requesting analysis");

        let response = self.client.get(url).send().await?;
        let response = ensure_success(response).await?;
        response
            .json::<AnalysisResponse>()
            .await
            .context("malformed analysis response")
    }
}

#[async_trait]
impl DraftService for HttpIntelligenceClient {
    async fn draft(&self, tone: Tone, context: &ThreadContext) -> Result<DraftResponse> {
        let url = self.endpoint("api/drafts/")?;
        let body = DraftRequestBody {
            thread_id: &context.thread_id,
            tone,
            additional_context: additional_context(context),
        };

        let response = self.client.post(url).json(&body).send().await?;
        let response = ensure_success(response).await?;
        response
            .json::<DraftResponse>()
            .await
            .context("malformed draft response")
    }
}

#[async_trait]
impl TaskSink for HttpIntelligenceClient {
    async fn add_task(&self, task: NewTask) -> Result<TaskId> {
        let url = self.endpoint("api/tasks/")?;
        let body = TaskRequestBody {
            title: &task.title,
            thread_id: &task.source_thread_id,
            is_ai_generated: task.is_ai_generated,
        };

        let response = self.client.post(url).json(&body).send().await?;
        let response = ensure_success(response).await?;
        let created: TaskCreated = response
            .json()
            .await
            .context("malformed task response")?;
        Ok(created.task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AttachmentId;

    #[test]
    fn analysis_urls_keep_base_path() {
        let client = HttpIntelligenceClient::new("http://localhost:8000/v1").unwrap();

        let thread = client
            .analysis_url(&ThreadId::from("t-42").into())
            .unwrap();
        assert_eq!(thread.as_str(), "http://localhost:8000/v1/api/threads/t-42/intel");

        let attachment = client
            .analysis_url(&AttachmentId::from("a-7").into())
            .unwrap();
        assert_eq!(
            attachment.as_str(),
            "http://localhost:8000/v1/api/attachments/a-7/intel"
        );
    }

    #[test]
    fn rejects_invalid_base() {
        assert!(HttpIntelligenceClient::new("not a url").is_err());
    }

    #[test]
    fn additional_context_joins_parts() {
        let mut context = ThreadContext {
            thread_id: ThreadId::from("t1"),
            subject: String::new(),
            sender: String::new(),
            body: String::new(),
            attachment_summary: None,
            instructions: None,
        };
        assert_eq!(additional_context(&context), None);

        context.instructions = Some("Keep it short".to_string());
        context.attachment_summary = Some("Invoice for 42.5 hours".to_string());
        assert_eq!(
            additional_context(&context).as_deref(),
            Some("Keep it short\n\nInvoice for 42.5 hours")
        );
    }

    #[test]
    fn backend_summary_field_is_accepted() {
        let response: AnalysisResponse =
            serde_json::from_str(r#"{"summary":"Contract terms","importance":"high"}"#).unwrap();
        assert_eq!(response.summary_text, "Contract terms");
    }
}
