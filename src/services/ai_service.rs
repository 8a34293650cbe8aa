//! Simulated AI service.
//!
//! Answers analysis and draft calls from the local mailbox after a fixed
//! latency. Used by the demo binary and for running the panel without a
//! backend.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{
    AnalysisKind, AnalysisResponse, AnalysisService, DraftResponse, DraftService, EntityHighlight,
    Importance, Placeholder, ThreadContext, Tone,
};
use crate::domain::{Attachment, EntityId, Mailbox, ThreadLookup};

/// Default latency for simulated analysis calls.
const DEFAULT_ANALYSIS_LATENCY: Duration = Duration::from_millis(1500);

/// Default latency for simulated draft calls.
const DEFAULT_DRAFT_LATENCY: Duration = Duration::from_millis(800);

/// Local stand-in for the intelligence backend.
pub struct SimulatedAiService {
    mailbox: Mailbox,
    analysis_latency: Duration,
    draft_latency: Duration,
}

impl SimulatedAiService {
    /// Creates a service over the given mailbox.
    pub fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox,
            analysis_latency: DEFAULT_ANALYSIS_LATENCY,
            draft_latency: DEFAULT_DRAFT_LATENCY,
        }
    }

    /// Overrides the analysis latency.
    pub fn with_analysis_latency(mut self, latency: Duration) -> Self {
        self.analysis_latency = latency;
        self
    }

    /// Overrides the draft latency.
    pub fn with_draft_latency(mut self, latency: Duration) -> Self {
        self.draft_latency = latency;
        self
    }

    fn thread_analysis(&self, entity_id: &EntityId) -> Result<AnalysisResponse> {
        let EntityId::Thread(thread_id) = entity_id else {
            return Err(anyhow!("{entity_id} is not a thread"));
        };
        let thread = self
            .mailbox
            .thread(thread_id)
            .ok_or_else(|| anyhow!("thread {thread_id} not found"))?;

        let importance = if thread.attachments.is_empty() {
            Importance::Medium
        } else {
            Importance::High
        };

        Ok(AnalysisResponse::summary(format!(
            "{} is asking for a review of \"{}\" and needs a decision this week.",
            thread.sender, thread.subject
        ))
        .with_key_points([
            format!("Key topic: {}", thread.subject),
            format!("Sender {} is requesting updates.", thread.sender),
            "Urgency detected in tone.".to_string(),
        ])
        .with_suggested_actions([
            "Reply to sender",
            "Schedule follow-up meeting",
            "Review attached documents",
        ])
        .with_importance(importance))
    }

    fn attachment_analysis(&self, entity_id: &EntityId) -> Result<AnalysisResponse> {
        let EntityId::Attachment(attachment_id) = entity_id else {
            return Err(anyhow!("{entity_id} is not an attachment"));
        };
        let attachment = self
            .mailbox
            .attachment(attachment_id)
            .ok_or_else(|| anyhow!("attachment {attachment_id} not found"))?;

        Ok(summarize_attachment(attachment))
    }
}

fn summarize_attachment(attachment: &Attachment) -> AnalysisResponse {
    let (summary, document_type) = if attachment.mime_type == "application/pdf" {
        (
            "This document outlines the Q3 financial projections with a focus on GPU expenditure. \
             It highlights a 15% variance in the original budget due to supply chain constraints.",
            "report",
        )
    } else if attachment.mime_type.starts_with("image/") {
        (
            "Visual mockups for the campaign. Contains 3 variants of the landing page hero section.",
            "mockup",
        )
    } else {
        (
            "Detailed line items for the service agreement. Total billable hours amount to 42.5 \
             for the month.",
            "invoice",
        )
    };

    let mut response = AnalysisResponse::summary(summary)
        .with_key_points([format!("Source file: {}", attachment.filename)]);
    response.document_type = Some(document_type.to_string());
    response.entities = vec![
        EntityHighlight::new("Deadline", "Oct 15"),
        EntityHighlight::new("Value", "$12.5k"),
        EntityHighlight::new("Status", "Pending"),
    ];
    response
}

#[async_trait]
impl AnalysisService for SimulatedAiService {
    async fn analyze(&self, entity_id: &EntityId, kind: AnalysisKind) -> Result<AnalysisResponse> {
        tokio::time::sleep(self.analysis_latency).await;

        match kind {
            AnalysisKind::ThreadSummary => self.thread_analysis(entity_id),
            AnalysisKind::AttachmentSummary => self.attachment_analysis(entity_id),
        }
    }
}

#[async_trait]
impl DraftService for SimulatedAiService {
    async fn draft(&self, tone: Tone, context: &ThreadContext) -> Result<DraftResponse> {
        tokio::time::sleep(self.draft_latency).await;

        let greeting_name = context.sender.split_whitespace().next().unwrap_or("there");
        let mut body = match tone {
            Tone::Brief => format!("Got it, thanks. I'll follow up on \"{}\".", context.subject),
            Tone::Casual => format!("Thanks for sending \"{}\" over, looks good!", context.subject),
            Tone::Meeting => format!(
                "Let's schedule a time to discuss \"{}\". How does [MEETING_TIME] work?",
                context.subject
            ),
            Tone::Normal | Tone::Formal => format!(
                "This is a {tone} reply acknowledging the receipt of \"{}\".",
                context.subject
            ),
        };

        if let Some(summary) = &context.attachment_summary {
            body.push_str(&format!("\n\nI've reviewed the attachment: {summary}"));
        }
        if let Some(instructions) = &context.instructions {
            body.push_str(&format!("\n\n{instructions}"));
        }

        let placeholders = if body.contains("[MEETING_TIME]") {
            vec![Placeholder {
                key: "MEETING_TIME".to_string(),
                description: "Proposed meeting time".to_string(),
                suggested_value: Some("Thursday 2pm".to_string()),
            }]
        } else {
            Vec::new()
        };

        Ok(DraftResponse {
            content: format!("Hi {greeting_name},\n\n{body}\n\nBest,\nUser"),
            placeholders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttachmentId, ThreadId, ThreadSnapshot};

    fn service() -> SimulatedAiService {
        let mailbox = Mailbox::new().with_thread(
            ThreadSnapshot::new("t1", "Q3 Goals", "Sarah Chen", "Please review")
                .with_attachment(Attachment::new("a1", "q3.pdf", "application/pdf", 2048)),
        );
        SimulatedAiService::new(mailbox)
            .with_analysis_latency(Duration::ZERO)
            .with_draft_latency(Duration::ZERO)
    }

    #[tokio::test]
    async fn analyzes_threads_and_attachments() {
        let service = service();

        let thread = service
            .analyze(&ThreadId::from("t1").into(), AnalysisKind::ThreadSummary)
            .await
            .unwrap();
        assert!(thread.summary_text.contains("Q3 Goals"));
        assert_eq!(thread.importance, Importance::High);
        assert_eq!(thread.suggested_actions.len(), 3);

        let attachment = service
            .analyze(&AttachmentId::from("a1").into(), AnalysisKind::AttachmentSummary)
            .await
            .unwrap();
        assert_eq!(attachment.document_type.as_deref(), Some("report"));
    }

    #[tokio::test]
    async fn unknown_entity_fails() {
        let result = service()
            .analyze(&ThreadId::from("nope").into(), AnalysisKind::ThreadSummary)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn meeting_draft_has_placeholder() {
        let context = ThreadContext {
            thread_id: ThreadId::from("t1"),
            subject: "Q3 Goals".to_string(),
            sender: "Sarah Chen".to_string(),
            body: String::new(),
            attachment_summary: Some("Budget variance of 15%".to_string()),
            instructions: None,
        };
        let draft = service().draft(Tone::Meeting, &context).await.unwrap();

        assert!(draft.content.starts_with("Hi Sarah,"));
        assert!(draft.content.contains("Budget variance"));
        assert_eq!(draft.placeholders.len(), 1);
    }
}
