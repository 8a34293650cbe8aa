//! Headless demo application.
//!
//! Wires the panel to either the simulated service or a configured backend
//! and plays a short scripted session, logging what a renderer would show.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::PanelConfig;
use crate::domain::{Attachment, Mailbox, ThreadId, ThreadSnapshot};
use crate::intelligence::{IntelligencePanel, PanelEvent, PanelServices};
use crate::services::{
    AnalysisKind, HttpIntelligenceClient, InMemoryTaskStore, SimulatedAiService,
};

/// Main application entry point
pub struct App {
    config: PanelConfig,
    mailbox: Mailbox,
}

impl App {
    pub fn new(config: PanelConfig) -> Self {
        Self {
            config,
            mailbox: demo_mailbox(),
        }
    }

    fn services(&self) -> Result<PanelServices> {
        let threads = Arc::new(self.mailbox.clone());

        if let Some(url) = self.config.service_url.as_deref() {
            tracing::info!(%url, "using intelligence backend");
            let client = Arc::new(
                HttpIntelligenceClient::new(url).context("failed to create backend client")?,
            );
            return Ok(PanelServices {
                analysis: client.clone(),
                drafts: client.clone(),
                tasks: client,
                threads,
            });
        }

        tracing::info!(
            latency_ms = self.config.simulated_latency_ms,
            "using simulated intelligence service"
        );
        let ai = Arc::new(
            SimulatedAiService::new(self.mailbox.clone())
                .with_analysis_latency(self.config.simulated_latency()),
        );
        Ok(PanelServices {
            analysis: ai.clone(),
            drafts: ai,
            tasks: Arc::new(InMemoryTaskStore::new()),
            threads,
        })
    }

    /// Runs the scripted session.
    pub async fn run(self) -> Result<()> {
        let mut panel = IntelligencePanel::new(&self.config, self.services()?);
        let mut events = panel.subscribe_events();

        let ids = self.mailbox.thread_ids();
        let (Some(first), Some(second)) = (ids.first(), ids.get(1)) else {
            anyhow::bail!("demo mailbox needs at least two threads");
        };

        // Switch threads before the first analysis can finish; its results
        // must be discarded.
        panel.select_primary(first)?;
        panel.select_primary(second)?;
        settle_analysis(&mut panel).await;
        show_brief(&panel);

        let mut reveal = panel.subscribe_reveal();
        while !reveal.borrow_and_update().is_complete() {
            reveal.changed().await.context("reveal stopped")?;
        }
        tracing::info!(
            summary = %panel.visible_summary(AnalysisKind::ThreadSummary).unwrap_or_default(),
            "reveal finished"
        );

        if panel.accept_suggestion(0).is_ok() {
            wait_for_task(&mut events).await;
        }

        panel.generate_draft(panel.default_tone(), None)?;
        while panel.is_drafting() {
            match panel.process_next().await {
                Some(event) => tracing::debug!(?event, "panel event"),
                None => break,
            }
        }
        if let Some(draft) = panel.draft() {
            tracing::info!(
                status = %draft.status,
                unresolved_placeholders = draft.has_unresolved_placeholders(),
                text = draft.text().unwrap_or_default(),
                "draft"
            );
        }

        panel.close();
        Ok(())
    }
}

async fn settle_analysis(panel: &mut IntelligencePanel) {
    while panel.is_analyzing(AnalysisKind::ThreadSummary)
        || panel.is_analyzing(AnalysisKind::AttachmentSummary)
    {
        match panel.process_next().await {
            Some(PanelEvent::StaleResultDiscarded {
                entity_id, reason, ..
            }) => {
                tracing::info!(entity = %entity_id, %reason, "discarded result for previous selection");
            }
            Some(event) => tracing::debug!(?event, "panel event"),
            None => break,
        }
    }
}

fn show_brief(panel: &IntelligencePanel) {
    for kind in [AnalysisKind::ThreadSummary, AnalysisKind::AttachmentSummary] {
        match panel.result(kind) {
            Some(result) => tracing::info!(
                %kind,
                entity = %result.entity_id,
                importance = ?result.importance,
                key_points = result.key_points.len(),
                suggestions = ?result.suggested_actions,
                "analysis shown"
            ),
            None => tracing::info!(%kind, status = ?panel.analysis_status(kind), "no analysis shown"),
        }
    }
}

async fn wait_for_task(events: &mut tokio::sync::broadcast::Receiver<PanelEvent>) {
    loop {
        match events.recv().await {
            Ok(PanelEvent::TaskCreated { task_id, title }) => {
                tracing::info!(task = %task_id, %title, "suggestion saved as task");
                return;
            }
            Ok(PanelEvent::TaskFailed { title, error }) => {
                tracing::warn!(%title, %error, "suggestion could not be saved");
                return;
            }
            Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Threads used by the demo session.
pub fn demo_mailbox() -> Mailbox {
    Mailbox::new()
        .with_thread(
            ThreadSnapshot::new(
                "thread-q3-budget",
                "Q3 Budget Review",
                "Sarah Chen",
                "Hi team, attached is the Q3 budget report. Marketing is 15% over \
                 and we need to finalize the revised numbers before the board meeting.",
            )
            .with_attachment(Attachment::new(
                "att-q3-report",
                "Q3_Budget_Report.pdf",
                "application/pdf",
                2_400_000,
            )),
        )
        .with_thread(
            ThreadSnapshot::new(
                "thread-homepage",
                "Homepage redesign mockups",
                "Mike Ross",
                "Here are the latest mockups for the homepage. Feedback by Friday please.",
            )
            .with_attachment(Attachment::new(
                "att-hero-mockup",
                "hero_v3.png",
                "image/png",
                850_000,
            ))
            .with_attachment(Attachment::new(
                "att-invoice",
                "agency_invoice.xlsx",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                42_000,
            )),
        )
        .with_thread(ThreadSnapshot::new(
            "thread-offsite",
            "Team offsite",
            "Lisa Park",
            "Can everyone confirm availability for the offsite next month?",
        ))
}
