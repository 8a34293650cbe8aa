mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use heap_intel::config::{CacheSettings, PanelConfig};
use heap_intel::domain::{AttachmentId, EntityId, ThreadId};
use heap_intel::intelligence::{
    Generation, IntelligencePanel, PanelEvent, PanelServices, StaleReason,
};
use heap_intel::services::{AnalysisKind, InMemoryTaskStore, SimulatedAiService};

use common::ScriptedAnalysis;

fn panel(analysis: Arc<ScriptedAnalysis>, tasks: Arc<InMemoryTaskStore>) -> IntelligencePanel {
    let config = PanelConfig {
        cache: CacheSettings {
            enabled: false,
            ..CacheSettings::default()
        },
        ..PanelConfig::default()
    };
    let mailbox = common::mailbox();
    IntelligencePanel::new(
        &config,
        PanelServices {
            analysis,
            drafts: Arc::new(SimulatedAiService::new(mailbox.clone())),
            tasks,
            threads: Arc::new(mailbox),
        },
    )
}

fn thread(id: &str) -> EntityId {
    ThreadId::from(id).into()
}

fn attachment(id: &str) -> EntityId {
    AttachmentId::from(id).into()
}

#[tokio::test]
async fn stale_attachment_summary_never_renders() {
    let analysis = Arc::new(ScriptedAnalysis::default());
    let mut panel = panel(analysis.clone(), Arc::new(InMemoryTaskStore::new()));

    // Select thread A; attachment X is picked automatically.
    let first = panel.select_primary(&ThreadId::from("A")).unwrap();
    assert_eq!(
        panel.selection().unwrap().secondary_id,
        Some(AttachmentId::from("X"))
    );
    assert!(panel.is_analyzing(AnalysisKind::ThreadSummary));
    assert!(panel.is_analyzing(AnalysisKind::AttachmentSummary));

    // Thread summary resolves first and renders.
    analysis.resolve(ThreadId::from("A"), "Budget is over").await;
    assert_eq!(
        panel.process_next().await.unwrap(),
        PanelEvent::AnalysisApplied {
            entity_id: thread("A"),
            kind: AnalysisKind::ThreadSummary,
            generation: first,
            cached: false,
        }
    );
    assert_eq!(
        panel.result(AnalysisKind::ThreadSummary).unwrap().summary_text,
        "Budget is over"
    );

    // Thread B is selected before X's analysis resolves.
    let second = panel.select_primary(&ThreadId::from("B")).unwrap();
    assert!(second > first);
    assert_eq!(
        panel.selection().unwrap().secondary_id,
        Some(AttachmentId::from("Y"))
    );
    assert!(panel.result(AnalysisKind::ThreadSummary).is_none());

    // X's late response has no effect.
    analysis.resolve(AttachmentId::from("X"), "Report summary").await;
    assert_eq!(
        panel.process_next().await.unwrap(),
        PanelEvent::StaleResultDiscarded {
            entity_id: attachment("X"),
            kind: AnalysisKind::AttachmentSummary,
            generation: first,
            reason: StaleReason::GenerationChanged,
        }
    );
    assert!(panel.result(AnalysisKind::AttachmentSummary).is_none());
    assert!(panel.reveal_state().result.is_none());

    // Y's response renders and its reveal starts from zero.
    analysis.resolve(AttachmentId::from("Y"), "Three hero variants").await;
    assert!(matches!(
        panel.process_next().await.unwrap(),
        PanelEvent::AnalysisApplied { .. }
    ));
    let shown = panel.result(AnalysisKind::AttachmentSummary).unwrap();
    assert_eq!(shown.entity_id, attachment("Y"));
    assert_eq!(shown.generation, second);
    assert_eq!(shown.generation, panel.current_generation());

    let reveal = panel.reveal_state();
    assert!(reveal.is_revealing(&shown));
    assert_eq!(reveal.revealed_length, 0);
    assert_eq!(reveal.target_length, "Three hero variants".len());

    let issued: Vec<EntityId> = analysis.calls().into_iter().map(|(id, _)| id).collect();
    assert_eq!(
        issued,
        vec![thread("A"), attachment("X"), thread("B"), attachment("Y")]
    );
}

#[tokio::test]
async fn generations_only_move_forward() {
    let analysis = Arc::new(ScriptedAnalysis::default());
    let mut panel = panel(analysis, Arc::new(InMemoryTaskStore::new()));
    assert_eq!(panel.current_generation(), Generation::default());

    let mut seen = vec![panel.current_generation()];
    for id in ["A", "B", "A", "A", "B"] {
        seen.push(panel.select_primary(&ThreadId::from(id)).unwrap());
    }
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(panel.current_generation().value(), 4);
}

#[tokio::test]
async fn every_accepted_suggestion_becomes_a_new_task() {
    let mailbox = common::mailbox();
    let ai = Arc::new(
        SimulatedAiService::new(mailbox.clone())
            .with_analysis_latency(Duration::ZERO)
            .with_draft_latency(Duration::ZERO),
    );
    let tasks = Arc::new(InMemoryTaskStore::new());
    let mut panel = IntelligencePanel::new(
        &PanelConfig::default(),
        PanelServices {
            analysis: ai.clone(),
            drafts: ai,
            tasks: tasks.clone(),
            threads: Arc::new(mailbox),
        },
    );
    let mut events = panel.subscribe_events();

    panel.select_primary(&ThreadId::from("A")).unwrap();
    while panel.is_analyzing(AnalysisKind::ThreadSummary) {
        panel.process_next().await.unwrap();
    }

    panel.accept_suggestion(1).unwrap();
    panel.accept_suggestion(1).unwrap();

    let mut created = 0;
    while created < 2 {
        match events.recv().await.unwrap() {
            PanelEvent::TaskCreated { title, .. } => {
                assert_eq!(title, "Schedule follow-up meeting");
                created += 1;
            }
            PanelEvent::TaskFailed { error, .. } => panic!("task failed: {error}"),
            _ => {}
        }
    }

    let saved = tasks.tasks_for_thread(&ThreadId::from("A")).await;
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|t| t.is_ai_generated));
    assert_ne!(saved[0].id, saved[1].id);
}
