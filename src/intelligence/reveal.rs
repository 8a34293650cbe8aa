//! Progressive reveal of a summary as a growing prefix length.
//!
//! The sequencer publishes [`RevealState`] on a `watch` channel; renderers
//! subscribe and draw `visible_text()`. At most one ticker task runs per
//! sequencer. Starting a new reveal hard-stops the previous ticker before
//! the new state is published, and every write is additionally guarded by
//! the reveal id so a ticker that lost the race cannot touch the new state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::analysis::AnalysisResult;
use crate::config::RevealSettings;

/// Snapshot of the reveal for the displayed result.
#[derive(Debug, Clone, Default)]
pub struct RevealState {
    /// Increments with every started reveal.
    pub reveal_id: u64,
    pub result: Option<Arc<AnalysisResult>>,
    /// Characters revealed so far, `0 ..= target_length`.
    pub revealed_length: usize,
    pub target_length: usize,
}

impl RevealState {
    /// Whether the whole summary is visible.
    pub fn is_complete(&self) -> bool {
        self.revealed_length >= self.target_length
    }

    /// The revealed prefix of the summary.
    pub fn visible_text(&self) -> String {
        self.result
            .as_ref()
            .map(|r| r.summary_text.chars().take(self.revealed_length).collect())
            .unwrap_or_default()
    }

    /// Whether this reveal is showing exactly `result`.
    pub fn is_revealing(&self, result: &Arc<AnalysisResult>) -> bool {
        self.result.as_ref().is_some_and(|r| Arc::ptr_eq(r, result))
    }
}

struct ActiveReveal {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives the reveal of one result at a time.
pub struct RevealSequencer {
    settings: RevealSettings,
    state: Arc<watch::Sender<RevealState>>,
    active: Option<ActiveReveal>,
    next_id: u64,
}

impl RevealSequencer {
    pub fn new(settings: RevealSettings) -> Self {
        let (state, _) = watch::channel(RevealState::default());
        Self {
            settings,
            state: Arc::new(state),
            active: None,
            next_id: 0,
        }
    }

    /// Starts revealing `result` from zero, stopping any reveal in progress.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, result: Arc<AnalysisResult>) {
        self.halt();

        self.next_id += 1;
        let reveal_id = self.next_id;
        let target_length = result.summary_len();

        self.state.send_replace(RevealState {
            reveal_id,
            result: Some(result),
            revealed_length: 0,
            target_length,
        });

        if target_length == 0 {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_ticker(
            Arc::clone(&self.state),
            reveal_id,
            target_length,
            self.settings.duration(),
            self.settings.tick(),
            cancel.clone(),
        ));
        self.active = Some(ActiveReveal { cancel, handle });
    }

    /// Replaces the current reveal with one for `result`.
    pub fn supersede(&mut self, result: Arc<AnalysisResult>) {
        tracing::trace!(
            previous = self.state.borrow().reveal_id,
            "reveal superseded"
        );
        self.start(result);
    }

    /// Stops the reveal and forgets its result.
    pub fn clear(&mut self) {
        self.halt();
        self.next_id += 1;
        self.state.send_replace(RevealState {
            reveal_id: self.next_id,
            ..RevealState::default()
        });
    }

    /// Current reveal state.
    pub fn state(&self) -> RevealState {
        self.state.borrow().clone()
    }

    /// Subscribes to reveal updates.
    pub fn subscribe(&self) -> watch::Receiver<RevealState> {
        self.state.subscribe()
    }

    /// Whether a ticker is still advancing.
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    fn halt(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.handle.abort();
        }
    }
}

impl Drop for RevealSequencer {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Linear reveal: length after `elapsed` of a `duration`-long reveal.
fn revealed_length_at(elapsed: Duration, duration: Duration, target: usize) -> usize {
    if duration.is_zero() || elapsed >= duration {
        return target;
    }
    let fraction = elapsed.as_secs_f64() / duration.as_secs_f64();
    ((target as f64 * fraction).ceil() as usize).min(target)
}

async fn run_ticker(
    state: Arc<watch::Sender<RevealState>>,
    reveal_id: u64,
    target_length: usize,
    duration: Duration,
    tick: Duration,
    cancel: CancellationToken,
) {
    let started = Instant::now();
    let mut interval = tokio::time::interval_at(started + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let length = revealed_length_at(started.elapsed(), duration, target_length);
                let mut finished = false;
                state.send_if_modified(|current| {
                    if current.reveal_id != reveal_id {
                        finished = true;
                        return false;
                    }
                    if length <= current.revealed_length {
                        return false;
                    }
                    current.revealed_length = length;
                    finished = length >= current.target_length;
                    true
                });
                if finished {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ThreadId;
    use crate::intelligence::selection::Generation;
    use crate::services::{AnalysisKind, Importance};

    fn result(text: &str) -> Arc<AnalysisResult> {
        Arc::new(AnalysisResult {
            entity_id: ThreadId::from("t1").into(),
            kind: AnalysisKind::ThreadSummary,
            summary_text: text.to_string(),
            key_points: Vec::new(),
            document_type: None,
            importance: Importance::Medium,
            suggested_actions: Vec::new(),
            entities: Vec::new(),
            generation: Generation::default(),
        })
    }

    fn settings() -> RevealSettings {
        RevealSettings {
            duration_ms: 1000,
            tick_ms: 100,
        }
    }

    #[test]
    fn linear_progress() {
        let duration = Duration::from_secs(1);
        assert_eq!(revealed_length_at(Duration::ZERO, duration, 10), 0);
        assert_eq!(revealed_length_at(Duration::from_millis(250), duration, 10), 3);
        assert_eq!(revealed_length_at(Duration::from_millis(999), duration, 10), 10);
        assert_eq!(revealed_length_at(Duration::from_secs(5), duration, 10), 10);
        assert_eq!(revealed_length_at(Duration::ZERO, Duration::ZERO, 7), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_is_monotonic_and_completes_once() {
        let mut sequencer = RevealSequencer::new(settings());
        let mut rx = sequencer.subscribe();
        sequencer.start(result("0123456789abcdefghij"));

        let mut observed = vec![rx.borrow_and_update().revealed_length];
        while !rx.borrow().is_complete() {
            rx.changed().await.unwrap();
            let state = rx.borrow_and_update();
            assert!(state.revealed_length <= state.target_length);
            observed.push(state.revealed_length);
        }

        assert_eq!(observed.first(), Some(&0));
        assert!(observed.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(observed.iter().filter(|&&len| len == 20).count(), 1);
        assert_eq!(sequencer.state().visible_text(), "0123456789abcdefghij");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!sequencer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn supersede_halts_previous_reveal() {
        let mut sequencer = RevealSequencer::new(settings());
        let first = result("first summary text");
        sequencer.start(Arc::clone(&first));

        tokio::time::sleep(Duration::from_millis(350)).await;
        let partial = sequencer.state();
        assert!(partial.revealed_length > 0);
        assert!(!partial.is_complete());

        let second = result("second");
        sequencer.supersede(Arc::clone(&second));
        let restarted = sequencer.state();
        assert!(restarted.is_revealing(&second));
        assert_eq!(restarted.revealed_length, 0);
        assert_eq!(restarted.target_length, 6);

        let mut rx = sequencer.subscribe();
        rx.borrow_and_update();
        while !rx.borrow().is_complete() {
            rx.changed().await.unwrap();
            let state = rx.borrow_and_update();
            assert!(!state.is_revealing(&first));
            assert!(state.is_revealing(&second));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn clear_forgets_result() {
        let mut sequencer = RevealSequencer::new(settings());
        sequencer.start(result("some text"));
        sequencer.clear();

        tokio::time::sleep(Duration::from_secs(2)).await;
        let state = sequencer.state();
        assert!(state.result.is_none());
        assert_eq!(state.revealed_length, 0);
        assert!(!sequencer.is_running());
    }

    #[tokio::test]
    async fn empty_summary_is_immediately_complete() {
        let mut sequencer = RevealSequencer::new(settings());
        sequencer.start(result(""));
        assert!(sequencer.state().is_complete());
        assert!(!sequencer.is_running());
    }

    #[test]
    fn visible_text_respects_char_boundaries() {
        let state = RevealState {
            reveal_id: 1,
            result: Some(result("héllo")),
            revealed_length: 2,
            target_length: 5,
        };
        assert_eq!(state.visible_text(), "hé");
    }
}
