//! Regimen sequencer
//!
//! Holds the single in-progress regimen run and advances it one segment at
//! a time. Segment timers are named `<regimen>_<segment>`; that prefix is
//! how completions are matched back to the run.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::output::{or_console, OutputSink};
use crate::timer::TimerService;

use super::store::{RegimenStore, RegimenTable, TimerSpec};

/// The regimen currently being executed
#[derive(Debug)]
struct RegimenRun {
    regimen_name: String,
    remaining: VecDeque<TimerSpec>,
    total: usize,
    /// Timer most recently launched for this run
    current_timer: Option<String>,
    generation: u64,
}

impl RegimenRun {
    fn owns(&self, timer_name: &str) -> bool {
        timer_name
            .strip_prefix(self.regimen_name.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }
}

/// Progress of the regimen in progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimenStatus {
    pub name: String,
    /// Segments not yet started
    pub remaining: usize,
    pub total: usize,
}

struct Inner {
    store: Mutex<RegimenStore>,
    timers: Arc<dyn TimerService>,
    output: Arc<dyn OutputSink>,
    advance_delay: Duration,
    run: Mutex<Option<RegimenRun>>,
    next_generation: AtomicU64,
}

/// Runs stored regimens against a timer service
#[derive(Clone)]
pub struct RegimenSequencer {
    inner: Arc<Inner>,
}

impl RegimenSequencer {
    /// `advance_delay` is the pause between a segment completing and the
    /// next one starting
    pub fn new(
        store: RegimenStore,
        timers: Arc<dyn TimerService>,
        advance_delay: Duration,
        output: Option<Arc<dyn OutputSink>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(store),
                timers,
                output: or_console(output),
                advance_delay,
                run: Mutex::new(None),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Store a regimen, replacing any regimen of the same name
    pub async fn create_regimen(&self, name: &str, segments: Vec<TimerSpec>) {
        let count = segments.len();
        self.inner.store.lock().await.upsert(name, segments);

        info!(regimen = %name, segments = count, "regimen saved");
        self.inner.output.emit(&format!(
            "Created regimen '{}' with {} timer(s)",
            name, count
        ));
    }

    /// Every stored regimen, without reporting
    pub async fn regimen_table(&self) -> RegimenTable {
        self.inner.store.lock().await.load()
    }

    /// Emit and return every stored regimen
    pub async fn list_regimens(&self) -> RegimenTable {
        let table = self.regimen_table().await;

        if table.is_empty() {
            self.inner.output.emit("No regimens available");
            return table;
        }

        self.inner.output.emit("Available regimens:");
        for (name, segments) in &table {
            let timers: Vec<String> = segments
                .iter()
                .map(|spec| format!("{} ({}s)", spec.name, spec.duration_seconds))
                .collect();
            self.inner
                .output
                .emit(&format!("- {}: {}", name, timers.join(", ")));
        }
        table
    }

    /// Start a stored regimen from its first segment. A run already in
    /// progress is replaced and its in-flight timer cancelled.
    pub async fn run_regimen(&self, name: &str) {
        let table = self.inner.store.lock().await.load();
        let Some(segments) = table.get(name) else {
            self.inner
                .output
                .emit(&format!("Regimen '{}' not found", name));
            return;
        };
        if segments.is_empty() {
            self.inner
                .output
                .emit(&format!("Regimen '{}' is empty", name));
            return;
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let stale = self.inner.run.lock().await.replace(RegimenRun {
            regimen_name: name.to_string(),
            remaining: segments.iter().cloned().collect(),
            total: segments.len(),
            current_timer: None,
            generation,
        });

        if let Some(stale) = stale {
            info!(old = %stale.regimen_name, new = %name, "replacing in-progress regimen");
            self.cancel_current(stale).await;
        }

        info!(regimen = %name, segments = segments.len(), "regimen started");
        self.inner
            .output
            .emit(&format!("Started regimen: {}", name));
        self.start_next_timer(generation).await;
    }

    /// Remove a stored regimen. A run of it already in progress continues.
    pub async fn delete_regimen(&self, name: &str) -> bool {
        let removed = self.inner.store.lock().await.remove(name);

        if removed {
            info!(regimen = %name, "regimen deleted");
            self.inner
                .output
                .emit(&format!("Deleted regimen '{}'", name));
        } else {
            self.inner
                .output
                .emit(&format!("Regimen '{}' not found", name));
        }
        removed
    }

    /// End the run in progress, cancelling its in-flight timer. Pending
    /// advances of the run are dropped with it.
    pub async fn stop_regimen(&self) -> bool {
        let Some(run) = self.inner.run.lock().await.take() else {
            debug!("no regimen to stop");
            return false;
        };

        info!(regimen = %run.regimen_name, "regimen stopped");
        self.inner
            .output
            .emit(&format!("Stopping regimen '{}'", run.regimen_name));
        self.cancel_current(run).await;
        true
    }

    /// Completion hook for every timer. Segments of the active run schedule
    /// the next segment after the advance delay; other timers are ignored.
    pub async fn on_timer_complete(&self, timer_name: &str) {
        let generation = {
            let run = self.inner.run.lock().await;
            let Some(run) = run.as_ref() else {
                return;
            };
            if !run.owns(timer_name) {
                debug!(timer = %timer_name, "completion is not part of the active regimen");
                return;
            }
            run.generation
        };

        let sequencer = self.clone();
        let delay = self.inner.advance_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sequencer.start_next_timer(generation).await;
        });
    }

    /// Name of the regimen in progress
    pub async fn active_regimen(&self) -> Option<String> {
        self.inner
            .run
            .lock()
            .await
            .as_ref()
            .map(|run| run.regimen_name.clone())
    }

    /// Name and progress of the regimen in progress
    pub async fn regimen_status(&self) -> Option<RegimenStatus> {
        self.inner.run.lock().await.as_ref().map(|run| RegimenStatus {
            name: run.regimen_name.clone(),
            remaining: run.remaining.len(),
            total: run.total,
        })
    }

    async fn cancel_current(&self, run: RegimenRun) {
        if let Some(timer_name) = run.current_timer {
            if let Err(e) = self.inner.timers.cancel_timer(&timer_name).await {
                debug!(timer = %timer_name, ?e, "regimen timer already gone");
            }
        }
    }

    /// Launch the next segment of run `generation`, or finish the run
    async fn start_next_timer(&self, generation: u64) {
        let (regimen_name, timer_name, duration_seconds) = {
            let mut slot = self.inner.run.lock().await;
            let Some(run) = slot.as_mut().filter(|run| run.generation == generation) else {
                debug!(generation, "regimen run superseded, not advancing");
                return;
            };

            let Some(next) = run.remaining.pop_front() else {
                let regimen_name = run.regimen_name.clone();
                *slot = None;
                drop(slot);

                info!(regimen = %regimen_name, "regimen complete");
                self.inner
                    .output
                    .emit(&format!("Regimen '{}' completed!", regimen_name));
                return;
            };

            let timer_name = format!("{}_{}", run.regimen_name, next.name);
            run.current_timer = Some(timer_name.clone());
            (run.regimen_name.clone(), timer_name, next.duration_seconds)
        };

        self.inner.output.emit(&format!(
            "Starting regimen timer: {} ({}s)",
            timer_name, duration_seconds
        ));

        if let Err(e) = self
            .inner
            .timers
            .create_timer(&timer_name, duration_seconds)
            .await
        {
            warn!(regimen = %regimen_name, timer = %timer_name, ?e, "failed to start regimen timer");
            self.inner.output.emit(&format!("Error: {}", e));

            let mut slot = self.inner.run.lock().await;
            if slot.as_ref().is_some_and(|run| run.generation == generation) {
                *slot = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::output::CapturedOutput;
    use crate::timer::TimerError;

    const DELAY: Duration = Duration::from_millis(20);

    #[derive(Default)]
    struct RecordingTimers {
        created: std::sync::Mutex<Vec<(String, u64)>>,
        cancelled: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingTimers {
        fn created(&self) -> Vec<(String, u64)> {
            self.created.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TimerService for RecordingTimers {
        async fn create_timer(&self, name: &str, duration_seconds: u64) -> Result<(), TimerError> {
            self.created
                .lock()
                .unwrap()
                .push((name.to_string(), duration_seconds));
            Ok(())
        }

        async fn cancel_timer(&self, name: &str) -> Result<(), TimerError> {
            self.cancelled.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    struct RefusingTimers;

    #[async_trait]
    impl TimerService for RefusingTimers {
        async fn create_timer(&self, name: &str, _duration_seconds: u64) -> Result<(), TimerError> {
            Err(TimerError::AlreadyExists(name.to_string()))
        }

        async fn cancel_timer(&self, name: &str) -> Result<(), TimerError> {
            Err(TimerError::NotFound(name.to_string()))
        }
    }

    fn sequencer(
        dir: &tempfile::TempDir,
        timers: Arc<dyn TimerService>,
    ) -> (RegimenSequencer, Arc<CapturedOutput>) {
        let output = Arc::new(CapturedOutput::default());
        let store = RegimenStore::new(&dir.path().join("regimens.json"));
        let sequencer = RegimenSequencer::new(
            store,
            timers,
            DELAY,
            Some(output.clone() as Arc<dyn OutputSink>),
        );
        (sequencer, output)
    }

    fn w_segments() -> Vec<TimerSpec> {
        vec![TimerSpec::new("a", 10), TimerSpec::new("b", 20)]
    }

    fn created(name: &str, duration: u64) -> (String, u64) {
        (name.to_string(), duration)
    }

    #[tokio::test]
    async fn test_runs_segments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let timers = Arc::new(RecordingTimers::default());
        let (sequencer, output) = sequencer(&dir, timers.clone());
        sequencer.create_regimen("w", w_segments()).await;

        sequencer.run_regimen("w").await;
        assert_eq!(timers.created(), vec![created("w_a", 10)]);
        assert_eq!(sequencer.active_regimen().await.as_deref(), Some("w"));

        sequencer.on_timer_complete("w_a").await;
        // Nothing happens until the advance delay has passed.
        assert_eq!(timers.created().len(), 1);
        tokio::time::sleep(DELAY * 4).await;
        assert_eq!(
            timers.created(),
            vec![created("w_a", 10), created("w_b", 20)]
        );
        assert_eq!(sequencer.active_regimen().await.as_deref(), Some("w"));

        sequencer.on_timer_complete("w_b").await;
        tokio::time::sleep(DELAY * 4).await;
        assert_eq!(timers.created().len(), 2);
        assert!(sequencer.active_regimen().await.is_none());
        assert!(output.contains("Regimen 'w' completed!"));
    }

    #[tokio::test]
    async fn test_unrelated_completion_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let timers = Arc::new(RecordingTimers::default());
        let (sequencer, _) = sequencer(&dir, timers.clone());
        sequencer.create_regimen("w", w_segments()).await;
        sequencer.run_regimen("w").await;

        sequencer.on_timer_complete("standalone").await;
        sequencer.on_timer_complete("wx_a").await;
        tokio::time::sleep(DELAY * 4).await;

        assert_eq!(timers.created(), vec![created("w_a", 10)]);
        assert_eq!(sequencer.active_regimen().await.as_deref(), Some("w"));
    }

    #[tokio::test]
    async fn test_completion_without_run_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let timers = Arc::new(RecordingTimers::default());
        let (sequencer, _) = sequencer(&dir, timers.clone());

        sequencer.on_timer_complete("w_a").await;
        tokio::time::sleep(DELAY * 2).await;
        assert!(timers.created().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_faults_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let timers = Arc::new(RecordingTimers::default());
        let (sequencer, output) = sequencer(&dir, timers.clone());
        sequencer.create_regimen("empty", vec![]).await;

        sequencer.run_regimen("missing").await;
        sequencer.run_regimen("empty").await;

        assert!(output.contains("Regimen 'missing' not found"));
        assert!(output.contains("Regimen 'empty' is empty"));
        assert!(timers.created().is_empty());
        assert!(sequencer.active_regimen().await.is_none());
    }

    #[tokio::test]
    async fn test_new_run_replaces_and_cancels_old() {
        let dir = tempfile::tempdir().unwrap();
        let timers = Arc::new(RecordingTimers::default());
        let (sequencer, _) = sequencer(&dir, timers.clone());
        sequencer.create_regimen("w", w_segments()).await;
        sequencer
            .create_regimen("stretch", vec![TimerSpec::new("neck", 30)])
            .await;

        sequencer.run_regimen("w").await;
        sequencer.on_timer_complete("w_a").await;
        sequencer.run_regimen("stretch").await;
        tokio::time::sleep(DELAY * 4).await;

        // The pending advance of "w" was dropped with the old run.
        assert_eq!(
            timers.created(),
            vec![created("w_a", 10), created("stretch_neck", 30)]
        );
        assert_eq!(*timers.cancelled.lock().unwrap(), vec!["w_a".to_string()]);
        assert_eq!(
            sequencer.active_regimen().await.as_deref(),
            Some("stretch")
        );
    }

    #[tokio::test]
    async fn test_failed_launch_ends_run() {
        let dir = tempfile::tempdir().unwrap();
        let (sequencer, output) = sequencer(&dir, Arc::new(RefusingTimers));
        sequencer.create_regimen("w", w_segments()).await;

        sequencer.run_regimen("w").await;
        assert!(output.contains("Error: Timer 'w_a' already exists"));
        assert!(sequencer.active_regimen().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_cancels_timer_and_pending_advance() {
        let dir = tempfile::tempdir().unwrap();
        let timers = Arc::new(RecordingTimers::default());
        let (sequencer, output) = sequencer(&dir, timers.clone());
        sequencer.create_regimen("w", w_segments()).await;

        assert!(!sequencer.stop_regimen().await);
        assert!(!output.contains("Stopping regimen"));

        sequencer.run_regimen("w").await;
        sequencer.on_timer_complete("w_a").await;
        assert!(sequencer.stop_regimen().await);
        tokio::time::sleep(DELAY * 4).await;

        assert!(output.contains("Stopping regimen 'w'"));
        assert_eq!(timers.created(), vec![created("w_a", 10)]);
        assert_eq!(*timers.cancelled.lock().unwrap(), vec!["w_a".to_string()]);
        assert!(sequencer.active_regimen().await.is_none());
        assert!(!output.contains("Regimen 'w' completed!"));
    }

    #[tokio::test]
    async fn test_status_tracks_progress() {
        let dir = tempfile::tempdir().unwrap();
        let timers = Arc::new(RecordingTimers::default());
        let (sequencer, _) = sequencer(&dir, timers.clone());
        sequencer.create_regimen("w", w_segments()).await;
        assert!(sequencer.regimen_status().await.is_none());

        sequencer.run_regimen("w").await;
        let status = sequencer.regimen_status().await.unwrap();
        assert_eq!(
            status,
            RegimenStatus {
                name: "w".to_string(),
                remaining: 1,
                total: 2,
            }
        );

        sequencer.on_timer_complete("w_a").await;
        tokio::time::sleep(DELAY * 4).await;
        assert_eq!(sequencer.regimen_status().await.unwrap().remaining, 0);
    }

    #[tokio::test]
    async fn test_delete_regimen() {
        let dir = tempfile::tempdir().unwrap();
        let timers = Arc::new(RecordingTimers::default());
        let (sequencer, output) = sequencer(&dir, timers.clone());
        sequencer.create_regimen("w", w_segments()).await;

        assert!(sequencer.delete_regimen("w").await);
        assert!(!sequencer.delete_regimen("w").await);
        assert!(output.contains("Deleted regimen 'w'"));
        assert!(output.contains("Regimen 'w' not found"));
        assert!(sequencer.regimen_table().await.is_empty());

        sequencer.run_regimen("w").await;
        assert!(timers.created().is_empty());
    }

    #[tokio::test]
    async fn test_list_regimens() {
        let dir = tempfile::tempdir().unwrap();
        let (sequencer, output) = sequencer(&dir, Arc::new(RecordingTimers::default()));

        assert!(sequencer.regimen_table().await.is_empty());
        assert!(sequencer.list_regimens().await.is_empty());
        assert!(output.contains("No regimens available"));

        sequencer.create_regimen("w", w_segments()).await;
        let table = sequencer.list_regimens().await;
        assert_eq!(table.len(), 1);
        assert!(output.contains("Created regimen 'w' with 2 timer(s)"));
        assert!(output.contains("- w: a (10s), b (20s)"));
    }
}
