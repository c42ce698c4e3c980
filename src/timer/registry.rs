//! In-process timer table
//!
//! Each running timer owns a countdown task. Tasks carry the generation
//! they were started with and exit as soon as the entry is removed, stopped
//! or restarted under a newer generation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::output::{or_console, OutputSink};

use super::{format_remaining, TimerError, TimerService};

/// Lifecycle of one timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Running,
    Paused,
    Stopped,
    Completed,
}

impl std::fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerStatus::Running => write!(f, "running"),
            TimerStatus::Paused => write!(f, "paused"),
            TimerStatus::Stopped => write!(f, "stopped"),
            TimerStatus::Completed => write!(f, "complete"),
        }
    }
}

struct TimerEntry {
    duration_seconds: u64,
    remaining: u64,
    status: TimerStatus,
    generation: u64,
}

struct Inner {
    timers: Mutex<HashMap<String, TimerEntry>>,
    completion_tx: mpsc::Sender<String>,
    output: Arc<dyn OutputSink>,
    tick: Duration,
    next_generation: AtomicU64,
}

/// Named countdown timers; completions are sent on the completion channel
#[derive(Clone)]
pub struct TimerRegistry {
    inner: Arc<Inner>,
}

impl TimerRegistry {
    /// Create a registry counting down one unit per `tick`
    pub fn new(
        completion_tx: mpsc::Sender<String>,
        tick: Duration,
        output: Option<Arc<dyn OutputSink>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                timers: Mutex::new(HashMap::new()),
                completion_tx,
                output: or_console(output),
                tick,
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Create and start a timer. A finished or stopped timer of the same
    /// name is restarted with the new duration.
    pub async fn create(&self, name: &str, duration_seconds: u64) -> Result<(), TimerError> {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut timers = self.inner.timers.lock().await;

        let message = match timers.get_mut(name) {
            Some(entry) if matches!(entry.status, TimerStatus::Running | TimerStatus::Paused) => {
                return Err(TimerError::AlreadyExists(name.to_string()));
            }
            Some(entry) => {
                entry.duration_seconds = duration_seconds;
                entry.remaining = duration_seconds;
                entry.status = TimerStatus::Running;
                entry.generation = generation;
                format!(
                    "Refreshed timer '{}' ({})",
                    name,
                    format_remaining(duration_seconds)
                )
            }
            None => {
                timers.insert(
                    name.to_string(),
                    TimerEntry {
                        duration_seconds,
                        remaining: duration_seconds,
                        status: TimerStatus::Running,
                        generation,
                    },
                );
                format!(
                    "Created timer '{}' ({})",
                    name,
                    format_remaining(duration_seconds)
                )
            }
        };

        tokio::spawn(run_countdown(
            Arc::clone(&self.inner),
            name.to_string(),
            generation,
        ));
        drop(timers);

        info!(timer = %name, duration_seconds, "timer started");
        self.inner.output.emit(&message);
        Ok(())
    }

    pub async fn pause(&self, name: &str) -> Result<(), TimerError> {
        let mut timers = self.inner.timers.lock().await;
        let entry = timers
            .get_mut(name)
            .ok_or_else(|| TimerError::NotFound(name.to_string()))?;

        let message = if entry.status == TimerStatus::Running {
            entry.status = TimerStatus::Paused;
            info!(timer = %name, remaining = entry.remaining, "timer paused");
            format!(
                "Paused timer '{}' ({} left)",
                name,
                format_remaining(entry.remaining)
            )
        } else {
            format!("Timer '{}' is not running", name)
        };
        drop(timers);

        self.inner.output.emit(&message);
        Ok(())
    }

    pub async fn resume(&self, name: &str) -> Result<(), TimerError> {
        let mut timers = self.inner.timers.lock().await;
        let entry = timers
            .get_mut(name)
            .ok_or_else(|| TimerError::NotFound(name.to_string()))?;

        let message = match entry.status {
            TimerStatus::Paused => {
                entry.status = TimerStatus::Running;
                info!(timer = %name, remaining = entry.remaining, "timer resumed");
                format!(
                    "Resumed timer '{}' ({} left)",
                    name,
                    format_remaining(entry.remaining)
                )
            }
            TimerStatus::Running => format!("Timer '{}' is already running", name),
            TimerStatus::Stopped | TimerStatus::Completed => {
                format!("Timer '{}' is not running", name)
            }
        };
        drop(timers);

        self.inner.output.emit(&message);
        Ok(())
    }

    /// Halt a timer and reset it to its full duration
    pub async fn stop(&self, name: &str) -> Result<(), TimerError> {
        let mut timers = self.inner.timers.lock().await;
        let entry = timers
            .get_mut(name)
            .ok_or_else(|| TimerError::NotFound(name.to_string()))?;

        entry.status = TimerStatus::Stopped;
        entry.remaining = entry.duration_seconds;
        drop(timers);

        info!(timer = %name, "timer stopped");
        self.inner.output.emit(&format!("Stopped timer '{}'", name));
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), TimerError> {
        if self.inner.timers.lock().await.remove(name).is_none() {
            return Err(TimerError::NotFound(name.to_string()));
        }

        info!(timer = %name, "timer deleted");
        self.inner.output.emit(&format!("Deleted timer '{}'", name));
        Ok(())
    }

    /// Emit one line per timer
    pub async fn list(&self) {
        let lines: Vec<String> = {
            let timers = self.inner.timers.lock().await;
            let mut names: Vec<&String> = timers.keys().collect();
            names.sort();
            names
                .into_iter()
                .filter_map(|name| {
                    timers.get(name).map(|entry| {
                        format!(
                            "[{}]: {} ({})",
                            name,
                            format_remaining(entry.remaining),
                            entry.status
                        )
                    })
                })
                .collect()
        };

        if lines.is_empty() {
            self.inner.output.emit("No active timers");
            return;
        }
        for line in lines {
            self.inner.output.emit(&line);
        }
    }

    /// Remove every timer; returns the removed names
    pub async fn clear_all(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .timers
            .lock()
            .await
            .drain()
            .map(|(name, _)| name)
            .collect();
        names.sort();

        if names.is_empty() {
            self.inner.output.emit("No timers to clear");
        } else {
            info!(count = names.len(), "timers cleared");
            self.inner.output.emit(&format!(
                "Cleared {} timer(s): {}",
                names.len(),
                names.join(", ")
            ));
        }
        names
    }

    /// Number of timers in the table
    pub async fn len(&self) -> usize {
        self.inner.timers.lock().await.len()
    }

    #[cfg(test)]
    async fn status(&self, name: &str) -> Option<(TimerStatus, u64)> {
        let timers = self.inner.timers.lock().await;
        timers.get(name).map(|entry| (entry.status, entry.remaining))
    }
}

#[async_trait]
impl TimerService for TimerRegistry {
    async fn create_timer(&self, name: &str, duration_seconds: u64) -> Result<(), TimerError> {
        self.create(name, duration_seconds).await
    }

    async fn cancel_timer(&self, name: &str) -> Result<(), TimerError> {
        if self.inner.timers.lock().await.remove(name).is_none() {
            return Err(TimerError::NotFound(name.to_string()));
        }
        info!(timer = %name, "timer cancelled");
        Ok(())
    }
}

async fn run_countdown(inner: Arc<Inner>, name: String, generation: u64) {
    let mut ticker = tokio::time::interval(inner.tick);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let mut timers = inner.timers.lock().await;
        let Some(entry) = timers.get_mut(&name) else {
            debug!(timer = %name, "countdown ended: timer removed");
            return;
        };
        if entry.generation != generation {
            return;
        }
        match entry.status {
            TimerStatus::Running => {}
            TimerStatus::Paused => continue,
            TimerStatus::Stopped | TimerStatus::Completed => return,
        }

        entry.remaining = entry.remaining.saturating_sub(1);
        if entry.remaining > 0 {
            continue;
        }

        entry.status = TimerStatus::Completed;
        drop(timers);

        info!(timer = %name, "timer complete");
        inner.output.emit(&format!("[{}]: Complete!", name));
        if inner.completion_tx.send(name.clone()).await.is_err() {
            warn!(timer = %name, "completion channel closed");
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CapturedOutput;

    const TICK: Duration = Duration::from_millis(10);

    fn registry() -> (TimerRegistry, mpsc::Receiver<String>, Arc<CapturedOutput>) {
        let (tx, rx) = mpsc::channel(8);
        let output = Arc::new(CapturedOutput::default());
        let registry = TimerRegistry::new(tx, TICK, Some(output.clone() as Arc<dyn OutputSink>));
        (registry, rx, output)
    }

    async fn next_completion(rx: &mut mpsc::Receiver<String>) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_timer_completes() {
        let (registry, mut rx, output) = registry();
        registry.create("tea", 3).await.unwrap();
        assert!(output.contains("Created timer 'tea' (3s)"));

        assert_eq!(next_completion(&mut rx).await.as_deref(), Some("tea"));
        assert_eq!(
            registry.status("tea").await,
            Some((TimerStatus::Completed, 0))
        );
        assert!(output.contains("[tea]: Complete!"));
    }

    #[tokio::test]
    async fn test_duplicate_create_fails_until_complete() {
        let (registry, mut rx, output) = registry();
        registry.create("tea", 2).await.unwrap();
        assert_eq!(
            registry.create("tea", 5).await,
            Err(TimerError::AlreadyExists("tea".to_string()))
        );

        next_completion(&mut rx).await.unwrap();
        registry.create("tea", 120).await.unwrap();
        assert!(output.contains("Refreshed timer 'tea' (2m)"));
        assert_eq!(
            registry.status("tea").await,
            Some((TimerStatus::Running, 120))
        );
    }

    #[tokio::test]
    async fn test_pause_holds_countdown() {
        let (registry, mut rx, output) = registry();
        registry.create("tea", 5).await.unwrap();
        registry.pause("tea").await.unwrap();
        let (_, held) = registry.status("tea").await.unwrap();

        tokio::time::sleep(TICK * 10).await;
        assert_eq!(
            registry.status("tea").await,
            Some((TimerStatus::Paused, held))
        );

        registry.pause("tea").await.unwrap();
        assert!(output.contains("Timer 'tea' is not running"));

        registry.resume("tea").await.unwrap();
        assert_eq!(next_completion(&mut rx).await.as_deref(), Some("tea"));
    }

    #[tokio::test]
    async fn test_stop_resets_and_halts() {
        let (registry, mut rx, _) = registry();
        registry.create("tea", 3).await.unwrap();
        registry.stop("tea").await.unwrap();

        tokio::time::sleep(TICK * 6).await;
        assert_eq!(
            registry.status("tea").await,
            Some((TimerStatus::Stopped, 3))
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_names() {
        let (registry, _rx, _) = registry();
        let missing = Err(TimerError::NotFound("ghost".to_string()));
        assert_eq!(registry.pause("ghost").await, missing);
        assert_eq!(registry.resume("ghost").await, missing);
        assert_eq!(registry.stop("ghost").await, missing);
        assert_eq!(registry.delete("ghost").await, missing);
        assert_eq!(registry.cancel_timer("ghost").await, missing);
    }

    #[tokio::test]
    async fn test_delete_stops_countdown() {
        let (registry, mut rx, output) = registry();
        registry.create("tea", 2).await.unwrap();
        registry.delete("tea").await.unwrap();
        assert!(output.contains("Deleted timer 'tea'"));

        tokio::time::sleep(TICK * 5).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_list_and_clear() {
        let (registry, _rx, output) = registry();
        registry.list().await;
        assert!(output.contains("No active timers"));

        registry.create("b", 600).await.unwrap();
        registry.create("a", 30).await.unwrap();
        registry.pause("b").await.unwrap();
        registry.list().await;
        assert!(output.contains("[a]: "));
        assert!(output.contains("(paused)"));

        assert_eq!(registry.clear_all().await, vec!["a", "b"]);
        assert!(output.contains("Cleared 2 timer(s): a, b"));
        registry.clear_all().await;
        assert!(output.contains("No timers to clear"));
    }
}
