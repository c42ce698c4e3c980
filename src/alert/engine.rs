//! Alert session engine
//!
//! One background worker per alerting timer repeats a pulse (tone or
//! terminal bell) until it is stopped or its timeout elapses. Cancellation
//! is cooperative: a stop flag checked once per loop iteration, so a stop
//! can lag by up to one pulse plus one interval. Stopping waits at most
//! [`JOIN_WAIT`] for the worker and cleans up either way; a worker still
//! mid-pulse at that point may emit one more pulse before it notices.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::output::{or_console, OutputSink};

use super::settings::{AudioSettings, AudioSettingsUpdate, SettingsStore};
use super::tone::{ToneDevice, ToneError};

/// How long `stop_alert` waits for a worker to exit
pub const JOIN_WAIT: Duration = Duration::from_millis(100);

/// ASCII bell, the textual pulse
const BELL: &str = "\u{7}";

struct AlertSession {
    id: u64,
    stop: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

struct Inner {
    sessions: Mutex<HashMap<String, AlertSession>>,
    settings: SettingsStore,
    tone: Option<Arc<dyn ToneDevice>>,
    output: Arc<dyn OutputSink>,
    next_id: AtomicU64,
}

/// Runs and cancels per-timer alert workers
#[derive(Clone)]
pub struct AlertEngine {
    inner: Arc<Inner>,
}

impl AlertEngine {
    /// Create an engine; without a tone device pulses are terminal bells,
    /// without a sink output goes to the console
    pub fn new(
        settings: SettingsStore,
        tone: Option<Arc<dyn ToneDevice>>,
        output: Option<Arc<dyn OutputSink>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(HashMap::new()),
                settings,
                tone,
                output: or_console(output),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Start alerting for `timer_name`, replacing any alert already running
    /// for it
    pub async fn start_alert(&self, timer_name: &str) {
        self.stop_alert(timer_name).await;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let stop = Arc::new(AtomicBool::new(false));

        // Spawn under the lock so the worker cannot try to forget itself
        // before it is registered.
        let mut sessions = self.inner.sessions.lock().await;
        let worker = tokio::spawn(run_worker(
            Arc::clone(&self.inner),
            timer_name.to_string(),
            id,
            Arc::clone(&stop),
        ));
        let replaced = sessions.insert(
            timer_name.to_string(),
            AlertSession {
                id,
                stop,
                worker,
            },
        );
        drop(sessions);

        if let Some(previous) = replaced {
            // A concurrent start won the race to register first.
            previous.stop.store(true, Ordering::SeqCst);
        }

        info!(timer = %timer_name, "alert started");
    }

    /// Stop the alert for `timer_name`; unknown names are ignored
    pub async fn stop_alert(&self, timer_name: &str) {
        let session = self.inner.sessions.lock().await.remove(timer_name);
        let Some(session) = session else {
            return;
        };

        session.stop.store(true, Ordering::SeqCst);
        if tokio::time::timeout(JOIN_WAIT, session.worker).await.is_err() {
            debug!(timer = %timer_name, "alert worker still finishing its pulse");
        }

        info!(timer = %timer_name, "alert stopped");
    }

    /// Stop every tracked alert
    pub async fn stop_all_alerts(&self) {
        let drained: Vec<(String, AlertSession)> =
            self.inner.sessions.lock().await.drain().collect();
        if drained.is_empty() {
            return;
        }

        for (_, session) in &drained {
            session.stop.store(true, Ordering::SeqCst);
        }
        for (timer_name, session) in drained {
            if tokio::time::timeout(JOIN_WAIT, session.worker).await.is_err() {
                debug!(timer = %timer_name, "alert worker still finishing its pulse");
            }
        }

        info!("all alerts stopped");
    }

    /// Change beep parameters; each provided field is clamped, then the
    /// whole object is saved
    pub async fn set_audio_settings(&self, update: &AudioSettingsUpdate) -> AudioSettings {
        self.inner.settings.update(update).await
    }

    pub async fn get_audio_settings(&self) -> AudioSettings {
        self.inner.settings.get().await
    }

    /// Emit a single pulse with the current settings
    pub async fn test_beep(&self) {
        let settings = self.inner.settings.get().await;
        if let Err(e) = self.inner.pulse(&settings).await {
            warn!(?e, "test beep failed");
            self.inner.output.emit(BELL);
        }
    }

    /// Names of timers that are currently alerting, sorted
    pub async fn active_alerts(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.sessions.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_alerting(&self, timer_name: &str) -> bool {
        self.inner.sessions.lock().await.contains_key(timer_name)
    }
}

impl Inner {
    /// One notification: a tone when a device is configured, else a bell
    async fn pulse(&self, settings: &AudioSettings) -> Result<(), ToneError> {
        let Some(device) = &self.tone else {
            self.output.emit(BELL);
            return Ok(());
        };

        let device = Arc::clone(device);
        let frequency_hz = settings.frequency_hz;
        let duration = settings.tone_duration();
        tokio::task::spawn_blocking(move || device.play(frequency_hz, duration))
            .await
            .map_err(|e| ToneError::Device(e.to_string()))?
    }

    /// Drop bookkeeping for a worker that ended on its own, unless the name
    /// has already been taken over by a newer session
    async fn forget(&self, timer_name: &str, id: u64) {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(timer_name).is_some_and(|session| session.id == id) {
            sessions.remove(timer_name);
        }
    }
}

async fn run_worker(inner: Arc<Inner>, timer_name: String, id: u64, stop: Arc<AtomicBool>) {
    let started = Instant::now();
    debug!(timer = %timer_name, id, "alert worker started");

    loop {
        // Settings are re-read so changes apply to running alerts.
        let settings = inner.settings.get().await;
        if stop.load(Ordering::SeqCst) || started.elapsed() >= settings.timeout() {
            break;
        }

        if let Err(e) = inner.pulse(&settings).await {
            warn!(timer = %timer_name, ?e, "alert pulse failed");
            inner
                .output
                .emit(&format!("{}\nTimer {} completed!", BELL, timer_name));
            inner.forget(&timer_name, id).await;
            return;
        }

        tokio::time::sleep(settings.interval()).await;
    }

    if !stop.load(Ordering::SeqCst) {
        info!(timer = %timer_name, "alert timed out");
        inner.forget(&timer_name, id).await;
    }

    debug!(timer = %timer_name, id, "alert worker exited");
}
