//! Output sinks for human-facing text
//!
//! Every component writes its user-visible messages through an
//! [`OutputSink`]. The default is a direct console write; the daemon swaps in
//! [`EventOutput`] so messages also reach subscribed IPC clients.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::events::DaemonEvent;

/// Destination for human-facing text
pub trait OutputSink: Send + Sync {
    fn emit(&self, message: &str);
}

/// Writes each message straight to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOutput;

impl OutputSink for ConsoleOutput {
    fn emit(&self, message: &str) {
        println!("{}", message);
    }
}

/// Publishes each message as a [`DaemonEvent::Output`]
#[derive(Debug, Clone)]
pub struct EventOutput {
    event_tx: broadcast::Sender<DaemonEvent>,
}

impl EventOutput {
    pub fn new(event_tx: broadcast::Sender<DaemonEvent>) -> Self {
        Self { event_tx }
    }
}

impl OutputSink for EventOutput {
    fn emit(&self, message: &str) {
        trace!(message, "publishing output");
        // No receivers is fine: nobody is listening yet.
        let _ = self.event_tx.send(DaemonEvent::Output {
            message: message.to_string(),
        });
    }
}

/// Resolve an optional sink to the console default
pub fn or_console(sink: Option<Arc<dyn OutputSink>>) -> Arc<dyn OutputSink> {
    sink.unwrap_or_else(|| Arc::new(ConsoleOutput))
}

/// Sink that records messages for assertions
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CapturedOutput {
    lines: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl CapturedOutput {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

#[cfg(test)]
impl OutputSink for CapturedOutput {
    fn emit(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_output_publishes() {
        let (tx, mut rx) = broadcast::channel(4);
        let sink = EventOutput::new(tx);
        sink.emit("hello");

        let event = rx.try_recv().unwrap();
        assert_eq!(
            event,
            DaemonEvent::Output {
                message: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_event_output_without_receivers() {
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        EventOutput::new(tx).emit("nobody listening");
    }

    #[test]
    fn test_captured_output() {
        let sink = CapturedOutput::default();
        sink.emit("one");
        sink.emit("two");
        assert_eq!(sink.lines(), vec!["one", "two"]);
        assert!(sink.contains("tw"));
    }
}
