//! Events module for daemon notifications
//!
//! Provides the structured event types published on the broadcast channel:
//! human-facing output lines and timer completions.

use serde::{Deserialize, Serialize};

/// Events published by the daemon to the console and subscribed IPC clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// A line of human-facing output
    Output {
        message: String,
    },

    /// A timer counted down to zero
    TimerCompleted {
        /// External name of the timer
        name: String,
    },
}

impl std::fmt::Display for DaemonEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonEvent::Output { message } => write!(f, "{}", message),
            DaemonEvent::TimerCompleted { name } => write!(f, "TIMER_COMPLETED ({})", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = DaemonEvent::TimerCompleted {
            name: "tea".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("timer_completed"));
        assert!(json.contains("tea"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"output","message":"hello"}"#;
        let event: DaemonEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            DaemonEvent::Output {
                message: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_event_display() {
        let event = DaemonEvent::TimerCompleted {
            name: "w_a".to_string(),
        };
        assert_eq!(event.to_string(), "TIMER_COMPLETED (w_a)");
    }
}
