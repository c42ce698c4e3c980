//! Command module for free-text timer control
//!
//! Turns arbitrary text into a structured [`Command`]:
//! - vocab: keyword sets and time units
//! - numbers: spelled-out integers
//! - duration: ordered duration extractors
//! - interpreter: intent classification and name extraction

mod duration;
mod interpreter;
mod numbers;
mod vocab;

use serde::{Deserialize, Serialize};

pub use interpreter::interpret;

/// A structured timer command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Create and start a countdown
    Create { name: String, duration_seconds: u64 },

    Pause { name: String },

    Resume { name: String },

    Stop { name: String },

    Delete { name: String },

    /// Show every timer
    List,

    /// Remove every timer
    ClearAll,

    /// Launch a stored regimen
    RunRegimen { name: String },

    ListRegimens,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Create {
                name,
                duration_seconds,
            } => write!(f, "CREATE {} ({}s)", name, duration_seconds),
            Command::Pause { name } => write!(f, "PAUSE {}", name),
            Command::Resume { name } => write!(f, "RESUME {}", name),
            Command::Stop { name } => write!(f, "STOP {}", name),
            Command::Delete { name } => write!(f, "DELETE {}", name),
            Command::List => write!(f, "LIST"),
            Command::ClearAll => write!(f, "CLEAR_ALL"),
            Command::RunRegimen { name } => write!(f, "RUN_REGIMEN {}", name),
            Command::ListRegimens => write!(f, "LIST_REGIMENS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let command = Command::Create {
            name: "tea".to_string(),
            duration_seconds: 180,
        };
        let json = serde_json::to_string(&command).unwrap();
        assert!(json.contains(r#""type":"create""#));
        assert!(json.contains("180"));
    }

    #[test]
    fn test_command_deserialization() {
        let json = r#"{"type":"clear_all"}"#;
        let command: Command = serde_json::from_str(json).unwrap();
        assert_eq!(command, Command::ClearAll);
    }
}
