//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

/// Environment variable overriding the data directory
const DATA_DIR_ENV: &str = "TIMER_DAEMON_DATA_DIR";

/// Environment variable naming an external tone program
const TONE_COMMAND_ENV: &str = "TIMER_DAEMON_TONE_COMMAND";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Persisted audio settings document
    pub settings_path: PathBuf,

    /// Persisted regimen table
    pub regimens_path: PathBuf,

    /// Program invoked as `<program> -f <hz> -l <ms>` to play a tone
    pub tone_command: Option<PathBuf>,

    /// Pause between a regimen segment completing and the next one starting
    pub regimen_advance_delay: Duration,

    /// Countdown resolution of the timer registry
    pub timer_tick: Duration,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = std::env::var("HOME")?;
                PathBuf::from(&home)
                    .join(".local")
                    .join("share")
                    .join("timer-daemon")
            }
        };

        let tone_command = std::env::var_os(TONE_COMMAND_ENV)
            .filter(|program| !program.is_empty())
            .map(PathBuf::from);

        Ok(Self::with_data_dir(data_dir, tone_command))
    }

    /// Build a configuration rooted at `data_dir`
    pub fn with_data_dir(data_dir: PathBuf, tone_command: Option<PathBuf>) -> Self {
        Self {
            socket_path: data_dir.join("daemon.sock"),
            settings_path: data_dir.join("audio_settings.json"),
            regimens_path: data_dir.join("regimens.json"),
            data_dir,
            tone_command,
            regimen_advance_delay: Duration::from_secs(1),
            timer_tick: Duration::from_secs(1),
        }
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}
