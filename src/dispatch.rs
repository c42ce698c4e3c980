//! Command router
//!
//! Ties the interpreter to the timer table, the alert engine and the regimen
//! sequencer, and routes timer completions to alerts and regimens.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::alert::AlertEngine;
use crate::command::{interpret, Command};
use crate::events::DaemonEvent;
use crate::output::{or_console, OutputSink};
use crate::regimen::RegimenSequencer;
use crate::timer::{TimerError, TimerRegistry};

const NOT_UNDERSTOOD: &str = "I didn't understand that command. Try rephrasing or type 'help'.";

const HELP: &str = "\
Just type what you want in natural language:

Timer examples:
- \"set a 5 minute timer for coffee break\"
- \"start a 25 min pomodoro timer\"
- \"create 1 hour meeting timer\"
- \"pause the coffee timer\"
- \"show all timers\"
- \"stop meeting timer\"

Regimen examples:
- \"run workout regimen\"
- \"start pomodoro routine\"
- \"show regimens\"";

/// What became of one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Help,
    Executed(Command),
    NotUnderstood,
}

/// Executes interpreted commands
#[derive(Clone)]
pub struct Router {
    timers: TimerRegistry,
    alerts: AlertEngine,
    regimens: RegimenSequencer,
    output: Arc<dyn OutputSink>,
}

impl Router {
    pub fn new(
        timers: TimerRegistry,
        alerts: AlertEngine,
        regimens: RegimenSequencer,
        output: Option<Arc<dyn OutputSink>>,
    ) -> Self {
        Self {
            timers,
            alerts,
            regimens,
            output: or_console(output),
        }
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    pub fn alerts(&self) -> &AlertEngine {
        &self.alerts
    }

    pub fn regimens(&self) -> &RegimenSequencer {
        &self.regimens
    }

    /// Interpret one line of user text and act on it
    pub async fn handle_text(&self, text: &str) -> Handled {
        let text = text.trim();
        if text.eq_ignore_ascii_case("help") {
            self.output.emit(HELP);
            return Handled::Help;
        }

        let Some(command) = interpret(text) else {
            debug!(%text, "command not understood");
            self.output.emit(NOT_UNDERSTOOD);
            return Handled::NotUnderstood;
        };

        info!(%command, "executing command");
        if let Err(e) = self.execute(&command).await {
            self.output.emit(&format!("Error: {}", e));
        }
        Handled::Executed(command)
    }

    /// Run one command. Touching a timer silences its alert.
    pub async fn execute(&self, command: &Command) -> Result<(), TimerError> {
        match command {
            Command::Create {
                name,
                duration_seconds,
            } => {
                self.alerts.stop_alert(name).await;
                self.timers.create(name, *duration_seconds).await
            }
            Command::Pause { name } => {
                self.alerts.stop_alert(name).await;
                self.timers.pause(name).await
            }
            Command::Resume { name } => {
                self.alerts.stop_alert(name).await;
                self.timers.resume(name).await
            }
            Command::Stop { name } => {
                self.alerts.stop_alert(name).await;
                self.timers.stop(name).await
            }
            Command::Delete { name } => {
                self.alerts.stop_alert(name).await;
                self.timers.delete(name).await
            }
            Command::List => {
                self.timers.list().await;
                Ok(())
            }
            Command::ClearAll => {
                for name in self.timers.clear_all().await {
                    self.alerts.stop_alert(&name).await;
                }
                Ok(())
            }
            Command::RunRegimen { name } => {
                self.regimens.run_regimen(name).await;
                Ok(())
            }
            Command::ListRegimens => {
                self.regimens.list_regimens().await;
                Ok(())
            }
        }
    }

    /// Consume timer completions until the channel closes
    pub async fn run(
        &self,
        mut completions: mpsc::Receiver<String>,
        event_tx: broadcast::Sender<DaemonEvent>,
    ) {
        info!("completion router started");

        while let Some(name) = completions.recv().await {
            if event_tx
                .send(DaemonEvent::TimerCompleted { name: name.clone() })
                .is_err()
            {
                debug!(timer = %name, "no event subscribers");
            }
            self.alerts.start_alert(&name).await;
            self.regimens.on_timer_complete(&name).await;
        }

        warn!("completion channel closed");
    }
}
