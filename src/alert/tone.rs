//! Tone output for alert pulses
//!
//! Tone playback is a blocking call; the engine runs it on the blocking pool.
//! The default device synthesizes a sine tone on the system audio output.
//! An external `beep`-style program can be configured instead. Without any
//! device the engine falls back to a terminal bell.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use rodio::source::{SineWave, Source};
use rodio::{OutputStream, Sink};
use tracing::{debug, info};

/// Errors raised while playing a tone
#[derive(Debug, thiserror::Error)]
pub enum ToneError {
    #[error("failed to launch tone program: {0}")]
    Launch(#[from] std::io::Error),

    #[error("tone device failed: {0}")]
    Device(String),
}

/// Something that can play a tone of a given pitch and length
pub trait ToneDevice: Send + Sync {
    /// Play one tone, blocking until it finishes
    fn play(&self, frequency_hz: u32, duration: Duration) -> Result<(), ToneError>;
}

/// Gain applied to the synthesized tone
const TONE_VOLUME: f32 = 0.3;

/// Pick the tone device: the configured program if any, else the default
/// audio output, else none (terminal bell)
pub fn default_device(tone_command: Option<&Path>) -> Option<Arc<dyn ToneDevice>> {
    if let Some(program) = tone_command {
        info!(?program, "using external tone program");
        return Some(Arc::new(CommandTone::new(program)));
    }

    match SineTone::open_default() {
        Some(tone) => {
            info!("using default audio output for alert tones");
            Some(Arc::new(tone))
        }
        None => {
            info!("no audio output available, alerts use the terminal bell");
            None
        }
    }
}

/// One tone of `frequency_hz` lasting `duration`
fn tone_source(frequency_hz: u32, duration: Duration) -> impl Source<Item = f32> + Send {
    SineWave::new(frequency_hz as f32)
        .take_duration(duration)
        .amplify(TONE_VOLUME)
}

/// Sine tone on the default audio output
///
/// The output stream is opened per tone: it cannot cross threads, and tones
/// are played from the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct SineTone;

impl SineTone {
    /// `None` when the system has no usable audio output
    pub fn open_default() -> Option<Self> {
        match OutputStream::try_default() {
            Ok(_) => Some(Self),
            Err(e) => {
                debug!(?e, "no default audio output");
                None
            }
        }
    }
}

impl ToneDevice for SineTone {
    fn play(&self, frequency_hz: u32, duration: Duration) -> Result<(), ToneError> {
        let (_stream, handle) =
            OutputStream::try_default().map_err(|e| ToneError::Device(e.to_string()))?;
        let sink = Sink::try_new(&handle).map_err(|e| ToneError::Device(e.to_string()))?;

        sink.append(tone_source(frequency_hz, duration));
        sink.sleep_until_end();
        Ok(())
    }
}

/// Runs an external program as `<program> -f <hz> -l <ms>`
/// (the argument convention of the Linux `beep` utility)
#[derive(Debug, Clone)]
pub struct CommandTone {
    program: PathBuf,
}

impl CommandTone {
    pub fn new(program: &Path) -> Self {
        Self {
            program: program.to_owned(),
        }
    }
}

impl ToneDevice for CommandTone {
    fn play(&self, frequency_hz: u32, duration: Duration) -> Result<(), ToneError> {
        debug!(program = ?self.program, frequency_hz, "playing tone");

        let status = Command::new(&self.program)
            .arg("-f")
            .arg(frequency_hz.to_string())
            .arg("-l")
            .arg(duration.as_millis().to_string())
            .status()?;

        if status.success() {
            Ok(())
        } else {
            Err(ToneError::Device(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )))
        }
    }
}
