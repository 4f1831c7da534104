//! Speech synthesizer abstraction
//!
//! Provides a uniform interface over the engine families. The orchestrator
//! only ever sees `Box<dyn Synth>`; which program runs behind it is decided
//! once, when the engine is created.

use super::backends::{espeak::EspeakSynth, pico::PicoSynth, piper::PiperSynth};
use super::{EngineConfig, EngineKind, EngineSettings};
use crate::audio::AudioSegment;
use crate::platform::find_program;
use crate::{DocvoxError, Result};
use log::{debug, info};

/// Speech synthesizer trait
///
/// One instance serves one worker; instances are never shared across
/// threads, only moved.
pub trait Synth: Send {
    /// Engine family of this synthesizer
    fn kind(&self) -> EngineKind;

    /// Check that the configured voice can be used
    ///
    /// Called once per distinct configuration before any segment is
    /// synthesized. Fails with `InvalidVoiceModel` for unknown voices.
    fn validate(&self, config: &EngineConfig) -> Result<()>;

    /// Synthesize one segment of text
    ///
    /// No state is carried between calls, so a failed call can simply be
    /// repeated.
    fn synthesize(&mut self, text: &str, config: &EngineConfig) -> Result<AudioSegment>;
}

/// Creates engines for workers
pub trait EngineFactory: Sync {
    fn create(&self, kind: EngineKind) -> Result<Box<dyn Synth>>;
}

impl<F> EngineFactory for F
where
    F: Fn(EngineKind) -> Result<Box<dyn Synth>> + Sync,
{
    fn create(&self, kind: EngineKind) -> Result<Box<dyn Synth>> {
        self(kind)
    }
}

/// Factory for the installed engine programs
#[derive(Debug, Clone, Default)]
pub struct SystemEngines {
    pub settings: EngineSettings,
}

impl SystemEngines {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

impl EngineFactory for SystemEngines {
    fn create(&self, kind: EngineKind) -> Result<Box<dyn Synth>> {
        create_synth(kind, &self.settings)
    }
}

/// Create a synthesizer for the given engine family
///
/// Fails with `EngineUnavailable` when the engine's program cannot be
/// located, with a hint on how to install it.
pub fn create_synth(kind: EngineKind, settings: &EngineSettings) -> Result<Box<dyn Synth>> {
    let name = settings.binary(kind);
    debug!("Looking for {} engine program '{}'", kind, name);

    let program = find_program(name).ok_or_else(|| {
        let hint = match kind {
            EngineKind::Piper => "see https://github.com/rhasspy/piper for releases",
            EngineKind::Pico => "install with: sudo apt install libttspico-utils",
            EngineKind::Espeak => "install with: sudo apt install espeak-ng",
        };
        DocvoxError::EngineUnavailable(format!("{} program '{}' not found; {}", kind, name, hint))
    })?;

    info!("Using {} engine at {:?}", kind, program);

    let synth: Box<dyn Synth> = match kind {
        EngineKind::Piper => Box::new(PiperSynth::new(
            program,
            settings.models_dir.clone(),
            settings.timeout,
        )),
        EngineKind::Pico => Box::new(PicoSynth::new(program, settings.timeout)),
        EngineKind::Espeak => Box::new(EspeakSynth::new(program, settings.timeout)),
    };
    Ok(synth)
}
