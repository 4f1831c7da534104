//! Speech synthesis engines
//!
//! Each engine family is one [`Synth`] implementation driving an external
//! program. Engines are created per worker through an [`EngineFactory`], so
//! no engine state is shared between threads or jobs.

pub mod backends;
pub mod synth;
pub mod voices;

pub use synth::{create_synth, EngineFactory, Synth, SystemEngines};
pub use voices::{PiperVoice, VoiceStore};

use crate::text::VoiceOverride;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Engine families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Neural engine driven by ONNX voice models
    Piper,
    /// SVOX Pico, fixed 16 kHz, no models
    Pico,
    /// eSpeak-NG formant synthesizer
    Espeak,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [EngineKind::Piper, EngineKind::Pico, EngineKind::Espeak];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Piper => "piper",
            EngineKind::Pico => "pico",
            EngineKind::Espeak => "espeak",
        }
    }

    /// Voice used when none is configured
    pub fn default_voice(&self) -> &'static str {
        match self {
            EngineKind::Piper => voices::DEFAULT_PIPER_VOICE,
            EngineKind::Pico => "es-ES",
            EngineKind::Espeak => "es",
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "piper" => Ok(EngineKind::Piper),
            "pico" | "pico2wave" | "svox" => Ok(EngineKind::Pico),
            "espeak" | "espeak-ng" => Ok(EngineKind::Espeak),
            other => Err(format!(
                "unknown engine '{}' (expected piper, pico or espeak)",
                other
            )),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine, voice and output format of one synthesis
///
/// Fixed for the duration of a job. Per-segment overrides produce derived
/// copies through [`EngineConfig::with_override`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineConfig {
    pub engine: EngineKind,

    /// Voice reference; `None` means the engine default
    pub voice: Option<String>,

    /// Declared output rate, all segments are conformed to it
    pub sample_rate: u32,

    pub channels: u16,
}

impl EngineConfig {
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            voice: None,
            sample_rate: 22050,
            channels: 1,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Voice reference with the engine default filled in
    pub fn voice_or_default(&self) -> &str {
        match self.voice.as_deref() {
            Some(v) if !v.trim().is_empty() => v,
            _ => self.engine.default_voice(),
        }
    }

    /// Effective config for a segment carrying an override
    ///
    /// Switching engine drops the job voice, since voice names are not
    /// portable between engines.
    pub fn with_override(&self, over: Option<&VoiceOverride>) -> Self {
        let Some(over) = over else {
            return self.clone();
        };

        let mut config = self.clone();
        if let Some(engine) = over.engine {
            if engine != config.engine {
                config.engine = engine;
                config.voice = None;
            }
        }
        if let Some(voice) = &over.voice {
            config.voice = Some(voice.clone());
        }
        config
    }
}

/// Where engine programs and models live
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub piper_binary: String,
    pub pico_binary: String,
    pub espeak_binary: String,

    /// Piper voice model store
    pub models_dir: PathBuf,

    /// Bounded wait for one engine call
    pub timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            piper_binary: "piper".to_string(),
            pico_binary: "pico2wave".to_string(),
            espeak_binary: "espeak-ng".to_string(),
            models_dir: voices::default_models_dir(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl EngineSettings {
    /// Program configured for an engine
    pub fn binary(&self, kind: EngineKind) -> &str {
        match kind {
            EngineKind::Piper => &self.piper_binary,
            EngineKind::Pico => &self.pico_binary,
            EngineKind::Espeak => &self.espeak_binary,
        }
    }
}
