//! Piper backend
//!
//! Piper loads an ONNX voice model on every run and reads the text from
//! stdin:
//!
//! ```text
//! piper --model <voice.onnx> --config <voice.onnx.json> --output_file <out.wav>
//! ```
//!
//! The output rate follows the voice model (usually 22050 Hz).

use super::synthesize_to_wav;
use crate::audio::AudioSegment;
use crate::speech::voices::{PiperVoice, VoiceStore};
use crate::speech::{EngineConfig, EngineKind, Synth};
use crate::Result;
use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

pub struct PiperSynth {
    program: PathBuf,
    store: VoiceStore,
    timeout: Duration,

    /// Voices already resolved by this worker
    resolved: HashMap<String, PiperVoice>,
}

impl PiperSynth {
    pub fn new(program: PathBuf, models_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            program,
            store: VoiceStore::new(models_dir),
            timeout,
            resolved: HashMap::new(),
        }
    }

    fn voice(&mut self, reference: &str) -> Result<PiperVoice> {
        if let Some(voice) = self.resolved.get(reference) {
            return Ok(voice.clone());
        }
        let voice = self.store.resolve(reference)?;
        debug!("Piper voice '{}' -> {:?}", reference, voice.model);
        self.resolved.insert(reference.to_string(), voice.clone());
        Ok(voice)
    }
}

impl Synth for PiperSynth {
    fn kind(&self) -> EngineKind {
        EngineKind::Piper
    }

    fn validate(&self, config: &EngineConfig) -> Result<()> {
        self.store.resolve(config.voice_or_default()).map(|_| ())
    }

    fn synthesize(&mut self, text: &str, config: &EngineConfig) -> Result<AudioSegment> {
        let voice = self.voice(config.voice_or_default())?;
        let program = self.program.clone();

        // Piper reads one utterance per line
        let line = format!("{}\n", text.replace(['\r', '\n'], " "));

        synthesize_to_wav(EngineKind::Piper, Some(&line), self.timeout, |out| {
            let mut cmd = Command::new(&program);
            cmd.arg("--model")
                .arg(&voice.model)
                .arg("--config")
                .arg(&voice.config)
                .arg("--output_file")
                .arg(out);
            cmd
        })
    }
}
