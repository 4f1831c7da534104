//! eSpeak-NG backend
//!
//! Writes WAV with `-w` and reads the text from stdin.

use super::synthesize_to_wav;
use crate::audio::AudioSegment;
use crate::speech::voices::check_espeak_voice;
use crate::speech::{EngineConfig, EngineKind, Synth};
use crate::Result;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

pub struct EspeakSynth {
    program: PathBuf,
    timeout: Duration,
}

impl EspeakSynth {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }
}

impl Synth for EspeakSynth {
    fn kind(&self) -> EngineKind {
        EngineKind::Espeak
    }

    fn validate(&self, config: &EngineConfig) -> Result<()> {
        check_espeak_voice(config.voice_or_default())
    }

    fn synthesize(&mut self, text: &str, config: &EngineConfig) -> Result<AudioSegment> {
        let voice = config.voice_or_default();
        check_espeak_voice(voice)?;

        synthesize_to_wav(EngineKind::Espeak, Some(text), self.timeout, |out| {
            let mut cmd = Command::new(&self.program);
            cmd.arg("-v").arg(voice).arg("-w").arg(out).arg("--stdin");
            cmd
        })
    }
}
