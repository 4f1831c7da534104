//! SVOX Pico backend
//!
//! `pico2wave -l <lang> -w <out.wav> -- <text>`. Output is always 16 kHz
//! mono; the exporter resamples it to the job rate.

use super::synthesize_to_wav;
use crate::audio::AudioSegment;
use crate::speech::voices::check_pico_voice;
use crate::speech::{EngineConfig, EngineKind, Synth};
use crate::Result;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

pub struct PicoSynth {
    program: PathBuf,
    timeout: Duration,
}

impl PicoSynth {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }
}

impl Synth for PicoSynth {
    fn kind(&self) -> EngineKind {
        EngineKind::Pico
    }

    fn validate(&self, config: &EngineConfig) -> Result<()> {
        check_pico_voice(config.voice_or_default())
    }

    fn synthesize(&mut self, text: &str, config: &EngineConfig) -> Result<AudioSegment> {
        let lang = config.voice_or_default();
        check_pico_voice(lang)?;

        // Text goes on the command line, so no newlines
        let text = text.replace(['\r', '\n'], " ");

        synthesize_to_wav(EngineKind::Pico, None, self.timeout, |out| {
            let mut cmd = Command::new(&self.program);
            cmd.arg("-l").arg(lang).arg("-w").arg(out).arg("--").arg(&text);
            cmd
        })
    }
}
