//! Engine backends
//!
//! Every backend runs its program once per segment, writing to a temporary
//! WAV file that is decoded and then removed.

// Piper neural voices (ONNX models)
pub mod piper;

// SVOX Pico via pico2wave
pub mod pico;

// eSpeak-NG
pub mod espeak;

use super::EngineKind;
use crate::audio::AudioSegment;
use crate::process::run_with_timeout;
use crate::{DocvoxError, Result};
use log::debug;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Run one engine invocation and decode the WAV it writes
///
/// `build` receives the output path and returns the command to run; `input`
/// is fed on stdin when given. A missing program is `EngineUnavailable`,
/// anything else that goes wrong is a retryable synthesis error.
pub(crate) fn synthesize_to_wav<F>(
    kind: EngineKind,
    input: Option<&str>,
    timeout: Duration,
    build: F,
) -> Result<AudioSegment>
where
    F: FnOnce(&Path) -> Command,
{
    let output = tempfile::Builder::new()
        .prefix("docvox-")
        .suffix(".wav")
        .tempfile()?;

    let mut cmd = build(output.path());
    run_with_timeout(&mut cmd, input, timeout).map_err(|e| {
        if e.is_not_found() {
            DocvoxError::EngineUnavailable(format!("{}: {}", kind, e))
        } else {
            DocvoxError::synthesis(format!("{} {}", kind, e))
        }
    })?;

    let audio = AudioSegment::read_wav(output.path())
        .map_err(|e| DocvoxError::synthesis(format!("{} wrote unreadable audio: {}", kind, e)))?;

    if audio.is_empty() {
        return Err(DocvoxError::synthesis(format!("{} produced no audio", kind)));
    }

    debug!(
        "{} produced {:.2}s of audio",
        kind,
        audio.duration().as_secs_f32()
    );
    Ok(audio)
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    //! Shell scripts standing in for engine programs

    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write a 16 kHz mono WAV of `frames` samples
    pub fn fixture_wav(path: &Path, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample(((i % 64) as i16 - 32) * 100).unwrap();
        }
        writer.finalize().unwrap();
    }

    /// Executable script with the given body
    pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}
