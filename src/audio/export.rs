//! Audio assembly and export
//!
//! Segments are conformed to the declared format, concatenated in order and
//! written next to the target as a temporary file, then renamed into place.
//! A failed export never leaves anything at the target path.
//!
//! MP3 goes through an external transcoder (ffmpeg). The transcoder is
//! located before any audio is written; if it is missing the export fails
//! with `TranscodeUnavailable` and no file is created.

use super::convert::conform;
use super::{AudioFormat, AudioSegment};
use crate::platform::find_program;
use crate::process::{run_with_timeout, ProcessFailure};
use crate::{DocvoxError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use log::{debug, info, warn};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Export configuration
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Transcoder program name or path
    pub transcoder: String,

    /// ffmpeg VBR quality for MP3 (0 = best, 9 = smallest)
    pub mp3_quality: u8,

    /// Bounded wait for the transcoder
    pub timeout: Duration,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            transcoder: "ffmpeg".to_string(),
            mp3_quality: 0,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Concatenate segments into one stream in the declared format
pub fn assemble(segments: &[AudioSegment], sample_rate: u32, channels: u16) -> Result<AudioSegment> {
    if segments.is_empty() {
        return Err(DocvoxError::Assembly("no audio segments to assemble".to_string()));
    }
    if sample_rate == 0 || channels == 0 {
        return Err(DocvoxError::Assembly(format!(
            "invalid output format: {} Hz, {} channels",
            sample_rate, channels
        )));
    }

    let mut samples = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        if segment.sample_rate == 0 || segment.channels == 0 {
            return Err(DocvoxError::Assembly(format!(
                "segment {} has no valid format ({} Hz, {} channels)",
                i, segment.sample_rate, segment.channels
            )));
        }
        let conformed = conform(segment, sample_rate, channels);
        samples.extend_from_slice(&conformed.samples);
    }

    debug!(
        "Assembled {} segments into {} samples",
        segments.len(),
        samples.len()
    );
    Ok(AudioSegment::new(samples, sample_rate, channels))
}

/// Writes assembled audio to its final location
pub struct Exporter {
    settings: ExportSettings,
    sample_rate: u32,
    channels: u16,
}

impl Exporter {
    /// Exporter producing files at the given rate and channel count
    pub fn new(settings: ExportSettings, sample_rate: u32, channels: u16) -> Self {
        Self {
            settings,
            sample_rate,
            channels,
        }
    }

    /// Assemble `segments` and write them to `target` as `format`
    ///
    /// Borrowing the segments lets a caller retry the export (for example as
    /// WAV after a missing transcoder) without synthesizing again.
    pub fn export(&self, segments: &[AudioSegment], target: &Path, format: AudioFormat) -> Result<()> {
        // Locate the transcoder first so a missing one costs nothing
        let transcoder = match format {
            AudioFormat::Mp3 => Some(self.find_transcoder()?),
            AudioFormat::Wav => None,
        };

        let audio = assemble(segments, self.sample_rate, self.channels)?;
        let dir = target_dir(target);

        let wav = write_temp_wav(&audio, &dir).map_err(|e| match e {
            DocvoxError::Io(io) => {
                DocvoxError::Assembly(format!("cannot write audio in {:?}: {}", dir, io))
            }
            other => other,
        })?;
        let finished = match transcoder {
            None => wav,
            Some(program) => {
                // The WAV temp file is removed when it goes out of scope
                self.transcode(&program, wav.path(), &dir)?
            }
        };

        finished.persist(target).map_err(|e| {
            DocvoxError::Assembly(format!("failed to move output into {:?}: {}", target, e.error))
        })?;

        info!(
            "Exported {:.1}s of audio to {:?} ({})",
            audio.duration().as_secs_f32(),
            target,
            format
        );
        Ok(())
    }

    fn find_transcoder(&self) -> Result<PathBuf> {
        find_program(&self.settings.transcoder).ok_or_else(|| {
            warn!("Transcoder '{}' not found", self.settings.transcoder);
            DocvoxError::TranscodeUnavailable(format!(
                "'{}' not found; install ffmpeg (sudo apt install ffmpeg) or export as WAV",
                self.settings.transcoder
            ))
        })
    }

    fn transcode(&self, program: &Path, wav: &Path, dir: &Path) -> Result<NamedTempFile> {
        let mp3 = tempfile::Builder::new()
            .prefix(".docvox-")
            .suffix(".mp3")
            .tempfile_in(dir)
            .map_err(|e| DocvoxError::Assembly(format!("cannot create a file in {:?}: {}", dir, e)))?;

        let mut cmd = Command::new(program);
        cmd.arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(wav)
            .arg("-q:a")
            .arg(self.settings.mp3_quality.min(9).to_string())
            .arg("-f")
            .arg("mp3")
            .arg(mp3.path());

        debug!("Transcoding {:?} -> {:?}", wav, mp3.path());
        run_with_timeout(&mut cmd, None, self.settings.timeout).map_err(|e| match e {
            e if e.is_not_found() => DocvoxError::TranscodeUnavailable(format!("{:?}: {}", program, e)),
            ProcessFailure::TimedOut(_) => DocvoxError::Transcode(format!("transcoder {}", e)),
            e => DocvoxError::Transcode(e.to_string()),
        })?;

        Ok(mp3)
    }
}

fn target_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write 16-bit PCM into a temp file beside the target
fn write_temp_wav(audio: &AudioSegment, dir: &Path) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix(".docvox-")
        .suffix(".wav")
        .tempfile_in(dir)?;

    let spec = WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::new(BufWriter::new(file.as_file_mut()), spec)?;
    for &sample in &audio.samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;

    Ok(file)
}
