//! End-to-end conversion
//!
//! Glue between the stages: document to segmented text, text to audio
//! segments, audio to file. Each stage can also be driven on its own.

use crate::audio::{AudioFormat, AudioSegment, ExportSettings, Exporter};
use crate::document;
use crate::job::{OutputTarget, Orchestrator, SynthesisJob};
use crate::text::{normalize, TextUnit};
use crate::{DocvoxError, Result};
use log::info;
use std::path::Path;

/// True for files holding a saved [`TextUnit`]
pub fn is_text_unit(path: &Path) -> bool {
    path.extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

/// Produce the sentence-level text of an input
///
/// Saved text units are loaded as they are; documents are extracted and
/// normalized, keeping the edits of `prior` when given.
pub fn prepare_text(input: &Path, prior: Option<&TextUnit>) -> Result<TextUnit> {
    if is_text_unit(input) {
        return TextUnit::load(input).map_err(|e| DocvoxError::Extraction {
            path: input.to_path_buf(),
            reason: format!("cannot load saved text: {}", e),
        });
    }

    let extracted = document::extract_path(input)?;
    let unit = normalize(&extracted.to_text(), prior);
    if unit.is_empty() {
        return Err(DocvoxError::Extraction {
            path: input.to_path_buf(),
            reason: "the document has no speakable text".to_string(),
        });
    }

    info!("Prepared {} segments from {:?}", unit.len(), input);
    Ok(unit)
}

/// Output format from an explicit choice or the target's extension
pub fn output_format(target: &Path, explicit: Option<AudioFormat>) -> Result<AudioFormat> {
    explicit
        .or_else(|| AudioFormat::from_path(target))
        .ok_or_else(|| {
            DocvoxError::UnsupportedFormat(format!(
                "cannot tell the audio format of {:?}; use a .wav or .mp3 name",
                target
            ))
        })
}

/// Save (edited) text as an ODT document
#[cfg(feature = "office")]
pub fn save_edition(unit: &TextUnit, target: &Path) -> Result<()> {
    document::odt::write_odt(unit, target)
}

#[cfg(not(feature = "office"))]
pub fn save_edition(_unit: &TextUnit, target: &Path) -> Result<()> {
    Err(DocvoxError::UnsupportedFormat(format!(
        "cannot write {:?}: built without ODT support (feature \"office\")",
        target
    )))
}

/// Synthesize a job and export its audio
///
/// Returns the synthesized segments so a failed export (for instance a
/// missing MP3 transcoder) can be retried without synthesizing again.
pub fn convert(
    orchestrator: &mut Orchestrator<'_>,
    job: &mut SynthesisJob,
    export: &ExportSettings,
) -> (Result<()>, Vec<AudioSegment>) {
    let segments = match orchestrator.run(job) {
        Ok(segments) => segments,
        Err(e) => return (Err(e), Vec::new()),
    };

    let OutputTarget { path, format } = &job.output;
    let exporter = Exporter::new(export.clone(), job.engine.sample_rate, job.engine.channels);
    let result = exporter.export(&segments, path, *format);
    (result, segments)
}
