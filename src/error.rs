//! Error types for docvox

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage an error belongs to
///
/// Every failure reported to the user names the stage it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Configuration, argument parsing, engine setup
    Setup,
    /// Reading the document and producing text
    Extraction,
    /// Turning segments into audio
    Synthesis,
    /// Assembling, transcoding and writing the output file
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Extraction => "extraction",
            Stage::Synthesis => "synthesis",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

/// Main error type for docvox
#[derive(Error, Debug)]
pub enum DocvoxError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Extraction failed for {path:?}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Invalid voice model: {0}")]
    InvalidVoiceModel(String),

    #[error("Synthesis failed{}: {reason}", fmt_segment(.segment))]
    Synthesis {
        segment: Option<usize>,
        reason: String,
    },

    #[error("Job aborted{}: {source}", fmt_segment(.segment))]
    JobAborted {
        segment: Option<usize>,
        #[source]
        source: Box<DocvoxError>,
    },

    #[error("Job cancelled")]
    Cancelled,

    #[error("Audio assembly failed: {0}")]
    Assembly(String),

    #[error("Transcoder unavailable: {0}")]
    TranscodeUnavailable(String),

    #[error("Transcoding failed: {0}")]
    Transcode(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

fn fmt_segment(segment: &Option<usize>) -> String {
    match segment {
        Some(idx) => format!(" on segment {}", idx),
        None => String::new(),
    }
}

impl DocvoxError {
    /// Stage of the pipeline that produced this error
    pub fn stage(&self) -> Stage {
        match self {
            DocvoxError::UnsupportedFormat(_) | DocvoxError::Extraction { .. } => Stage::Extraction,
            DocvoxError::EngineUnavailable(_)
            | DocvoxError::InvalidVoiceModel(_)
            | DocvoxError::Synthesis { .. }
            | DocvoxError::JobAborted { .. }
            | DocvoxError::Cancelled => Stage::Synthesis,
            DocvoxError::Assembly(_)
            | DocvoxError::TranscodeUnavailable(_)
            | DocvoxError::Transcode(_)
            | DocvoxError::Playback(_) => Stage::Export,
            DocvoxError::Config(_)
            | DocvoxError::IniParse(_)
            | DocvoxError::Io(_)
            | DocvoxError::Json(_)
            | DocvoxError::Other(_) => Stage::Setup,
        }
    }

    /// Index of the failing segment, when the error is tied to one
    pub fn segment(&self) -> Option<usize> {
        match self {
            DocvoxError::Synthesis { segment, .. } => *segment,
            DocvoxError::JobAborted { segment, source } => segment.or_else(|| source.segment()),
            _ => None,
        }
    }

    /// Only per-segment synthesis failures are worth another attempt.
    /// Everything else points at misconfiguration or a terminal state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DocvoxError::Synthesis { .. })
    }

    /// Retryable synthesis failure not yet tied to a segment
    pub fn synthesis(reason: impl Into<String>) -> Self {
        DocvoxError::Synthesis {
            segment: None,
            reason: reason.into(),
        }
    }

    /// Attach the segment index to a synthesis failure
    pub fn at_segment(self, index: usize) -> Self {
        match self {
            DocvoxError::Synthesis { reason, .. } => DocvoxError::Synthesis {
                segment: Some(index),
                reason,
            },
            other => other,
        }
    }

    /// Wrap an error as the terminal reason of a synthesis job
    pub fn aborted(segment: Option<usize>, source: DocvoxError) -> Self {
        DocvoxError::JobAborted {
            segment,
            source: Box::new(source),
        }
    }

    /// Underlying reason of an aborted job, or the error itself
    pub fn cause(&self) -> &DocvoxError {
        match self {
            DocvoxError::JobAborted { source, .. } => source.cause(),
            other => other,
        }
    }
}

/// Result type alias for docvox operations
pub type Result<T> = std::result::Result<T, DocvoxError>;

impl From<String> for DocvoxError {
    fn from(s: String) -> Self {
        DocvoxError::Other(s)
    }
}

impl From<&str> for DocvoxError {
    fn from(s: &str) -> Self {
        DocvoxError::Other(s.to_string())
    }
}

impl From<hound::Error> for DocvoxError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => DocvoxError::Io(io),
            other => DocvoxError::Assembly(format!("WAV error: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(
            DocvoxError::UnsupportedFormat("x".into()).stage(),
            Stage::Extraction
        );
        assert_eq!(
            DocvoxError::InvalidVoiceModel("x".into()).stage(),
            Stage::Synthesis
        );
        assert_eq!(
            DocvoxError::TranscodeUnavailable("ffmpeg".into()).stage(),
            Stage::Export
        );
    }

    #[test]
    fn test_job_aborted_reports_segment() {
        let err = DocvoxError::aborted(
            None,
            DocvoxError::synthesis("engine exited with status 1").at_segment(3),
        );
        assert_eq!(err.segment(), Some(3));
        assert!(!err.is_retryable());
        assert!(err.cause().is_retryable());
        assert!(err.to_string().contains("segment 3"));
    }

    #[test]
    fn test_only_synthesis_is_retryable() {
        assert!(DocvoxError::synthesis("timeout").is_retryable());
        assert!(!DocvoxError::EngineUnavailable("piper".into()).is_retryable());
        assert!(!DocvoxError::InvalidVoiceModel("nope".into()).is_retryable());
        assert!(!DocvoxError::Cancelled.is_retryable());
    }
}
