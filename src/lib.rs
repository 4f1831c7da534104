//! docvox - documents to speech
//!
//! Converts PDF, DOCX, ODT and plain text documents into WAV or MP3 audio.
//! Text is extracted, normalized into editable sentence segments, voiced by
//! an external TTS engine (Piper, Pico or eSpeak-NG) and assembled into one
//! output file.

pub mod audio;
pub mod config;
pub mod document;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod platform;
pub mod playback;
pub mod process;
pub mod speech;
pub mod text;

pub use error::{DocvoxError, Result, Stage};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "docvox";
