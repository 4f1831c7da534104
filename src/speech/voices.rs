//! Voice model store
//!
//! Piper voices are `<name>.onnx` models with a sibling `<name>.onnx.json`
//! config, installed under a models directory, possibly nested by language
//! and speaker the way the upstream voice repository lays them out.
//! Installing and removing models is someone else's job; this module only
//! resolves references and lists what is there.
//!
//! Pico and eSpeak-NG need no model files, their voice lists are fixed.

use crate::{DocvoxError, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Piper voice used when none is configured
pub const DEFAULT_PIPER_VOICE: &str = "es_ES-davefx-medium";

/// Languages shipped with pico2wave
pub const PICO_VOICES: &[&str] = &["es-ES", "en-US", "en-GB", "de-DE", "fr-FR", "it-IT"];

/// A sample of eSpeak-NG voices (any valid voice name is accepted)
pub const ESPEAK_VOICES: &[&str] = &["es", "es-la", "es+f1", "es+m3", "en", "en-us", "en-gb"];

/// Default location of the model store
pub fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("piper")
        .join("models")
}

/// A resolved Piper voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiperVoice {
    pub name: String,
    pub model: PathBuf,
    pub config: PathBuf,

    /// Output rate declared by the model config
    pub sample_rate: Option<u32>,
}

#[derive(Deserialize)]
struct VoiceConfigFile {
    #[serde(default)]
    audio: Option<AudioSection>,
}

#[derive(Deserialize)]
struct AudioSection {
    sample_rate: Option<u32>,
}

impl PiperVoice {
    /// Build a voice from its model path, requiring the config beside it
    fn from_model(model: &Path) -> Result<Self> {
        if !model.is_file() {
            return Err(DocvoxError::InvalidVoiceModel(format!(
                "voice model {:?} does not exist",
                model
            )));
        }

        let config = config_path(model);
        if !config.is_file() {
            return Err(DocvoxError::InvalidVoiceModel(format!(
                "voice model {:?} has no config file {:?}",
                model, config
            )));
        }

        let data = fs::read_to_string(&config)?;
        let parsed: VoiceConfigFile = serde_json::from_str(&data).map_err(|e| {
            DocvoxError::InvalidVoiceModel(format!("voice config {:?} is not valid: {}", config, e))
        })?;
        let sample_rate = parsed.audio.and_then(|a| a.sample_rate);

        Ok(Self {
            name: voice_name(model),
            model: model.to_path_buf(),
            config,
            sample_rate,
        })
    }
}

fn config_path(model: &Path) -> PathBuf {
    let mut name = model.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

fn voice_name(model: &Path) -> String {
    model
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_model(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "onnx")
}

/// Directory of installed Piper voices
#[derive(Debug, Clone)]
pub struct VoiceStore {
    models_dir: PathBuf,
}

impl VoiceStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Resolve a voice reference (model path or name)
    ///
    /// An empty reference resolves the default voice.
    pub fn resolve(&self, reference: &str) -> Result<PiperVoice> {
        let reference = reference.trim();
        let reference = if reference.is_empty() {
            DEFAULT_PIPER_VOICE
        } else {
            reference
        };

        let as_path = Path::new(reference);
        if is_model(as_path) || as_path.components().count() > 1 {
            debug!("Resolving voice {:?} as a path", as_path);
            return PiperVoice::from_model(as_path);
        }

        let file_name = format!("{}.onnx", reference);
        let found = self
            .walk()
            .find(|path| path.file_name().map_or(false, |n| n == file_name.as_str()));

        match found {
            Some(model) => {
                debug!("Resolved voice '{}' to {:?}", reference, model);
                PiperVoice::from_model(&model)
            }
            None => Err(DocvoxError::InvalidVoiceModel(format!(
                "voice '{}' is not installed in {:?}",
                reference, self.models_dir
            ))),
        }
    }

    /// All usable voices in the store, sorted by name
    ///
    /// Models missing their config are skipped with a warning.
    pub fn list(&self) -> Vec<PiperVoice> {
        let mut voices: Vec<PiperVoice> = self
            .walk()
            .filter_map(|model| match PiperVoice::from_model(&model) {
                Ok(voice) => Some(voice),
                Err(e) => {
                    warn!("Skipping voice model: {}", e);
                    None
                }
            })
            .collect();
        voices.sort_by(|a, b| a.name.cmp(&b.name));
        voices
    }

    fn walk(&self) -> impl Iterator<Item = PathBuf> {
        WalkDir::new(&self.models_dir)
            .max_depth(6)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && is_model(entry.path()))
            .map(|entry| entry.into_path())
    }
}

/// Check a Pico language tag
pub fn check_pico_voice(voice: &str) -> Result<()> {
    if PICO_VOICES.contains(&voice) {
        Ok(())
    } else {
        Err(DocvoxError::InvalidVoiceModel(format!(
            "pico has no voice '{}' (available: {})",
            voice,
            PICO_VOICES.join(", ")
        )))
    }
}

/// Check an eSpeak-NG voice name
///
/// eSpeak accepts many voice and variant combinations, so only the syntax
/// is checked here.
pub fn check_espeak_voice(voice: &str) -> Result<()> {
    let valid = !voice.is_empty()
        && voice
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'));
    if valid {
        Ok(())
    } else {
        Err(DocvoxError::InvalidVoiceModel(format!(
            "'{}' is not a valid espeak-ng voice name",
            voice
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install(dir: &Path, rel: &str, rate: u32) -> PathBuf {
        let model = dir.join(rel);
        fs::create_dir_all(model.parent().unwrap()).unwrap();
        fs::write(&model, b"onnx").unwrap();
        fs::write(
            config_path(&model),
            format!(r#"{{"audio": {{"sample_rate": {}}}, "espeak": {{"voice": "es"}}}}"#, rate),
        )
        .unwrap();
        model
    }

    #[test]
    fn test_resolve_by_name_nested() {
        let dir = tempfile::tempdir().unwrap();
        install(dir.path(), "es/es_ES/davefx/medium/es_ES-davefx-medium.onnx", 22050);
        let store = VoiceStore::new(dir.path());

        let voice = store.resolve("es_ES-davefx-medium").unwrap();
        assert_eq!(voice.name, "es_ES-davefx-medium");
        assert_eq!(voice.sample_rate, Some(22050));

        // Empty reference means the default voice
        assert_eq!(store.resolve("").unwrap(), voice);
    }

    #[test]
    fn test_resolve_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let model = install(dir.path(), "en_US-lessac-low.onnx", 16000);
        let store = VoiceStore::new("/nonexistent");
        let voice = store.resolve(model.to_str().unwrap()).unwrap();
        assert_eq!(voice.sample_rate, Some(16000));
    }

    #[test]
    fn test_unknown_voice() {
        let dir = tempfile::tempdir().unwrap();
        let store = VoiceStore::new(dir.path());
        assert!(matches!(
            store.resolve("xx_XX-nobody-high"),
            Err(DocvoxError::InvalidVoiceModel(_))
        ));
    }

    #[test]
    fn test_model_without_config() {
        let dir = tempfile::tempdir().unwrap();
        let model = install(dir.path(), "a.onnx", 22050);
        install(dir.path(), "b.onnx", 22050);
        fs::remove_file(config_path(&model)).unwrap();

        let store = VoiceStore::new(dir.path());
        assert!(matches!(store.resolve("a"), Err(DocvoxError::InvalidVoiceModel(_))));

        let names: Vec<String> = store.list().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_fixed_voice_lists() {
        assert!(check_pico_voice("en-GB").is_ok());
        assert!(check_pico_voice("pt-BR").is_err());
        assert!(check_espeak_voice("es+f1").is_ok());
        assert!(check_espeak_voice("es; rm -rf").is_err());
        assert!(check_espeak_voice("").is_err());
    }
}
