//! Configuration management

use crate::audio::ExportSettings;
use crate::job::RunOptions;
use crate::platform::default_workers;
use crate::playback::{Player, DEFAULT_PLAYER};
use crate::speech::voices::default_models_dir;
use crate::speech::{EngineConfig, EngineKind, EngineSettings};
use crate::{DocvoxError, Result};
use ini::Ini;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Persistent settings
///
/// Engine programs, the voice model store, synthesis limits and export
/// options. Command line flags override what is read here.
pub struct Config {
    /// INI configuration storage
    ini: Ini,

    /// Config file path (~/.docvox.cfg)
    path: PathBuf,
}

impl Config {
    /// Load configuration from disk or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load a specific config file, creating it with defaults if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(path)
                .map_err(|e| DocvoxError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default at {:?}", path);
            let default = Self::default_config();
            default
                .write_to_file(path)
                .map_err(|e| DocvoxError::IniParse(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self {
            ini,
            path: path.to_path_buf(),
        })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| DocvoxError::Config(format!("Failed to save config: {}", e)))
    }

    /// Get config file path (~/.docvox.cfg)
    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!(".{}.cfg", crate::APP_NAME))
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create default configuration
    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("engine"))
            .set("default", "piper")
            .set("voice", "")
            .set("sample_rate", "22050")
            .set("channels", "1");

        ini.with_section(Some("piper"))
            .set("binary", "piper")
            .set("models_dir", default_models_dir().to_string_lossy());

        ini.with_section(Some("pico")).set("binary", "pico2wave");

        ini.with_section(Some("espeak")).set("binary", "espeak-ng");

        ini.with_section(Some("synthesis"))
            .set("workers", "0")
            .set("attempts", "2")
            .set("timeout", "120");

        ini.with_section(Some("export"))
            .set("transcoder", "ffmpeg")
            .set("mp3_quality", "0")
            .set("timeout", "300");

        ini.with_section(Some("playback")).set("player", DEFAULT_PLAYER);

        ini
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
            .to_string()
    }

    /// Get a parsed value, falling back to `default` when missing or invalid
    pub fn get_parsed<T: FromStr>(&self, section: &str, key: &str, default: T) -> T {
        match self.ini.get_from(Some(section), key).map(str::trim) {
            None | Some("") => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid value '{}' for {}.{}, using default", raw, section, key);
                default
            }),
        }
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Engine used when none is given on the command line
    pub fn default_engine(&self) -> EngineKind {
        self.get_parsed("engine", "default", EngineKind::Piper)
    }

    /// Configured voice, if any
    pub fn voice(&self) -> Option<String> {
        let voice = self.get_string("engine", "voice", "");
        (!voice.is_empty()).then_some(voice)
    }

    /// Output sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        let rate = self.get_parsed("engine", "sample_rate", 22050u32);
        if (8000..=192_000).contains(&rate) {
            rate
        } else {
            warn!("Sample rate {} out of range, using 22050", rate);
            22050
        }
    }

    /// Output channel count (1 or 2)
    pub fn channels(&self) -> u16 {
        match self.get_parsed("engine", "channels", 1u16) {
            c @ 1..=2 => c,
            c => {
                warn!("Unsupported channel count {}, using mono", c);
                1
            }
        }
    }

    /// Job engine configuration from the `[engine]` section
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            engine: self.default_engine(),
            voice: self.voice(),
            sample_rate: self.sample_rate(),
            channels: self.channels(),
        }
    }

    /// Where the engine programs and Piper models are
    pub fn engine_settings(&self) -> EngineSettings {
        let models_dir = self.get_string("piper", "models_dir", "");
        EngineSettings {
            piper_binary: self.get_string("piper", "binary", "piper"),
            pico_binary: self.get_string("pico", "binary", "pico2wave"),
            espeak_binary: self.get_string("espeak", "binary", "espeak-ng"),
            models_dir: if models_dir.is_empty() {
                default_models_dir()
            } else {
                expand_home(&models_dir)
            },
            timeout: Duration::from_secs(self.get_parsed("synthesis", "timeout", 120u64).max(1)),
        }
    }

    /// Worker count and retry bound
    pub fn run_options(&self) -> RunOptions {
        let workers = match self.get_parsed("synthesis", "workers", 0usize) {
            0 => default_workers(),
            n => n,
        };
        RunOptions {
            workers,
            attempts: self.get_parsed("synthesis", "attempts", 2u32).max(1),
        }
    }

    /// MP3 transcoder settings
    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            transcoder: self.get_string("export", "transcoder", "ffmpeg"),
            mp3_quality: self.get_parsed("export", "mp3_quality", 0u8).min(9),
            timeout: Duration::from_secs(self.get_parsed("export", "timeout", 300u64).max(1)),
        }
    }

    /// Player for the speak command
    pub fn player(&self) -> Player {
        Player::new(self.get_string("playback", "player", DEFAULT_PLAYER))
    }
}

/// Expand a leading `~/`
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
