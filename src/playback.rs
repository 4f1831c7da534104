//! Playing synthesized audio
//!
//! The "speak" workflow: a job is synthesized into a scratch WAV and handed
//! to an external player (`aplay` by default). Playback stops as soon as the
//! job's cancel token is set.

use crate::job::CancelToken;
use crate::platform::find_program;
use crate::process::{run_until_stopped, ProcessFailure};
use crate::{DocvoxError, Result};
use log::{debug, info};
use std::path::Path;
use std::process::Command;

pub const DEFAULT_PLAYER: &str = "aplay";

/// External WAV player
#[derive(Debug, Clone)]
pub struct Player {
    program: String,
}

impl Player {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Play `wav` to the end, or until `cancel` is set
    pub fn play(&self, wav: &Path, cancel: &CancelToken) -> Result<()> {
        let program = find_program(&self.program).ok_or_else(|| {
            DocvoxError::Playback(format!(
                "player '{}' not found; install alsa-utils or set [playback] player",
                self.program
            ))
        })?;

        info!("Playing {:?} with {:?}", wav, program);
        let mut cmd = Command::new(&program);
        cmd.arg(wav);

        run_until_stopped(&mut cmd, || cancel.is_cancelled()).map_err(|e| match e {
            // The player may see the same interrupt and exit on its own
            _ if cancel.is_cancelled() => DocvoxError::Cancelled,
            ProcessFailure::Stopped => {
                debug!("Playback stopped");
                DocvoxError::Cancelled
            }
            e if e.is_not_found() => DocvoxError::Playback(format!("{:?}: {}", program, e)),
            e => DocvoxError::Playback(e.to_string()),
        })
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYER)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::speech::backends::test_support::script;
    use std::fs;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_plays_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let played = dir.path().join("played.txt");
        let program = script(dir.path(), "aplay", &format!("echo \"$1\" > {}", played.display()));
        let wav = dir.path().join("speech.wav");

        let player = Player::new(program.to_string_lossy());
        player.play(&wav, &CancelToken::new()).unwrap();

        let arg = fs::read_to_string(&played).unwrap();
        assert_eq!(arg.trim(), wav.to_string_lossy());
    }

    #[test]
    fn test_cancel_stops_playback() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "aplay", "exec sleep 5");
        let player = Player::new(program.to_string_lossy());

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });

        let started = Instant::now();
        let err = player.play(Path::new("speech.wav"), &cancel).unwrap_err();
        assert!(matches!(err, DocvoxError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_player() {
        let err = Player::new("docvox-no-such-player")
            .play(Path::new("speech.wav"), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, DocvoxError::Playback(_)));
        assert_eq!(err.stage(), crate::Stage::Export);
    }

    #[test]
    fn test_player_failure() {
        let dir = tempfile::tempdir().unwrap();
        let program = script(dir.path(), "aplay", "echo 'no soundcards found' >&2\nexit 1");
        let err = Player::new(program.to_string_lossy())
            .play(Path::new("speech.wav"), &CancelToken::new())
            .unwrap_err();
        assert!(err.to_string().contains("no soundcards found"));
    }
}
