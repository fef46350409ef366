//! Playback boundary. The engine only ever hands a URL over.

use crate::error::{AppError, AppResult};
use log::{info, warn};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;

pub trait Player: Send {
    fn play(&self, url: &str) -> AppResult<()>;
}

/// Launches `[command, url]` as a detached process
#[derive(Debug, Clone)]
pub struct ExternalPlayer {
    command: String,
    user_agent: Option<String>,
}

impl ExternalPlayer {
    pub fn new(command: &str) -> Self {
        Self { command: command.trim().to_string(), user_agent: None }
    }

    /// Exported as `USER_AGENT` for players that honour it
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Player for ExternalPlayer {
    fn play(&self, url: &str) -> AppResult<()> {
        if self.command.is_empty() {
            return Err(AppError::Validation("No media player configured".to_string()));
        }

        let mut cmd = Command::new(&self.command);
        cmd.arg(url).stdout(Stdio::null()).stderr(Stdio::null());
        if let Some(ua) = &self.user_agent {
            cmd.env("USER_AGENT", ua);
        }

        let mut child = cmd.spawn().map_err(|e| {
            AppError::Validation(format!("Failed to launch player '{}': {}", self.command, e))
        })?;
        info!("Player launched (PID: {})", child.id());

        // Reap the process so it does not linger as a zombie
        let player = self.command.clone();
        thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                warn!("Player '{}' exited with code {:?}", player, status.code());
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to wait for player: {}", e),
        });
        Ok(())
    }
}

/// Remembers every URL instead of launching anything
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingPlayer {
    played: Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingPlayer {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl Player for RecordingPlayer {
    fn play(&self, url: &str) -> AppResult<()> {
        if let Ok(mut played) = self.played.lock() {
            played.push(url.to_string());
        }
        Ok(())
    }
}

impl<P: Player + Sync> Player for std::sync::Arc<P> {
    fn play(&self, url: &str) -> AppResult<()> {
        (**self).play(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_is_validation_error() {
        let err = ExternalPlayer::new("  ").play("http://h/live/u/p/1.ts").unwrap_err();
        assert_eq!(err, AppError::Validation("No media player configured".to_string()));
    }

    #[test]
    fn test_missing_binary_reports_error() {
        let player = ExternalPlayer::new("/nonexistent/xtream_catalog_player");
        assert!(matches!(player.play("http://h/x.ts"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_recording_player() {
        let player = RecordingPlayer::default();
        player.play("a").unwrap();
        player.play("b").unwrap();
        assert_eq!(player.played(), vec!["a", "b"]);
    }
}
