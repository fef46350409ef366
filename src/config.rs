//! Configuration management

use crate::credentials::Credentials;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_USER_AGENT: &str = "okhttp/5.0.0-alpha.2";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub external_player: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_epg_max_age")]
    pub epg_cache_max_age_secs: u64,
    #[serde(default)]
    pub log_to_file: bool,
    // Address book entry used for auto login
    #[serde(default)]
    pub startup_profile: Option<String>,
}

fn default_user_agent() -> String { DEFAULT_USER_AGENT.to_string() }
fn default_timeout() -> u64 { 10 }
fn default_epg_max_age() -> u64 { 3600 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            external_player: String::new(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_timeout(),
            epg_cache_max_age_secs: default_epg_max_age(),
            log_to_file: false,
            startup_profile: None,
        }
    }
}

/// Per-user application directory, created on demand
pub fn config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("xtream_catalog");
    fs::create_dir_all(&path).ok();
    path
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        config_dir().join("config.json")
    }

    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Read {} failed: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        fs::write(path, content)
            .map_err(|e| AppError::Config(format!("Write {} failed: {}", path.display(), e)))
    }
}

/// How a saved profile logs in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProfileSource {
    Manual {
        server: String,
        username: String,
        password: String,
    },
    M3uPlus {
        url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCredential {
    pub name: String,
    pub source: ProfileSource,
    // When this entry was saved (Unix timestamp)
    #[serde(default)]
    pub saved_at: i64,
}

impl SavedCredential {
    pub fn credentials(&self) -> AppResult<Credentials> {
        match &self.source {
            ProfileSource::Manual { server, username, password } => {
                Ok(Credentials::new(server, username, password))
            }
            ProfileSource::M3uPlus { url } => Credentials::from_m3u_url(url),
        }
    }
}

pub fn address_book_path() -> PathBuf {
    config_dir().join("address_book.json")
}

pub fn load_address_book(path: &Path) -> AppResult<Vec<SavedCredential>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(|e| AppError::Config(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| AppError::Config(e.to_string()))
}

pub fn save_address_book(path: &Path, book: &[SavedCredential]) -> AppResult<()> {
    let content = serde_json::to_string_pretty(book).map_err(|e| AppError::Config(e.to_string()))?;
    fs::write(path, content).map_err(|e| AppError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("xtream_catalog_cfg_{}_{}", std::process::id(), name));
        fs::create_dir_all(&dir).unwrap();
        dir.join("config.json")
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.epg_cache_max_age_secs, 3600);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{"external_player": "mpv"}"#).unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.external_player, "mpv");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let path = temp_path("corrupt");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn test_address_book_roundtrip() {
        let path = temp_path("book").with_file_name("address_book.json");
        let book = vec![
            SavedCredential {
                name: "home".to_string(),
                source: ProfileSource::Manual {
                    server: "http://h".to_string(),
                    username: "u".to_string(),
                    password: "p".to_string(),
                },
                saved_at: 1,
            },
            SavedCredential {
                name: "m3u".to_string(),
                source: ProfileSource::M3uPlus {
                    url: "http://h/get.php?username=a&password=b&type=m3u_plus".to_string(),
                },
                saved_at: 2,
            },
        ];
        save_address_book(&path, &book).unwrap();
        let loaded = load_address_book(&path).unwrap();
        assert_eq!(loaded, book);
        assert_eq!(loaded[1].credentials().unwrap().username, "a");
    }
}
