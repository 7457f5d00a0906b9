//! Service settings
//!
//! Settings come from an optional `settings.toml` and are then overlaid by
//! environment variables, so a deployment can run from env alone.

use crate::PathManager;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_RUNPOD_BASE_URL: &str = "https://api.runpod.ai/v2";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the HTTP server listens on
    pub bind: String,
    /// SQLite file for the document store; in-memory store when unset
    pub db_path: Option<PathBuf>,
    /// Log file; stderr only when unset
    pub log_file: Option<PathBuf>,
    pub runpod: RunpodSettings,
    pub auth: AuthSettings,
    pub chat: ChatSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunpodSettings {
    pub endpoint_id: Option<String>,
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC key for session tokens
    pub session_secret: Option<String>,
    /// Emails allowed to sign in. Empty means any verified session.
    pub allowed_emails: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub inference_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub max_queue_depth: usize,
    /// `with_user_message` or `after_reply`
    pub title_timing: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            db_path: None,
            log_file: None,
            runpod: RunpodSettings::default(),
            auth: AuthSettings::default(),
            chat: ChatSettings::default(),
        }
    }
}

impl Default for RunpodSettings {
    fn default() -> Self {
        Self {
            endpoint_id: None,
            api_key: None,
            base_url: DEFAULT_RUNPOD_BASE_URL.to_string(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            inference_timeout_secs: 120,
            cache_ttl_secs: 300,
            cache_max_entries: 256,
            max_queue_depth: 16,
            title_timing: "with_user_message".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default settings file (if any), then apply the
    /// process environment.
    pub fn load() -> Result<Self, String> {
        let base = match PathManager::settings_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        base.overlay(|key| std::env::var(key).ok())
    }

    /// Load from an explicit file, then apply the process environment.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        Self::from_file(path)?.overlay(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings {}: {}", path.display(), e))?;
        toml::from_str(&content)
            .map_err(|e| format!("Failed to parse settings {}: {}", path.display(), e))
    }

    /// Apply environment overrides read through `lookup`.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("NOCTUA_BIND") {
            self.bind = v;
        }
        if let Some(v) = get("NOCTUA_DB_PATH") {
            self.db_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("NOCTUA_LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }

        if let Some(v) = get("RUNPOD_ENDPOINT_ID") {
            self.runpod.endpoint_id = Some(v);
        }
        if let Some(v) = get("RUNPOD_API_KEY") {
            self.runpod.api_key = Some(v);
        }
        if let Some(v) = get("RUNPOD_BASE_URL") {
            self.runpod.base_url = v;
        }

        if let Some(v) = get("NOCTUA_SESSION_SECRET") {
            self.auth.session_secret = Some(v);
        }
        if let Some(v) = get("NOCTUA_ALLOWED_EMAILS") {
            self.auth.allowed_emails = v
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }

        if let Some(v) = get("NOCTUA_INFERENCE_TIMEOUT_SECS") {
            self.chat.inference_timeout_secs = parse_var("NOCTUA_INFERENCE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("NOCTUA_CACHE_TTL_SECS") {
            self.chat.cache_ttl_secs = parse_var("NOCTUA_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = get("NOCTUA_CACHE_MAX_ENTRIES") {
            self.chat.cache_max_entries = parse_var("NOCTUA_CACHE_MAX_ENTRIES", &v)?;
        }
        if let Some(v) = get("NOCTUA_MAX_QUEUE_DEPTH") {
            self.chat.max_queue_depth = parse_var("NOCTUA_MAX_QUEUE_DEPTH", &v)?;
        }
        if let Some(v) = get("NOCTUA_TITLE_TIMING") {
            self.chat.title_timing = v.trim().to_string();
        }

        Ok(self)
    }

    /// Check that everything needed to serve traffic is present.
    pub fn validate(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.runpod.endpoint_id.is_none() {
            missing.push("RUNPOD_ENDPOINT_ID");
        }
        if self.runpod.api_key.is_none() {
            missing.push("RUNPOD_API_KEY");
        }
        if self.auth.session_secret.is_none() {
            missing.push("NOCTUA_SESSION_SECRET");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("Missing required settings: {}", missing.join(", ")))
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid value for {}: {:?}", key, value))
}
