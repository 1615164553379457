use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::Tracker;

/// Campaign configuration, passed explicitly to whatever needs it.
/// Loaded from a JSON file; every field has a default so a partial
/// file (or none at all) works. The app password lives in its own
/// file, never in the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gmail_address: String,
    pub password_file: String,
    pub smtp_server: String,
    pub imap_server: String,
    pub imap_port: u16,
    pub cv_path: String,
    pub tracker_file: Option<String>,
    /// Bounds in seconds for the randomized pause between real sends.
    pub delay_min: u64,
    pub delay_max: u64,
    pub candidate_name: String,
    pub position: String,
    pub portfolio_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gmail_address: String::new(),
            password_file: "~/.gmail.app_password.txt".to_string(),
            smtp_server: "smtp.gmail.com".to_string(),
            imap_server: "imap.gmail.com".to_string(),
            imap_port: 993,
            cv_path: "CV.pdf".to_string(),
            tracker_file: None,
            delay_min: 30,
            delay_max: 90,
            candidate_name: String::new(),
            position: "Technicien Systèmes et Réseaux en alternance".to_string(),
            portfolio_url: String::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Config is not valid JSON: {}", path.display()))
    }

    /// Loads the config file if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn default_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "relance") {
            proj_dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("relance.json")
        }
    }

    pub fn tracker_path(&self) -> PathBuf {
        match &self.tracker_file {
            Some(p) => expand_home(p),
            None => Tracker::default_path(),
        }
    }

    pub fn cv_path(&self) -> PathBuf {
        expand_home(&self.cv_path)
    }

    /// Reads the Gmail app password from its file.
    pub fn app_password(&self) -> Result<String> {
        let path = expand_home(&self.password_file);
        let password = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read password file: {}", path.display()))?;
        Ok(password.trim().to_string())
    }

    /// Fatal configuration checks, run before any state mutation.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.gmail_address.is_empty() {
            anyhow::bail!(
                "gmail_address is not configured (edit {})",
                Self::default_path().display()
            );
        }
        self.app_password()?;
        Ok(())
    }
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}
