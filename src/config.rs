// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration for mindguard.
//!
//! Stored as JSON at `~/.mindguard/config.json`. `MINDGUARD_HOME` moves the
//! whole base directory, which is how tests and portable installs keep their
//! data apart. Every field has a default so old or hand-edited files load.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::companion::ReplyDelays;

/// Environment variable overriding the base directory.
pub const HOME_ENV: &str = "MINDGUARD_HOME";

const BASE_DIR_NAME: &str = ".mindguard";
const CONFIG_FILE: &str = "config.json";
const HISTORY_FILE: &str = "history.txt";
const SESSION_DIR_NAME: &str = "mindguard";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Local storage directory. Defaults to `<base>/storage`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Session storage directory. Defaults to the OS runtime directory.
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
    #[serde(default = "default_greeting_delay_ms")]
    pub greeting_delay_ms: u64,
    #[serde(default = "default_reply_delay_min_ms")]
    pub reply_delay_min_ms: u64,
    #[serde(default = "default_reply_delay_max_ms")]
    pub reply_delay_max_ms: u64,
    /// Show the "MindGuard is typing..." spinner (default: true)
    #[serde(default = "default_typing_indicator")]
    pub typing_indicator: bool,
}

fn default_greeting_delay_ms() -> u64 {
    700
}

fn default_reply_delay_min_ms() -> u64 {
    1000
}

fn default_reply_delay_max_ms() -> u64 {
    2000
}

fn default_typing_indicator() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            session_dir: None,
            greeting_delay_ms: default_greeting_delay_ms(),
            reply_delay_min_ms: default_reply_delay_min_ms(),
            reply_delay_max_ms: default_reply_delay_max_ms(),
            typing_indicator: default_typing_indicator(),
        }
    }
}

impl Config {
    pub fn reply_delays(&self) -> ReplyDelays {
        ReplyDelays {
            greeting: Duration::from_millis(self.greeting_delay_ms),
            min: Duration::from_millis(self.reply_delay_min_ms),
            max: Duration::from_millis(self.reply_delay_max_ms),
        }
    }

    /// Update the delays, rejecting a minimum above the maximum.
    pub fn set_delays(&mut self, greeting_ms: u64, min_ms: u64, max_ms: u64) -> Result<()> {
        if min_ms > max_ms {
            bail!(
                "Minimum reply delay ({} ms) is larger than the maximum ({} ms)",
                min_ms,
                max_ms
            );
        }
        self.greeting_delay_ms = greeting_ms;
        self.reply_delay_min_ms = min_ms;
        self.reply_delay_max_ms = max_ms;
        Ok(())
    }

    /// Resolved local storage directory.
    pub fn data_dir(&self, base: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| base.join("storage"))
    }

    /// Resolved session storage directory.
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir.clone().unwrap_or_else(default_session_dir)
    }
}

/// Base directory: `$MINDGUARD_HOME`, else `~/.mindguard`.
pub fn base_dir() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(BASE_DIR_NAME))
}

/// Per-login-session directory for the key cache.
///
/// Without a runtime dir the shared temp dir is used, so the name carries the
/// login name to keep users apart.
pub fn default_session_dir() -> PathBuf {
    if let Some(runtime) = dirs::runtime_dir() {
        return runtime.join(SESSION_DIR_NAME);
    }
    let login = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string());
    std::env::temp_dir().join(format!("{}-{}", SESSION_DIR_NAME, login))
}

pub fn config_path(base: &Path) -> PathBuf {
    base.join(CONFIG_FILE)
}

pub fn history_path(base: &Path) -> PathBuf {
    base.join(HISTORY_FILE)
}

/// Load the config under `base`, or defaults when there is none.
pub fn load_config(base: &Path) -> Result<Config> {
    let path = config_path(base);
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::debug!("CONFIG_LOADED | path={}", path.display());
    Ok(config)
}

pub fn save_config(base: &Path, config: &Config) -> Result<()> {
    fs::create_dir_all(base)
        .with_context(|| format!("Failed to create {}", base.display()))?;
    let path = config_path(base);
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("CONFIG_SAVED | path={}", path.display());
    Ok(())
}
