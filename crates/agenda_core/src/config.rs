//! Application configuration file.
//!
//! # Responsibility
//! - Load `agenda.json` into an explicit `AppConfig` passed to front-ends.
//! - Persist cosmetic theme preferences without touching other keys.
//!
//! # Invariants
//! - Loading never fails: a missing or malformed file yields defaults.
//! - Unknown theme names and window sizes fall back to defaults.
//! - Theme preferences are opaque to the core; only front-ends interpret them.

use crate::clock::SystemClock;
use crate::logging::default_log_level;
use crate::reminder::poll::DEFAULT_POLL_INTERVAL;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "agenda.json";
pub const DEFAULT_DB_FILE_NAME: &str = "agenda.sqlite3";
pub const DEFAULT_THEME: &str = "Kawaii";
pub const KNOWN_THEMES: &[&str] = &["Kawaii", "Cats", "Blue"];

/// Main window size preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowSize {
    Full,
    #[default]
    Medium,
    Small,
}

impl WindowSize {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Medium => "medium",
            Self::Small => "small",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Some(Self::Full),
            "medium" => Some(Self::Medium),
            "small" => Some(Self::Small),
            _ => None,
        }
    }

    /// Window width/height in pixels; `None` means maximized.
    pub fn geometry(self) -> Option<(u32, u32)> {
        match self {
            Self::Full => None,
            Self::Medium => Some((900, 750)),
            Self::Small => Some((400, 820)),
        }
    }
}

/// Cosmetic preferences read by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemePreferences {
    /// Last saved theme name.
    pub name: String,
    /// When false the UI starts with the default theme.
    pub remember_style: bool,
    pub window_size: WindowSize,
}

impl Default for ThemePreferences {
    fn default() -> Self {
        Self {
            name: DEFAULT_THEME.to_string(),
            remember_style: true,
            window_size: WindowSize::Medium,
        }
    }
}

impl ThemePreferences {
    /// Theme to apply at start-up.
    pub fn startup_theme(&self) -> &str {
        if self.remember_style {
            self.name.as_str()
        } else {
            DEFAULT_THEME
        }
    }
}

/// Partial theme preference update; `None` keeps the saved value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeUpdate {
    pub name: Option<String>,
    pub remember_style: Option<bool>,
    pub window_size: Option<WindowSize>,
}

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Rolling log directory; logging stays off when `None`.
    pub log_dir: Option<PathBuf>,
    pub poll_interval: Duration,
    /// Fixed local offset; host offset at start-up when `None`.
    pub utc_offset_minutes: Option<i32>,
    pub theme: ThemePreferences,
}

impl AppConfig {
    /// Defaults rooted at `base_dir`.
    pub fn defaults_in(base_dir: &Path) -> Self {
        Self {
            db_path: base_dir.join(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            utc_offset_minutes: None,
            theme: ThemePreferences::default(),
        }
    }

    /// Loads `base_dir/agenda.json`, falling back to defaults.
    ///
    /// Relative paths in the file resolve against `base_dir`.
    pub fn load(base_dir: &Path) -> Self {
        let mut config = Self::defaults_in(base_dir);
        let path = base_dir.join(CONFIG_FILE_NAME);
        let file = match read_config_file(&path) {
            Ok(Some(file)) => file,
            Ok(None) => return config,
            Err(err) => {
                warn!(
                    "event=config_load module=config status=fallback path={} error={err}",
                    path.display()
                );
                return config;
            }
        };

        if let Some(db_path) = file.db_path {
            config.db_path = base_dir.join(db_path);
        }
        if let Some(level) = file.log_level {
            config.log_level = level;
        }
        config.log_dir = file.log_dir.map(|dir| base_dir.join(dir));
        if let Some(secs) = file.poll_interval_secs.filter(|secs| *secs > 0) {
            config.poll_interval = Duration::from_secs(secs);
        }
        config.utc_offset_minutes = file.utc_offset_minutes;
        if let Some(theme) = file.theme {
            config.theme = theme.resolve();
        }
        config
    }

    /// Clock for reminder evaluation.
    ///
    /// An out-of-range configured offset falls back to the host offset.
    pub fn clock(&self) -> SystemClock {
        match self.utc_offset_minutes {
            Some(minutes) => SystemClock::from_offset_minutes(minutes).unwrap_or_else(|| {
                warn!(
                    "event=config_clock module=config status=fallback utc_offset_minutes={minutes}"
                );
                SystemClock::host_local()
            }),
            None => SystemClock::host_local(),
        }
    }
}

/// Merges a theme update into `base_dir/agenda.json`.
///
/// Keys other than `theme` are preserved. Unknown theme names are ignored.
///
/// # Errors
/// - `ConfigError::Io` when the file cannot be written.
/// - `ConfigError::Parse` when the existing file is not a JSON object.
pub fn save_theme_preferences(base_dir: &Path, update: &ThemeUpdate) -> Result<(), ConfigError> {
    let path = base_dir.join(CONFIG_FILE_NAME);
    let mut root = match std::fs::read_to_string(&path) {
        Ok(text) => match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
        Err(err) => return Err(err.into()),
    };

    let theme = root
        .entry("theme")
        .or_insert_with(|| Value::Object(Map::new()));
    if !theme.is_object() {
        *theme = Value::Object(Map::new());
    }
    if let Value::Object(theme) = theme {
        if let Some(name) = update
            .name
            .as_deref()
            .and_then(canonical_theme_name)
        {
            theme.insert("name".to_string(), Value::String(name.to_string()));
        }
        if let Some(remember_style) = update.remember_style {
            theme.insert("remember_style".to_string(), Value::Bool(remember_style));
        }
        if let Some(window_size) = update.window_size {
            theme.insert(
                "window_size".to_string(),
                Value::String(window_size.as_str().to_string()),
            );
        }
        theme
            .entry("remember_style")
            .or_insert(Value::Bool(true));
    }

    std::fs::create_dir_all(base_dir)?;
    std::fs::write(&path, serde_json::to_string_pretty(&Value::Object(root))?)?;
    Ok(())
}

/// Config file write/parse failure.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "config file I/O failed: {err}"),
            Self::Parse(err) => write!(f, "config file is not valid JSON: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    db_path: Option<PathBuf>,
    log_level: Option<String>,
    log_dir: Option<PathBuf>,
    poll_interval_secs: Option<u64>,
    utc_offset_minutes: Option<i32>,
    theme: Option<ThemeFile>,
}

#[derive(Debug, Default, Deserialize)]
struct ThemeFile {
    name: Option<String>,
    remember_style: Option<bool>,
    window_size: Option<String>,
}

impl ThemeFile {
    fn resolve(self) -> ThemePreferences {
        let defaults = ThemePreferences::default();
        ThemePreferences {
            name: self
                .name
                .as_deref()
                .and_then(canonical_theme_name)
                .map_or(defaults.name, str::to_string),
            remember_style: self.remember_style.unwrap_or(defaults.remember_style),
            window_size: self
                .window_size
                .as_deref()
                .and_then(WindowSize::parse)
                .unwrap_or(defaults.window_size),
        }
    }
}

fn read_config_file(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn canonical_theme_name(name: &str) -> Option<&'static str> {
    KNOWN_THEMES
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(name.trim()))
}
