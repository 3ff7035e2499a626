//! User configuration.
//!
//! Read from `~/.config/winswitch/config.toml`. Every field has a default so
//! a missing or partial file is fine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::model::handle_cache::CacheLimits;
use crate::model::title::{TitleRule, TitleRules};
use crate::sys::hotkey::{Hotkey, KeyCode, Modifiers};

pub const CONFIG_DIR_NAME: &str = "winswitch";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hotkeys: HotkeySettings,
    pub discovery: DiscoverySettings,
    pub cache: CacheSettings,
    pub activation: ActivationSettings,
    pub input: InputSettings,
    pub watchdog: WatchdogSettings,
    pub permission: PermissionSettings,
    pub default_title_rule: TitleRule,
    /// Title rules keyed by bundle identifier.
    pub title_rules: BTreeMap<String, TitleRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeySettings {
    /// Cycles the windows of the foreground application.
    pub windows: Hotkey,
    /// Cycles applications.
    pub applications: Hotkey,
}

impl Default for HotkeySettings {
    fn default() -> Self {
        Self {
            windows: Hotkey::new(Modifiers::ALT, KeyCode::Grave),
            applications: Hotkey::new(Modifiers::ALT, KeyCode::Tab),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Windows narrower than this are helper or status surfaces.
    pub min_window_width: f64,
    pub min_window_height: f64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            min_window_width: 100.0,
            min_window_height: 100.0,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "sweep_interval_ms")]
    pub sweep_interval: Duration,
    pub icons: CacheLimits,
    pub ax_handles: CacheLimits,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            icons: CacheLimits::default(),
            ax_handles: CacheLimits::default(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationSettings {
    /// Move the pointer onto the target display before activating when the
    /// window lives on a different display than the pointer.
    pub focus_transfer: bool,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "focus_settle_ms")]
    pub focus_settle: Duration,
}

impl Default for ActivationSettings {
    fn default() -> Self {
        Self {
            focus_transfer: true,
            focus_settle: Duration::from_millis(30),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Window in which a second modifier release is treated as a duplicate.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "debounce_ms")]
    pub debounce: Duration,
}

impl Default for InputSettings {
    fn default() -> Self { Self { debounce: Duration::from_millis(50) } }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    pub enabled: bool,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "fast_interval_ms")]
    pub fast_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "slow_interval_ms")]
    pub slow_interval: Duration,
    /// Polls at the fast interval before downshifting.
    pub fast_polls: u32,
    /// Hard cap after which the watchdog gives up.
    pub max_polls: u32,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fast_interval: Duration::from_millis(16),
            slow_interval: Duration::from_millis(50),
            fast_polls: 60,
            max_polls: 1000,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSettings {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "poll_interval_ms")]
    pub poll_interval: Duration,
}

impl Default for PermissionSettings {
    fn default() -> Self { Self { poll_interval: Duration::from_secs(2) } }
}

impl Config {
    /// `$XDG_CONFIG_HOME/winswitch/config.toml`, falling back to
    /// `~/.config/winswitch/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        let base = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))?;
        Some(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn read(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::read`], but a missing file yields the defaults.
    pub fn read_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Self::read(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(Config::default())
            }
            other => other,
        }
    }

    pub fn parse(contents: &str) -> Result<Config, toml::de::Error> { toml::from_str(contents) }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> { Ok(toml::to_string_pretty(self)?) }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.settings;
        for (name, limits) in [("icons", &s.cache.icons), ("ax_handles", &s.cache.ax_handles)] {
            if limits.max_size == 0 {
                return Err(ConfigError::Invalid(format!("cache.{name}.max_size must be > 0")));
            }
            if limits.cleanup_threshold < limits.max_size {
                return Err(ConfigError::Invalid(format!(
                    "cache.{name}.cleanup_threshold ({}) must be >= max_size ({})",
                    limits.cleanup_threshold, limits.max_size
                )));
            }
            if limits.pressure_floor > limits.max_size {
                return Err(ConfigError::Invalid(format!(
                    "cache.{name}.pressure_floor ({}) must be <= max_size ({})",
                    limits.pressure_floor, limits.max_size
                )));
            }
        }
        if s.hotkeys.windows == s.hotkeys.applications {
            return Err(ConfigError::Invalid(format!(
                "hotkeys.windows and hotkeys.applications are both {}",
                s.hotkeys.windows
            )));
        }
        let intervals = [
            ("cache.sweep_interval_ms", s.cache.sweep_interval),
            ("watchdog.fast_interval_ms", s.watchdog.fast_interval),
            ("watchdog.slow_interval_ms", s.watchdog.slow_interval),
            ("permission.poll_interval_ms", s.permission.poll_interval),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Invalid(format!("{name} must be > 0")));
        }
        if s.watchdog.max_polls == 0 {
            return Err(ConfigError::Invalid("watchdog.max_polls must be > 0".into()));
        }
        if s.discovery.min_window_width < 0.0 || s.discovery.min_window_height < 0.0 {
            return Err(ConfigError::Invalid("discovery minimum sizes must be >= 0".into()));
        }
        Ok(())
    }

    pub fn title_rules(&self) -> TitleRules {
        TitleRules::new(
            self.settings.default_title_rule.clone(),
            self.settings.title_rules.iter().map(|(k, v)| (k.clone(), v.clone())),
        )
    }
}
