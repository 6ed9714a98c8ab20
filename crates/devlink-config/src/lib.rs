//! Configuration for the devlink dispatch engine.
//!
//! TOML file + environment overrides, and translation to
//! `devlink_core::DispatchConfig`. Embedding applications load a
//! [`Config`] once at startup and hand the engine section to
//! [`Dispatcher::new`](devlink_core::Dispatcher::new).

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use devlink_core::DispatchConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Engine tunables.
    #[serde(default)]
    pub engine: EngineSection,

    /// Logging defaults.
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EngineSection {
    /// Upper bound on explicit targets in one subscribe call.
    #[serde(default = "default_max_fanout_targets")]
    pub max_fanout_targets: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_fanout_targets: default_max_fanout_targets(),
        }
    }
}

fn default_max_fanout_targets() -> usize {
    128
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LogSection {
    /// Tracing filter directive (e.g. "info" or "devlink_core=debug").
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "devlink", "devlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("devlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from an explicit file + environment.
///
/// Environment overrides use a `DEVLINK_` prefix with `__` as the
/// section separator, e.g. `DEVLINK_ENGINE__MAX_FANOUT_TARGETS=64`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DEVLINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning defaults when the file doesn't exist or fails
/// to parse.
#[must_use]
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write it to an explicit path.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation to engine config ────────────────────────────────────

/// Build a validated `DispatchConfig` from the engine section.
pub fn engine_config(cfg: &Config) -> Result<DispatchConfig, ConfigError> {
    if cfg.engine.max_fanout_targets == 0 {
        return Err(ConfigError::Validation {
            field: "engine.max_fanout_targets".into(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(DispatchConfig {
        max_fanout_targets: cfg.engine.max_fanout_targets,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from(&dir.path().join("missing.toml")).expect("load");

        assert_eq!(config.engine.max_fanout_targets, 128);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[engine]\nmax_fanout_targets = 16\n\n[log]\nfilter = \"debug\"\n",
        )
        .expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.engine.max_fanout_targets, 16);
        assert_eq!(config.log.filter, "debug");
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            engine: EngineSection {
                max_fanout_targets: 7,
            },
            log: LogSection {
                filter: "devlink_core=trace".into(),
            },
        };
        save_config_to(&config, &path).expect("save");

        let reloaded = load_config_from(&path).expect("reload");
        assert_eq!(reloaded.engine.max_fanout_targets, 7);
        assert_eq!(reloaded.log.filter, "devlink_core=trace");
    }

    #[test]
    fn zero_fanout_limit_is_rejected() {
        let config = Config {
            engine: EngineSection {
                max_fanout_targets: 0,
            },
            log: LogSection::default(),
        };

        let err = engine_config(&config).expect_err("invalid limit");
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn valid_engine_section_translates() {
        let dispatch = engine_config(&Config::default()).expect("translate");
        assert_eq!(dispatch.max_fanout_targets, 128);
    }
}
