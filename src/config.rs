use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_HEIGHT: u16 = 10;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HistoryConfig {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_height() -> u16 {
    DEFAULT_HEIGHT
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_height")]
    pub height: u16,
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            height: DEFAULT_HEIGHT,
            show_timestamps: true,
        }
    }
}

impl HistoryConfig {
    /// The configured history path with a leading `~` expanded.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.as_deref().and_then(expand_home_shorthand)
    }
}

/// Explicit path, then `./histfind.toml`, then the per-user config file.
/// A missing file means defaults.
pub fn load(cwd: &Path, explicit_path: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit_path {
        return Ok(LoadedConfig {
            config: load_from_path(path)?,
            path: Some(path.to_path_buf()),
        });
    }

    let local = cwd.join("histfind.toml");
    if local.exists() {
        return Ok(LoadedConfig {
            config: load_from_path(&local)?,
            path: Some(local),
        });
    }

    if let Some(global) = global_config_path() {
        if global.exists() {
            return Ok(LoadedConfig {
                config: load_from_path(&global)?,
                path: Some(global),
            });
        }
    }

    Ok(LoadedConfig {
        config: Config::default(),
        path: None,
    })
}

pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|root| root.join("histfind").join("config.toml"))
}

fn load_from_path(path: &Path) -> Result<Config> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
}

fn expand_home_shorthand(raw_path: &str) -> Option<PathBuf> {
    if raw_path != "~" && !raw_path.starts_with("~/") {
        return Some(PathBuf::from(raw_path));
    }

    let home = dirs::home_dir()?;
    if raw_path == "~" {
        return Some(home);
    }
    Some(home.join(raw_path.trim_start_matches("~/")))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert!(cfg.history.path.is_none());
        assert!(cfg.history.exclude.is_empty());
        assert!(cfg.history.include.is_empty());
        assert!(!cfg.history.case_sensitive);
        assert_eq!(cfg.ui.height, DEFAULT_HEIGHT);
        assert!(cfg.ui.show_timestamps);
    }

    #[test]
    fn parses_all_sections() {
        let raw = r#"
[history]
path = "/var/tmp/hist"
include = ["/^git /"]
exclude = ["ls", "cd *"]
case_sensitive = true

[ui]
height = 4
show_timestamps = false
"#;
        let cfg: Config = toml::from_str(raw).unwrap();
        assert_eq!(cfg.history.resolved_path(), Some(PathBuf::from("/var/tmp/hist")));
        assert_eq!(cfg.history.include, vec!["/^git /".to_string()]);
        assert_eq!(cfg.history.exclude, vec!["ls".to_string(), "cd *".to_string()]);
        assert!(cfg.history.case_sensitive);
        assert_eq!(cfg.ui.height, 4);
        assert!(!cfg.ui.show_timestamps);
    }

    #[test]
    fn expands_home_shorthand_path() {
        let home = dirs::home_dir().unwrap();
        let cfg = HistoryConfig {
            path: Some("~/.bash_history".to_string()),
            ..HistoryConfig::default()
        };
        assert_eq!(cfg.resolved_path(), Some(home.join(".bash_history")));
    }

    #[test]
    fn explicit_path_wins_and_bad_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.toml");
        fs::write(&good, "[ui]\nheight = 3\n").unwrap();
        let loaded = load(dir.path(), Some(&good)).unwrap();
        assert_eq!(loaded.config.ui.height, 3);
        assert_eq!(loaded.path.as_deref(), Some(good.as_path()));

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[ui\nheight = ").unwrap();
        let err = load(dir.path(), Some(&bad)).unwrap_err();
        assert!(format!("{err:#}").contains("invalid TOML"));
    }

    #[test]
    fn local_file_is_picked_up_from_cwd() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("histfind.toml"), "[history]\nexclude = [\"pwd\"]\n").unwrap();
        let loaded = load(dir.path(), None).unwrap();
        assert_eq!(loaded.config.history.exclude, vec!["pwd".to_string()]);
    }
}
