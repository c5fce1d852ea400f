use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use loto7_engine::analyzer::DEFAULT_RECENT_WINDOW;
use loto7_engine::config::FilterConfig;
use loto7_engine::generator::DEFAULT_MAX_ATTEMPTS;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Fichier de configuration TOML optionnel. Les options CLI et variables
/// d'environnement priment sur son contenu.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: Option<PathBuf>,
    pub bind: Option<String>,
    pub recent_window: usize,
    pub max_attempts: u64,
    pub filters: FilterConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            bind: None,
            recent_window: DEFAULT_RECENT_WINDOW,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            filters: FilterConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Configuration TOML invalide")?;
        config
            .filters
            .validate()
            .context("Section [filters] invalide")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Impossible de lire {:?}", path))?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "configuration chargée");
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.filters.sum_min, 100);
    }

    #[test]
    fn test_partial_filters_table() {
        let config = AppConfig::parse(
            r#"
            db_path = "/tmp/loto7.db"
            recent_window = 20

            [filters]
            sum_min = 110
            pull_weight = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/loto7.db")));
        assert_eq!(config.recent_window, 20);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.filters.sum_min, 110);
        assert_eq!(config.filters.sum_max, 170);
        assert_eq!(config.filters.pull_weight, 0.0);
    }

    #[test]
    fn test_invalid_filters_rejected() {
        let err = AppConfig::parse("[filters]\nsum_min = 180\nsum_max = 120\n").unwrap_err();
        assert!(format!("{err:#}").contains("[filters]"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(&dir.path().join("absent.toml")).is_err());
        assert_eq!(AppConfig::load_or_default(None).unwrap(), AppConfig::default());
    }
}
