use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default haven data directory: `$HAVEN_HOME` or `~/.haven`.
pub fn get_haven_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(v) = std::env::var("HAVEN_HOME") {
        if !v.trim().is_empty() {
            return Ok(PathBuf::from(v));
        }
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".haven"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: <data dir>/config.toml (highest)
    let haven_dir = get_haven_data_dir()?;
    let haven_config = haven_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg: AppConfig = if haven_config.exists() {
        let s = std::fs::read_to_string(&haven_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else {
        AppConfig::default()
    };

    if cfg.storage.data_dir.trim().is_empty() {
        cfg.storage.data_dir = haven_dir.to_string_lossy().to_string();
    }

    if cfg
        .logging
        .directory
        .as_ref()
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
    {
        cfg.logging.directory = Some(haven_dir.join("logs").to_string_lossy().to_string());
    }

    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

/// Environment variable overrides (Priority 0: highest).
///
/// Runs before logging is initialised, so a malformed value is returned as an
/// error instead of being logged.
pub fn apply_env_overrides(cfg: &mut AppConfig) -> anyhow::Result<()> {
    apply_overrides_from(cfg, |name| std::env::var(name).ok())
}

fn apply_overrides_from<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("HAVEN_STATE_PATH") {
        cfg.storage.state_path = v;
    }
    if let Some(v) = non_empty("HAVEN_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = non_empty("HAVEN_NETWORK_WAIT_TIMEOUT_MS") {
        cfg.session.network_wait_timeout_ms = v.trim().parse::<u64>().map_err(|e| {
            anyhow::anyhow!("invalid HAVEN_NETWORK_WAIT_TIMEOUT_MS={v:?}: {e}")
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn apply(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut cfg = AppConfig::default();
        apply_overrides_from(&mut cfg, |name| vars.get(name).cloned())?;
        Ok(cfg)
    }

    #[test]
    fn overrides_replace_configured_values() {
        let cfg = apply(&[
            ("HAVEN_STATE_PATH", "/tmp/state"),
            ("HAVEN_LOG_LEVEL", "debug"),
            ("HAVEN_NETWORK_WAIT_TIMEOUT_MS", " 5000 "),
        ])
        .unwrap();
        assert_eq!(cfg.storage.state_path, "/tmp/state");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.session.network_wait_timeout_ms, 5_000);
    }

    #[test]
    fn blank_values_are_ignored() {
        let cfg = apply(&[("HAVEN_LOG_LEVEL", "  ")]).unwrap();
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn malformed_timeout_is_an_error() {
        let err = apply(&[("HAVEN_NETWORK_WAIT_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("HAVEN_NETWORK_WAIT_TIMEOUT_MS"));
    }
}
