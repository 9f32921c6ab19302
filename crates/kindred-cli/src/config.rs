//! Configuration Vault – reads/writes `~/.kindred/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use kindred_runtime::OrchestratorConfig;

/// Persisted user configuration stored in `~/.kindred/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Flush ledger and identity snapshots every Nth cycle (0 disables).
    #[serde(default = "default_flush_every")]
    pub flush_every: u64,

    /// Bound of the retained-fact store.
    #[serde(default = "default_fact_capacity")]
    pub fact_capacity: usize,

    /// Days of inactivity before a non-pinned identity is forgotten.
    #[serde(default = "default_forget_window_days")]
    pub forget_window_days: i64,

    /// Accepted exposures required before an attribute unlocks.
    #[serde(default = "default_unlock_threshold")]
    pub unlock_threshold: u32,
}

fn default_flush_every() -> u64 {
    10
}
fn default_fact_capacity() -> usize {
    32
}
fn default_forget_window_days() -> i64 {
    30
}
fn default_unlock_threshold() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flush_every: default_flush_every(),
            fact_capacity: default_fact_capacity(),
            forget_window_days: default_forget_window_days(),
            unlock_threshold: default_unlock_threshold(),
        }
    }
}

impl Config {
    /// Build the runtime configuration, pointing the snapshots into
    /// `data_dir`.
    pub fn orchestrator_config(&self, data_dir: &PathBuf) -> OrchestratorConfig {
        OrchestratorConfig {
            unlock_threshold: self.unlock_threshold,
            fact_capacity: self.fact_capacity,
            forget_window_days: self.forget_window_days,
            flush_every: self.flush_every,
            ledger_path: Some(data_dir.join("ledger.toml")),
            identity_path: Some(data_dir.join("identities.toml")),
        }
    }
}

/// Return the path to the `~/.kindred` data directory.
pub fn data_dir() -> PathBuf {
    data_dir_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the data directory relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn data_dir_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".kindred")
}

/// Return the path to `~/.kindred/config.toml`.
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `KINDRED_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `KINDRED_FLUSH_EVERY` | `flush_every` |
/// | `KINDRED_FACT_CAPACITY` | `fact_capacity` |
/// | `KINDRED_FORGET_DAYS` | `forget_window_days` |
/// | `KINDRED_UNLOCK_THRESHOLD` | `unlock_threshold` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("KINDRED_FLUSH_EVERY")
        && let Ok(n) = v.parse::<u64>()
    {
        cfg.flush_every = n;
    }
    if let Ok(v) = std::env::var("KINDRED_FACT_CAPACITY")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.fact_capacity = n;
    }
    if let Ok(v) = std::env::var("KINDRED_FORGET_DAYS")
        && let Ok(n) = v.parse::<i64>()
    {
        cfg.forget_window_days = n;
    }
    if let Ok(v) = std::env::var("KINDRED_UNLOCK_THRESHOLD")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.unlock_threshold = n;
    }
}

/// Save the config to disk, creating `~/.kindred/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Restrict the data directory to the owner only (rwx------) on Unix;
        // it holds the identity snapshots.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = data_dir_for_home(&dir.path().to_string_lossy()).join("config.toml");

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.flush_every, 10);
        assert_eq!(loaded.fact_capacity, 32);
        assert_eq!(loaded.forget_window_days, 30);
        assert_eq!(loaded.unlock_threshold, 5);
    }

    #[test]
    fn data_dir_points_to_kindred_dir() {
        let p = data_dir_for_home("/home/testuser");
        assert!(p.to_string_lossy().ends_with(".kindred"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        let result = load_from(&path).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn load_from_rejects_invalid_toml() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "flush_every = [broken").expect("write");
        assert!(load_from(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn data_directory_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = data_dir_for_home(&dir.path().to_string_lossy()).join("config.toml");

        save_to(&Config::default(), &path).expect("save");

        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        let dir_mode = dir_meta.permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700, "data directory must have 0o700 permissions");
    }

    #[test]
    fn apply_env_overrides_changes_flush_every() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("KINDRED_FLUSH_EVERY", "3") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.flush_every, 3);
        unsafe { std::env::remove_var("KINDRED_FLUSH_EVERY") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_value() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("KINDRED_FACT_CAPACITY", "lots") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.fact_capacity, 32);
        unsafe { std::env::remove_var("KINDRED_FACT_CAPACITY") };
    }

    #[test]
    fn orchestrator_config_points_snapshots_into_data_dir() {
        let cfg = Config::default();
        let dir = PathBuf::from("/tmp/kindred-test");
        let oc = cfg.orchestrator_config(&dir);
        assert_eq!(oc.ledger_path.unwrap(), dir.join("ledger.toml"));
        assert_eq!(oc.identity_path.unwrap(), dir.join("identities.toml"));
        assert_eq!(oc.flush_every, 10);
    }
}
