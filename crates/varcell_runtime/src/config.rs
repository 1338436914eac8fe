//! Runtime configuration system
//!
//! Configuration for the variable-cell runtime: which reference counting
//! mode the deployment expects and whether claim statistics are collected.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use varcell_metrics::get_profiler;

use crate::sync::RefcountMode;

/// Default configuration file looked up by the global manager
pub const DEFAULT_CONFIG_FILE: &str = "varcell.toml";

/// Complete runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Cell behaviour
    pub cells: CellConfig,

    /// Claim statistics
    pub profiling: ProfilingConfig,
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source shaped like the
    /// environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            cells: CellConfig::from_lookup(&lookup),
            profiling: ProfilingConfig::from_lookup(&lookup),
        }
    }

    /// Load configuration from TOML file
    #[cfg(feature = "toml-config")]
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn from_file(_path: &Path) -> anyhow::Result<Self> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Save configuration to TOML file
    #[cfg(feature = "toml-config")]
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Save configuration to TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn save_to_file(&self, _path: &Path) -> anyhow::Result<()> {
        anyhow::bail!("TOML support not enabled. Enable the 'toml-config' feature.")
    }

    /// Merge with environment variables (env vars take precedence)
    pub fn merge_with_env(self) -> Self {
        self.merge_with_lookup(|key| std::env::var(key).ok())
    }

    pub fn merge_with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let overrides = Self::from_lookup(&lookup);

        if lookup(ENV_REFCOUNT_MODE).is_some() {
            self.cells.refcount_mode = overrides.cells.refcount_mode;
        }

        if lookup(ENV_PROFILE).is_some() {
            self.profiling.enabled = overrides.profiling.enabled;
        }

        if lookup(ENV_PROFILE_REPORT).is_some() {
            self.profiling.report_on_shutdown = overrides.profiling.report_on_shutdown;
        }

        self
    }

    /// Check the configuration against this build
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(expected) = self.cells.refcount_mode {
            let active = RefcountMode::active();
            anyhow::ensure!(
                expected == active,
                "configuration expects {expected} reference counts but the runtime was built \
                 with {active}; toggle the 'atomic-refcount' feature"
            );
        }
        Ok(())
    }

    /// Push the configuration into the process-wide services
    pub fn apply(&self) {
        let profiler = get_profiler();
        if self.profiling.enabled {
            profiler.enable();
        } else {
            profiler.disable();
        }
        tracing::debug!(
            refcount_mode = %RefcountMode::active(),
            profiling = self.profiling.enabled,
            "variable cell runtime configured"
        );
    }
}

const ENV_REFCOUNT_MODE: &str = "VARCELL_REFCOUNT_MODE";
const ENV_PROFILE: &str = "VARCELL_PROFILE";
const ENV_PROFILE_REPORT: &str = "VARCELL_PROFILE_REPORT";

/// Cell configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CellConfig {
    /// Reference counting mode the execution model requires. `None` accepts
    /// whatever the runtime was built with.
    pub refcount_mode: Option<RefcountMode>,
}

impl CellConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup(ENV_REFCOUNT_MODE)
            && let Ok(mode) = val.parse()
        {
            config.refcount_mode = Some(mode);
        }

        config
    }
}

/// Profiling configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProfilingConfig {
    /// Collect claim statistics per cell kind
    pub enabled: bool,

    /// Log the statistics summary when the runtime shuts down
    pub report_on_shutdown: bool,
}

impl ProfilingConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup(ENV_PROFILE) {
            config.enabled = val.parse().unwrap_or(true);
        }

        if let Some(val) = lookup(ENV_PROFILE_REPORT) {
            config.report_on_shutdown = val.parse().unwrap_or(true);
        }

        config
    }
}

/// Global runtime configuration manager
pub struct ConfigManager {
    config: Arc<RwLock<RuntimeConfig>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(RuntimeConfig::default())),
        }
    }

    /// Initialize from environment and optional config file
    pub fn init(&self, config_file: Option<PathBuf>) -> anyhow::Result<()> {
        let config = if let Some(path) = config_file {
            RuntimeConfig::from_file(&path)?
        } else {
            RuntimeConfig::default()
        };

        let config = config.merge_with_env();
        config.validate()?;

        *self.config.write() = config;
        Ok(())
    }

    /// Get current configuration
    pub fn get(&self) -> RuntimeConfig {
        self.config.read().clone()
    }

    /// Update configuration
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut RuntimeConfig),
    {
        let mut config = self.config.write();
        f(&mut config);
    }

    /// Get profiling config
    pub fn profiling(&self) -> ProfilingConfig {
        self.config.read().profiling.clone()
    }

    /// Check if profiling is enabled
    pub fn is_profiling_enabled(&self) -> bool {
        self.config.read().profiling.enabled
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Global configuration manager instance
static GLOBAL_CONFIG: once_cell::sync::Lazy<ConfigManager> = once_cell::sync::Lazy::new(|| {
    let manager = ConfigManager::new();
    let default_config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    let config_file = (cfg!(feature = "toml-config") && default_config_path.exists())
        .then_some(default_config_path);
    if let Err(err) = manager.init(config_file) {
        tracing::warn!(error = %err, "falling back to default variable cell configuration");
    }
    manager
});

/// Get the global configuration manager
pub fn get_config() -> &'static ConfigManager {
    &GLOBAL_CONFIG
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert!(config.cells.refcount_mode.is_none());
        assert!(!config.profiling.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = RuntimeConfig::from_lookup(vars(&[
            ("VARCELL_REFCOUNT_MODE", "atomic"),
            ("VARCELL_PROFILE", "true"),
            ("VARCELL_PROFILE_REPORT", "not-a-bool"),
        ]));
        assert_eq!(config.cells.refcount_mode, Some(RefcountMode::Atomic));
        assert!(config.profiling.enabled);
        assert!(config.profiling.report_on_shutdown);
    }

    #[test]
    fn test_unknown_mode_is_ignored() {
        let config = CellConfig::from_lookup(vars(&[("VARCELL_REFCOUNT_MODE", "quantum")]));
        assert!(config.refcount_mode.is_none());
    }

    #[test]
    fn test_merge_only_overrides_present_keys() {
        let base = RuntimeConfig {
            profiling: ProfilingConfig {
                enabled: true,
                report_on_shutdown: true,
            },
            ..Default::default()
        };
        let merged = base.merge_with_lookup(vars(&[("VARCELL_PROFILE", "false")]));
        assert!(!merged.profiling.enabled);
        assert!(merged.profiling.report_on_shutdown);
    }

    #[test]
    fn test_validate_rejects_mismatched_mode() {
        let other = match RefcountMode::active() {
            RefcountMode::Plain => RefcountMode::Atomic,
            RefcountMode::Atomic => RefcountMode::Plain,
        };
        let mut config = RuntimeConfig::default();
        config.cells.refcount_mode = Some(other);
        assert!(config.validate().is_err());

        config.cells.refcount_mode = Some(RefcountMode::active());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = RuntimeConfig::default();
        config.cells.refcount_mode = Some(RefcountMode::Plain);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RuntimeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);

        let partial: RuntimeConfig = serde_json::from_str(r#"{"profiling":{"enabled":true}}"#).unwrap();
        assert!(partial.profiling.enabled);
        assert!(partial.cells.refcount_mode.is_none());
    }

    #[test]
    #[cfg(feature = "toml-config")]
    fn test_toml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        let mut config = RuntimeConfig::default();
        config.profiling.enabled = true;
        config.save_to_file(&path).unwrap();

        let loaded = RuntimeConfig::from_file(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    #[cfg(not(feature = "toml-config"))]
    fn test_from_file_without_toml_support() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RuntimeConfig::from_file(&dir.path().join(DEFAULT_CONFIG_FILE)).is_err());
    }

    #[test]
    fn test_config_manager() {
        let manager = ConfigManager::new();
        manager.update(|config| config.profiling.enabled = true);
        assert!(manager.is_profiling_enabled());
        assert!(manager.profiling().enabled);
        assert!(manager.get().validate().is_ok());
    }
}
