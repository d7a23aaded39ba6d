//! Layered configuration: defaults, then `lantern.toml`, then `LANTERN_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use lantern_js_runtime::{EngineOptions, DEFAULT_HTTP_TIMEOUT};

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "lantern.toml";

/// Prefix for environment overrides. Nested keys use `__`, e.g.
/// `LANTERN_RUNTIME__HTTP_TIMEOUT_SECS`.
pub const ENV_PREFIX: &str = "LANTERN_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for `*.js` plugins.
    pub plugin_dir: PathBuf,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// YAML file seeding the in-memory object store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixtures: Option<PathBuf>,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub http_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from("./plugins"),
            log_filter: "lantern=info,lantern_js_runtime=info".to_string(),
            fixtures: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
            memory_limit: None,
            max_stack_size: None,
        }
    }
}

impl RuntimeConfig {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            memory_limit: self.memory_limit,
            max_stack_size: self.max_stack_size,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Config {
    /// The provider stack. `file` falls back to [`DEFAULT_CONFIG_FILE`], which
    /// may be absent.
    pub fn figment(file: Option<&Path>) -> Figment {
        let file = file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration. An explicitly named file must exist.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        if let Some(path) = file {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
        }
        Self::figment(file)
            .extract()
            .context("Failed to load configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("lantern.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "");
        let config = Config::load(Some(path.as_path())).unwrap();

        assert_eq!(config.plugin_dir, PathBuf::from("./plugins"));
        assert_eq!(config.log_filter, "lantern=info,lantern_js_runtime=info");
        assert_eq!(config.fixtures, None);
        assert_eq!(config.runtime.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.runtime.engine_options().memory_limit, None);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
plugin_dir = "/srv/plugins"
fixtures = "cluster.yaml"

[runtime]
http_timeout_secs = 3
memory_limit = 67108864
"#,
        );
        let config = Config::load(Some(path.as_path())).unwrap();

        assert_eq!(config.plugin_dir, PathBuf::from("/srv/plugins"));
        assert_eq!(config.fixtures, Some(PathBuf::from("cluster.yaml")));
        assert_eq!(config.log_filter, "lantern=info,lantern_js_runtime=info");
        assert_eq!(config.runtime.http_timeout(), Duration::from_secs(3));

        let options = config.runtime.engine_options();
        assert_eq!(options.memory_limit, Some(64 * 1024 * 1024));
        assert_eq!(options.max_stack_size, None);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[runtime]\nhttp_timeout_secs = \"soon\"\n");
        assert!(Config::load(Some(path.as_path())).is_err());
    }
}
