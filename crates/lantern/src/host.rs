// Plugin host - discovers, resolves and loads plugins for the CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use lantern_js_runtime::{
    is_javascript_plugin, JsPlugin, MemoryStore, PluginError, PluginServices, ReqwestTransport,
};

use crate::config::Config;

/// Namespace given to fixture objects that do not name one.
pub const FIXTURE_NAMESPACE: &str = "default";

/// Everything needed to load plugins: configuration plus the shared services.
pub struct Host {
    config: Config,
    store: Arc<MemoryStore>,
    services: PluginServices,
}

impl Host {
    /// Build the host, seeding the object store from the configured fixtures.
    pub async fn new(config: Config) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        if let Some(path) = &config.fixtures {
            let count = load_fixtures(&store, path).await?;
            tracing::info!("Seeded {} objects from {}", count, path.display());
        }

        let services = PluginServices::new(store.clone())
            .with_http(Arc::new(ReqwestTransport::new(config.runtime.http_timeout())));

        Ok(Self {
            config,
            store,
            services,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// All plugin scripts in the plugin directory.
    pub async fn discover(&self) -> Result<Vec<PathBuf>> {
        discover_plugins(&self.config.plugin_dir).await
    }

    /// Resolve a plugin reference: a path to a script, or the file stem of a
    /// script in the plugin directory.
    pub fn resolve(&self, plugin: &str) -> Result<PathBuf> {
        let direct = PathBuf::from(plugin);
        if direct.is_file() {
            return Ok(direct);
        }

        let in_dir = self.config.plugin_dir.join(format!("{plugin}.js"));
        if in_dir.is_file() {
            return Ok(in_dir);
        }

        bail!(
            "plugin {} not found (looked for {} and {})",
            plugin,
            direct.display(),
            in_dir.display()
        )
    }

    pub async fn load(&self, path: &Path) -> Result<JsPlugin, PluginError> {
        JsPlugin::load(path, self.services.clone(), self.config.runtime.engine_options()).await
    }

    /// Resolve and load in one step.
    pub async fn open(&self, plugin: &str) -> Result<JsPlugin> {
        let path = self.resolve(plugin)?;
        self.load(&path)
            .await
            .with_context(|| format!("Failed to load plugin {}", path.display()))
    }
}

/// Scan a directory for JavaScript plugins
///
/// Only immediate `*.js` files are considered. A missing directory yields an
/// empty list.
///
/// # Example
/// ```text
/// plugins/
/// ├── sample.js     <- Found
/// ├── notes.txt
/// └── vendor/
///     └── lib.js
/// ```
pub async fn discover_plugins(plugins_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut discovered = Vec::new();

    if !plugins_dir.exists() {
        tracing::debug!("Plugins directory does not exist: {}", plugins_dir.display());
        return Ok(discovered);
    }

    let mut entries = tokio::fs::read_dir(plugins_dir)
        .await
        .with_context(|| format!("Failed to read {}", plugins_dir.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        if !path.is_file() || !is_javascript_plugin(&path) {
            continue;
        }

        tracing::debug!("Discovered plugin at {}", path.display());
        discovered.push(path);
    }

    discovered.sort();
    Ok(discovered)
}

/// Apply every object in a YAML fixtures file to `store`.
pub async fn load_fixtures(store: &MemoryStore, path: &Path) -> Result<usize> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read fixtures {}", path.display()))?;
    let applied = store
        .apply_yaml(&yaml, FIXTURE_NAMESPACE)
        .with_context(|| format!("Invalid fixtures in {}", path.display()))?;
    Ok(applied.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_types::Key;
    use lantern_js_runtime::ObjectStore;
    use tempfile::TempDir;

    const PLUGIN: &str = r#"
class Fixture {
  constructor(dashboardClient) {
    this.client = dashboardClient;
    this.name = "fixture";
    this.description = "Reads fixtures";
    this.capabilities = {};
  }
  navigationHandler() {
    const pods = this.client.List({ apiVersion: "v1", kind: "Pod" });
    return { title: "Pods: " + pods.length, path: "fixture" };
  }
}
module.exports.default = Fixture;
"#;

    const FIXTURES: &str = r#"
apiVersion: v1
kind: Pod
metadata:
  name: web
---
apiVersion: v1
kind: Pod
metadata:
  name: db
"#;

    fn config_for(dir: &TempDir) -> Config {
        Config {
            plugin_dir: dir.path().join("plugins"),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_discover_plugins() {
        let temp = TempDir::new().unwrap();
        let plugins_dir = temp.path();

        std::fs::write(plugins_dir.join("b.js"), PLUGIN).unwrap();
        std::fs::write(plugins_dir.join("a.js"), PLUGIN).unwrap();
        std::fs::write(plugins_dir.join("notes.txt"), "not a plugin").unwrap();
        std::fs::create_dir(plugins_dir.join("vendor.js")).unwrap();

        let discovered = discover_plugins(plugins_dir).await.unwrap();
        assert_eq!(
            discovered,
            vec![plugins_dir.join("a.js"), plugins_dir.join("b.js")]
        );
    }

    #[tokio::test]
    async fn test_discover_missing_directory() {
        let temp = TempDir::new().unwrap();
        let discovered = discover_plugins(&temp.path().join("absent")).await.unwrap();
        assert!(discovered.is_empty());
    }

    #[tokio::test]
    async fn test_fixtures_seed_store() {
        let temp = TempDir::new().unwrap();
        let fixtures = temp.path().join("cluster.yaml");
        std::fs::write(&fixtures, FIXTURES).unwrap();

        let host = Host::new(Config {
            fixtures: Some(fixtures),
            ..config_for(&temp)
        })
        .await
        .unwrap();

        assert_eq!(host.store().len(), 2);
        let web = host
            .store()
            .get(&Key::new("v1", "Pod").with_namespace(FIXTURE_NAMESPACE).with_name("web"))
            .await
            .unwrap();
        assert!(web.is_some());
    }

    #[tokio::test]
    async fn test_missing_fixtures_fail() {
        let temp = TempDir::new().unwrap();
        let result = Host::new(Config {
            fixtures: Some(temp.path().join("absent.yaml")),
            ..config_for(&temp)
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_by_stem_and_path() {
        let temp = TempDir::new().unwrap();
        let config = config_for(&temp);
        std::fs::create_dir_all(&config.plugin_dir).unwrap();
        let script = config.plugin_dir.join("fixture.js");
        std::fs::write(&script, PLUGIN).unwrap();

        let host = Host::new(config).await.unwrap();
        assert_eq!(host.resolve("fixture").unwrap(), script);
        assert_eq!(host.resolve(script.to_str().unwrap()).unwrap(), script);
        assert!(host.resolve("missing").is_err());
    }

    #[tokio::test]
    async fn test_open_plugin_sees_fixtures() {
        let temp = TempDir::new().unwrap();
        let fixtures = temp.path().join("cluster.yaml");
        std::fs::write(&fixtures, FIXTURES).unwrap();
        let config = Config {
            fixtures: Some(fixtures),
            ..config_for(&temp)
        };
        std::fs::create_dir_all(&config.plugin_dir).unwrap();
        std::fs::write(config.plugin_dir.join("fixture.js"), PLUGIN).unwrap();

        let host = Host::new(config).await.unwrap();
        let plugin = host.open("fixture").await.unwrap();
        assert_eq!(plugin.name(), "fixture");

        let nav = plugin.navigation().await.unwrap();
        assert_eq!(nav.title, "Pods: 2");
    }
}
