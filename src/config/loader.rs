//! Configuration loader with tier-based merging.

use super::types::Config;
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    Project = 1,
    User = 2,
    /// File named by `--config` or `EISENHOWER_CONFIG_PATH`, standing in for project and user.
    Explicit = 3,
    Environment = 4,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Explicit => write!(f, "explicit"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Where each tier's `config.yaml` lives.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Explicit config file; when set, the project and user tiers are skipped.
    pub explicit: Option<PathBuf>,
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover configuration paths from the environment.
    pub fn discover() -> Self {
        let explicit = std::env::var("EISENHOWER_CONFIG_PATH")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let project_dir = std::env::var("EISENHOWER_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("eisenhower")));

        let user_dir = std::env::var("EISENHOWER_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".eisenhower")));

        Self {
            explicit,
            project_dir,
            user_dir,
        }
    }

    /// Create paths with explicit tier directories.
    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            explicit: None,
            project_dir,
            user_dir,
        }
    }

    /// Use a single config file instead of the tier directories.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            explicit: Some(path.into()),
            project_dir: None,
            user_dir: None,
        }
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, with their tier.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load configuration from all tiers, reading overrides from the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(ConfigPaths::discover(), |key| std::env::var(key).ok())
    }

    /// Load configuration with explicit paths and the process environment.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        Self::load_with(paths, |key| std::env::var(key).ok())
    }

    /// Load configuration with explicit paths and an environment lookup.
    pub fn load_with<F>(paths: ConfigPaths, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut sources = Vec::new();
        let mut config = match &paths.explicit {
            Some(path) => {
                let config = Config::load(path)?;
                sources.push((ConfigTier::Explicit, path.clone()));
                config
            }
            None => {
                let mut merged = serde_json::to_value(Config::default())?;
                let tiers = [
                    (ConfigTier::Project, paths.project_dir.as_deref()),
                    (ConfigTier::User, paths.user_dir.as_deref()),
                ];
                for (tier, dir) in tiers {
                    let Some(file) = dir.map(|d| d.join("config.yaml")) else {
                        continue;
                    };
                    if let Some(layer) = read_layer(&file) {
                        debug!(tier = %tier, path = %file.display(), "Merging config layer");
                        merged = deep_merge(merged, layer);
                        sources.push((tier, file));
                    }
                }
                serde_json::from_value(merged)?
            }
        };

        apply_env_overrides(&mut config, env);

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Config files that were merged, lowest priority first.
    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

/// Read one tier's YAML. Missing files are skipped silently, unreadable ones with a warning.
fn read_layer(file: &Path) -> Option<Value> {
    if !file.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) => {
            warn!("Skipping config {}: {}", file.display(), e);
            return None;
        }
    };
    match serde_yaml::from_str::<Value>(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Skipping malformed config {}: {}", file.display(), e);
            None
        }
    }
}

/// Apply environment variable overrides to config.
fn apply_env_overrides<F>(config: &mut Config, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(db_path) = env("EISENHOWER_DB_PATH") {
        config.server.db_path = PathBuf::from(db_path);
    }
    if let Some(host) = env("EISENHOWER_HOST") {
        config.server.host = host;
    }
    if let Some(port) = env("PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!("Ignoring invalid PORT value '{}'", port),
        }
    }
    if let Some(dir) = env("EISENHOWER_STATIC_DIR") {
        config.server.static_dir = Some(PathBuf::from(dir));
    }
    if let Some(ms) = env("MOVE_DEBOUNCE_MS") {
        match ms.parse() {
            Ok(ms) => config.moves.debounce_ms = ms,
            Err(_) => warn!("Ignoring invalid MOVE_DEBOUNCE_MS value '{}'", ms),
        }
    }
}

/// Merge `overlay` into `base`: objects recursively, everything else replaced.
/// A `null` in the overlay means "not specified" and keeps the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &Path, yaml: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("config.yaml"), yaml).unwrap();
    }

    #[test]
    fn merge_is_field_by_field() {
        let merged = deep_merge(
            json!({"server": {"host": "a", "port": 1}, "moves": {"max_batch": 5}}),
            json!({"server": {"port": 2, "host": null}}),
        );
        assert_eq!(
            merged,
            json!({"server": {"host": "a", "port": 2}, "moves": {"max_batch": 5}})
        );
    }

    #[test]
    fn defaults_when_no_files() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );
        let loader = ConfigLoader::load_with(paths, no_env).unwrap();
        assert_eq!(loader.config().server.port, 3000);
        assert!(loader.sources().is_empty());
    }

    #[test]
    fn user_tier_overrides_project_tier() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("eisenhower");
        let user = temp.path().join("user");
        write_config(&project, "server:\n  port: 4000\n  host: 0.0.0.0\n");
        write_config(&user, "server:\n  port: 5000\n");

        let loader =
            ConfigLoader::load_with(ConfigPaths::with_dirs(Some(project), Some(user)), no_env)
                .unwrap();
        assert_eq!(loader.config().server.port, 5000);
        assert_eq!(loader.config().server.host, "0.0.0.0");
        assert_eq!(loader.sources().len(), 2);
    }

    #[test]
    fn malformed_layer_is_skipped() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("eisenhower");
        write_config(&project, "server: [unclosed");

        let loader =
            ConfigLoader::load_with(ConfigPaths::with_dirs(Some(project), None), no_env).unwrap();
        assert_eq!(loader.config().server.port, 3000);
    }

    #[test]
    fn explicit_file_replaces_tiers() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("eisenhower");
        write_config(&project, "server:\n  port: 4000\n");
        let explicit = temp.path().join("custom.yaml");
        std::fs::write(&explicit, "moves:\n  debounce_ms: 50\n").unwrap();

        let paths = ConfigPaths {
            explicit: Some(explicit.clone()),
            project_dir: Some(project),
            user_dir: None,
        };
        let loader = ConfigLoader::load_with(paths, no_env).unwrap();
        assert_eq!(loader.config().server.port, 3000);
        assert_eq!(loader.config().moves.debounce_ms, 50);
        assert_eq!(loader.sources(), [(ConfigTier::Explicit, explicit)]);
        assert_eq!(ConfigTier::Explicit.to_string(), "explicit");
    }

    #[test]
    fn environment_overrides_files() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("eisenhower");
        write_config(&project, "server:\n  port: 4000\n");

        let env: HashMap<&str, &str> = HashMap::from([
            ("PORT", "8081"),
            ("EISENHOWER_DB_PATH", "/tmp/board.db"),
            ("EISENHOWER_STATIC_DIR", "public"),
            ("MOVE_DEBOUNCE_MS", "not-a-number"),
        ]);
        let loader = ConfigLoader::load_with(ConfigPaths::with_dirs(Some(project), None), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        let config = loader.config();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.db_path, PathBuf::from("/tmp/board.db"));
        assert_eq!(config.server.static_dir, Some(PathBuf::from("public")));
        assert_eq!(config.moves.debounce_ms, 200);
    }
}
