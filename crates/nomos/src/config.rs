//! Compiler configuration file.
//!
//! ```yaml
//! clusterName: prod-1
//! namespacesDir: namespaces
//! discoveryFile: discovery.yaml
//! watch:
//!   debounceMs: 500
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::{CLUSTER_DIR, CLUSTER_REGISTRY_DIR, DEFAULT_NAMESPACES_DIR, SYSTEM_DIR};
use crate::discovery::Discovery;
use crate::error::{NomosError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Cluster to compile for; ClusterSelectors are evaluated against its
    /// labels.
    #[serde(default)]
    pub cluster_name: Option<String>,

    /// Name of the top-level directory holding the namespace tree.
    #[serde(default = "default_namespaces_dir")]
    pub namespaces_dir: String,

    /// Discovery document listing the kinds the cluster serves. Relative
    /// paths are resolved against the config file's directory.
    #[serde(default)]
    pub discovery_file: Option<PathBuf>,

    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_namespaces_dir() -> String {
    DEFAULT_NAMESPACES_DIR.to_string()
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            cluster_name: None,
            namespaces_dir: default_namespaces_dir(),
            discovery_file: None,
            watch: WatchConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl CompilerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| NomosError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&content, path)
    }

    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self> {
        let config: CompilerConfig =
            serde_yaml::from_str(content).map_err(|e| NomosError::ParseConfig {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let dir = self.namespaces_dir.as_str();
        if dir.is_empty() || dir.contains('/') || dir.starts_with('.') {
            return Err(NomosError::ParseConfig {
                path: path.to_path_buf(),
                message: format!("namespacesDir must be a single directory name, got '{}'", dir),
            });
        }
        if [SYSTEM_DIR, CLUSTER_DIR, CLUSTER_REGISTRY_DIR].contains(&dir) {
            return Err(NomosError::ParseConfig {
                path: path.to_path_buf(),
                message: format!("namespacesDir '{}' collides with a reserved directory", dir),
            });
        }
        if self.watch.debounce_ms == 0 {
            return Err(NomosError::ParseConfig {
                path: path.to_path_buf(),
                message: "watch.debounceMs must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the configuration into compile options, loading the
    /// discovery document if one is named.
    pub fn to_options(&self, base_dir: &Path) -> Result<CompileOptions> {
        let discovery = match &self.discovery_file {
            Some(file) if file.is_absolute() => Some(Discovery::load(file)?),
            Some(file) => Some(Discovery::load(&base_dir.join(file))?),
            None => None,
        };
        Ok(CompileOptions {
            cluster_name: self.cluster_name.clone(),
            namespaces_dir: self.namespaces_dir.clone(),
            discovery,
        })
    }
}

/// Inputs to one compile besides the policy tree itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub cluster_name: Option<String>,
    pub namespaces_dir: String,
    /// Caller-supplied discovery data. Without it only scope checks against
    /// built-in kinds are made.
    pub discovery: Option<Discovery>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            cluster_name: None,
            namespaces_dir: DEFAULT_NAMESPACES_DIR.to_string(),
            discovery: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::from_yaml_str("{}", Path::new("nomos.yaml")).unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.namespaces_dir, "namespaces");
        assert_eq!(config.watch.debounce_ms, 500);
    }

    #[test]
    fn test_parse_camel_case() {
        let yaml = "clusterName: prod-1\nnamespacesDir: tree\nwatch:\n  debounceMs: 50\n";
        let config = CompilerConfig::from_yaml_str(yaml, Path::new("nomos.yaml")).unwrap();
        assert_eq!(config.cluster_name.as_deref(), Some("prod-1"));
        assert_eq!(config.namespaces_dir, "tree");
        assert_eq!(config.watch.debounce_ms, 50);
    }

    #[test]
    fn test_rejects_bad_namespaces_dir() {
        for dir in ["system", "a/b", "", ".hidden"] {
            let yaml = format!("namespacesDir: '{}'\n", dir);
            let err = CompilerConfig::from_yaml_str(&yaml, Path::new("nomos.yaml")).unwrap_err();
            assert!(matches!(err, NomosError::ParseConfig { .. }), "{}", dir);
        }
    }

    #[test]
    fn test_to_options_loads_relative_discovery() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("discovery.yaml"),
            "resources:\n  - version: v1\n    kind: ConfigMap\n",
        )
        .unwrap();
        let config = CompilerConfig {
            discovery_file: Some(PathBuf::from("discovery.yaml")),
            ..Default::default()
        };
        let options = config.to_options(dir.path()).unwrap();
        assert_eq!(options.discovery.map(|d| d.len()), Some(1));
    }

    #[test]
    fn test_to_options_missing_discovery() {
        let dir = TempDir::new().unwrap();
        let config = CompilerConfig {
            discovery_file: Some(PathBuf::from("missing.yaml")),
            ..Default::default()
        };
        assert!(matches!(
            config.to_options(dir.path()),
            Err(NomosError::ReadFile { .. })
        ));
    }
}
