//! Knowledge of which kinds a cluster serves and at what scope.
//!
//! Without caller-supplied discovery data a built-in table of core kinds
//! is used for scope checks only; unknown kinds and unknown sync targets
//! are reported only when discovery data is supplied.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::{NomosError, Result};
use crate::resource::{GroupKind, GroupVersionKind};

/// One served resource, as listed in a discovery document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    #[serde(default = "default_namespaced")]
    pub namespaced: bool,
}

fn default_namespaced() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    resources: Vec<ApiResource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Namespaced,
    Cluster,
}

#[derive(Debug, Clone, PartialEq)]
struct ServedKind {
    scope: Scope,
    versions: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    kinds: BTreeMap<GroupKind, ServedKind>,
}

impl Discovery {
    pub fn new(resources: impl IntoIterator<Item = ApiResource>) -> Self {
        let mut kinds: BTreeMap<GroupKind, ServedKind> = BTreeMap::new();
        for resource in resources {
            let scope = if resource.namespaced {
                Scope::Namespaced
            } else {
                Scope::Cluster
            };
            kinds
                .entry(GroupKind::new(resource.group, resource.kind))
                .or_insert_with(|| ServedKind {
                    scope,
                    versions: BTreeSet::new(),
                })
                .versions
                .insert(resource.version);
        }
        Self { kinds }
    }

    /// Core Kubernetes kinds and their scopes.
    pub fn builtin() -> Self {
        const NAMESPACED: &[(&str, &str, &str)] = &[
            ("", "v1", "ConfigMap"),
            ("", "v1", "Secret"),
            ("", "v1", "ServiceAccount"),
            ("", "v1", "Service"),
            ("", "v1", "Pod"),
            ("", "v1", "ResourceQuota"),
            ("", "v1", "LimitRange"),
            ("", "v1", "PersistentVolumeClaim"),
            ("apps", "v1", "Deployment"),
            ("apps", "v1", "StatefulSet"),
            ("apps", "v1", "DaemonSet"),
            ("apps", "v1", "ReplicaSet"),
            ("batch", "v1", "Job"),
            ("batch", "v1", "CronJob"),
            ("rbac.authorization.k8s.io", "v1", "Role"),
            ("rbac.authorization.k8s.io", "v1", "RoleBinding"),
            ("networking.k8s.io", "v1", "NetworkPolicy"),
            ("networking.k8s.io", "v1", "Ingress"),
            ("policy", "v1", "PodDisruptionBudget"),
        ];
        const CLUSTER: &[(&str, &str, &str)] = &[
            ("", "v1", "Namespace"),
            ("", "v1", "Node"),
            ("", "v1", "PersistentVolume"),
            ("rbac.authorization.k8s.io", "v1", "ClusterRole"),
            ("rbac.authorization.k8s.io", "v1", "ClusterRoleBinding"),
            ("storage.k8s.io", "v1", "StorageClass"),
            ("scheduling.k8s.io", "v1", "PriorityClass"),
            ("apiextensions.k8s.io", "v1", "CustomResourceDefinition"),
            ("admissionregistration.k8s.io", "v1", "ValidatingWebhookConfiguration"),
            ("admissionregistration.k8s.io", "v1", "MutatingWebhookConfiguration"),
        ];

        let entry = |namespaced: bool| {
            move |&(group, version, kind): &(&str, &str, &str)| ApiResource {
                group: group.to_string(),
                version: version.to_string(),
                kind: kind.to_string(),
                namespaced,
            }
        };
        Self::new(
            NAMESPACED
                .iter()
                .map(entry(true))
                .chain(CLUSTER.iter().map(entry(false))),
        )
    }

    /// Parses a discovery document of the form `resources: [...]`.
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self> {
        let doc: DiscoveryDocument =
            serde_yaml::from_str(content).map_err(|e| NomosError::ParseDiscovery {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Self::new(doc.resources))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| NomosError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml_str(&content, path)
    }

    pub fn scope(&self, gk: &GroupKind) -> Option<Scope> {
        self.kinds.get(gk).map(|k| k.scope)
    }

    pub fn knows(&self, gk: &GroupKind) -> bool {
        self.kinds.contains_key(gk)
    }

    pub fn serves(&self, gvk: &GroupVersionKind) -> bool {
        self.kinds
            .get(&gvk.group_kind())
            .is_some_and(|k| k.versions.contains(&gvk.version))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Discovery data in effect for one compile.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryInfo {
    pub discovery: Discovery,
    /// Whether the caller supplied the data, enabling existence checks.
    pub explicit: bool,
}

impl DiscoveryInfo {
    pub fn from_option(discovery: Option<Discovery>) -> Self {
        match discovery {
            Some(discovery) => Self {
                discovery,
                explicit: true,
            },
            None => Self {
                discovery: Discovery::builtin(),
                explicit: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_scopes() {
        let discovery = Discovery::builtin();
        assert_eq!(
            discovery.scope(&GroupKind::new("", "ResourceQuota")),
            Some(Scope::Namespaced)
        );
        assert_eq!(
            discovery.scope(&GroupKind::new("rbac.authorization.k8s.io", "ClusterRole")),
            Some(Scope::Cluster)
        );
        assert_eq!(discovery.scope(&GroupKind::new("example.com", "Widget")), None);
    }

    #[test]
    fn test_parse_document() {
        let content = r#"
resources:
- group: example.com
  version: v1
  kind: Widget
- group: example.com
  version: v2
  kind: Widget
- version: v1
  kind: Namespace
  namespaced: false
"#;
        let discovery = Discovery::from_yaml_str(content, Path::new("discovery.yaml")).unwrap();
        assert_eq!(discovery.len(), 2);
        assert!(discovery.serves(&GroupVersionKind::new("example.com", "v2", "Widget")));
        assert!(!discovery.serves(&GroupVersionKind::new("example.com", "v3", "Widget")));
        assert_eq!(
            discovery.scope(&GroupKind::new("", "Namespace")),
            Some(Scope::Cluster)
        );
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();
        let missing = Discovery::load(&temp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(missing, NomosError::ReadFile { .. }));

        let path = temp.path().join("bad.yaml");
        fs::write(&path, "resources: 12").unwrap();
        let bad = Discovery::load(&path).unwrap_err();
        assert!(matches!(bad, NomosError::ParseDiscovery { .. }));
    }

    #[test]
    fn test_info_from_option() {
        assert!(!DiscoveryInfo::from_option(None).explicit);
        assert!(DiscoveryInfo::from_option(Some(Discovery::default())).explicit);
    }
}
