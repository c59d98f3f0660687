//! Manifest builders for test repositories.

#![allow(dead_code)]

pub fn repo(inheritance: bool) -> String {
    repo_named("repo", "1.0.0", inheritance)
}

pub fn repo_named(name: &str, version: &str, inheritance: bool) -> String {
    format!(
        "apiVersion: nomos.dev/v1\nkind: Repo\nmetadata:\n  name: {name}\nspec:\n  version: {version}\n  experimentalInheritance: {inheritance}\n"
    )
}

/// A Sync for a single version, with an optional hierarchy mode.
pub fn sync(group: &str, kind: &str, mode: Option<&str>) -> String {
    let mode = mode
        .map(|m| format!("\n      hierarchyMode: {m}"))
        .unwrap_or_default();
    format!(
        "apiVersion: nomos.dev/v1\nkind: Sync\nmetadata:\n  name: {}\nspec:\n  group: \"{group}\"\n  kind: {kind}\n  versions:\n    - version: v1{mode}\n",
        kind.to_lowercase()
    )
}

/// Builder for an arbitrary object manifest.
pub struct ObjectBuilder {
    api_version: String,
    kind: String,
    name: String,
    namespace: Option<String>,
    labels: Vec<(String, String)>,
    annotations: Vec<(String, String)>,
    body: Option<String>,
}

impl ObjectBuilder {
    pub fn new(api_version: &str, kind: &str, name: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: None,
            labels: Vec::new(),
            annotations: Vec::new(),
            body: None,
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.push((key.to_string(), value.to_string()));
        self
    }

    pub fn annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.push((key.to_string(), value.to_string()));
        self
    }

    /// Top-level YAML appended after metadata, e.g. a `spec:` block.
    pub fn body(mut self, yaml: &str) -> Self {
        self.body = Some(yaml.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut out = format!(
            "apiVersion: {}\nkind: {}\nmetadata:\n  name: {}\n",
            self.api_version, self.kind, self.name
        );
        if let Some(namespace) = &self.namespace {
            out.push_str(&format!("  namespace: {namespace}\n"));
        }
        if !self.labels.is_empty() {
            out.push_str("  labels:\n");
            for (k, v) in &self.labels {
                out.push_str(&format!("    {k}: \"{v}\"\n"));
            }
        }
        if !self.annotations.is_empty() {
            out.push_str("  annotations:\n");
            for (k, v) in &self.annotations {
                out.push_str(&format!("    {k}: '{v}'\n"));
            }
        }
        if let Some(body) = &self.body {
            out.push_str(body);
            if !body.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

pub fn namespace(name: &str) -> ObjectBuilder {
    ObjectBuilder::new("v1", "Namespace", name)
}

pub fn config_map(name: &str) -> ObjectBuilder {
    ObjectBuilder::new("v1", "ConfigMap", name)
}

pub fn role_binding(name: &str) -> ObjectBuilder {
    ObjectBuilder::new("rbac.authorization.k8s.io/v1", "RoleBinding", name).body(
        "roleRef:\n  apiGroup: rbac.authorization.k8s.io\n  kind: ClusterRole\n  name: view\nsubjects:\n  - kind: Group\n    name: readers\n",
    )
}

pub fn cluster_role(name: &str) -> ObjectBuilder {
    ObjectBuilder::new("rbac.authorization.k8s.io/v1", "ClusterRole", name)
}

pub fn resource_quota(name: &str, pods: &str) -> ObjectBuilder {
    ObjectBuilder::new("v1", "ResourceQuota", name)
        .body(&format!("spec:\n  hard:\n    pods: \"{pods}\"\n"))
}

/// A NamespaceSelector matching a single label.
pub fn namespace_selector(name: &str, key: &str, value: &str) -> String {
    ObjectBuilder::new("nomos.dev/v1", "NamespaceSelector", name)
        .body(&format!("spec:\n  selector:\n    matchLabels:\n      {key}: {value}\n"))
        .build()
}

/// A ClusterSelector matching a single label.
pub fn cluster_selector(name: &str, key: &str, value: &str) -> String {
    ObjectBuilder::new("nomos.dev/v1", "ClusterSelector", name)
        .body(&format!("spec:\n  selector:\n    matchLabels:\n      {key}: {value}\n"))
        .build()
}

pub fn cluster(name: &str, key: &str, value: &str) -> String {
    ObjectBuilder::new("clusterregistry.k8s.io/v1alpha1", "Cluster", name)
        .label(key, value)
        .build()
}
