//! Resolution of ClusterSelectors against the cluster being compiled for.

use std::collections::{BTreeMap, BTreeSet};

use super::{LabelSelector, Labels, SelectorSpec};
use crate::resource::kinds::CLUSTER_SELECTOR_ANNOTATION;
use crate::resource::{KnownKind, Resource};

/// Which declared ClusterSelectors apply to the current cluster.
///
/// Resolution is a pure function of the clusterregistry objects and the
/// cluster name: the same inputs always yield an equal value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterSelectors {
    cluster_name: Option<String>,
    cluster_labels: Labels,
    declared: BTreeSet<String>,
    selectors: BTreeMap<String, LabelSelector>,
    active: BTreeSet<String>,
}

impl ClusterSelectors {
    /// Evaluates every ClusterSelector in `objects` against the labels of
    /// the Cluster named `cluster_name`. An unnamed or undeclared cluster
    /// has no labels, so only empty selectors apply to it.
    pub fn resolve(objects: &[Resource], cluster_name: Option<&str>) -> Self {
        let cluster_labels = cluster_name
            .and_then(|name| {
                objects
                    .iter()
                    .find(|o| o.is(KnownKind::Cluster) && o.name() == name)
            })
            .map(|cluster| cluster.metadata.labels.clone())
            .unwrap_or_default();

        let mut resolved = Self {
            cluster_name: cluster_name.map(str::to_string),
            cluster_labels,
            ..Default::default()
        };

        for object in objects.iter().filter(|o| o.is(KnownKind::ClusterSelector)) {
            let name = object.name().to_string();
            resolved.declared.insert(name.clone());

            // Malformed selectors are reported by validation; they never apply.
            let Ok(spec) = object.decode_spec::<SelectorSpec>() else {
                continue;
            };
            let applies = spec
                .selector
                .compile()
                .map(|compiled| compiled.matches(&resolved.cluster_labels))
                .unwrap_or(false);
            if applies {
                resolved.active.insert(name.clone());
            }
            resolved.selectors.insert(name, spec.selector);
        }

        tracing::debug!(
            cluster = resolved.cluster_name.as_deref().unwrap_or("<none>"),
            declared = resolved.declared.len(),
            active = resolved.active.len(),
            "resolved cluster selectors"
        );
        resolved
    }

    pub fn cluster_name(&self) -> Option<&str> {
        self.cluster_name.as_deref()
    }

    pub fn cluster_labels(&self) -> &Labels {
        &self.cluster_labels
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains(name)
    }

    pub fn selector(&self, name: &str) -> Option<&LabelSelector> {
        self.selectors.get(name)
    }

    /// Whether an object is kept for the current cluster. Objects without
    /// the cluster-selector annotation always are.
    pub fn keeps(&self, object: &Resource) -> bool {
        match object.annotation(CLUSTER_SELECTOR_ANNOTATION) {
            Some(name) => self.is_active(name),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cluster(name: &str, env: &str) -> Resource {
        Resource::new(KnownKind::Cluster.gvk(), name).with_label("environment", env)
    }

    fn selector(name: &str, env: &str) -> Resource {
        Resource::new(KnownKind::ClusterSelector.gvk(), name).with_spec(json!({
            "selector": {"matchLabels": {"environment": env}}
        }))
    }

    fn registry() -> Vec<Resource> {
        vec![
            cluster("cluster-1", "prod"),
            cluster("cluster-2", "dev"),
            selector("sel-prod", "prod"),
            selector("sel-dev", "dev"),
        ]
    }

    #[test]
    fn test_resolve_for_named_cluster() {
        let selectors = ClusterSelectors::resolve(&registry(), Some("cluster-1"));
        assert!(selectors.is_active("sel-prod"));
        assert!(!selectors.is_active("sel-dev"));
        assert!(selectors.is_declared("sel-dev"));
        assert!(!selectors.is_declared("sel-other"));
    }

    #[test]
    fn test_unknown_cluster_has_no_labels() {
        let mut objects = registry();
        objects.push(
            Resource::new(KnownKind::ClusterSelector.gvk(), "everything")
                .with_spec(json!({"selector": {}})),
        );
        let selectors = ClusterSelectors::resolve(&objects, None);
        assert!(selectors.cluster_labels().is_empty());
        assert!(selectors.is_active("everything"));
        assert!(!selectors.is_active("sel-prod"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let first = ClusterSelectors::resolve(&registry(), Some("cluster-2"));
        let second = ClusterSelectors::resolve(&registry(), Some("cluster-2"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_keeps() {
        let selectors = ClusterSelectors::resolve(&registry(), Some("cluster-2"));
        let gvk = KnownKind::ConfigMap.gvk();
        let plain = Resource::new(gvk.clone(), "plain");
        let dev = Resource::new(gvk.clone(), "dev").with_annotation(CLUSTER_SELECTOR_ANNOTATION, "sel-dev");
        let prod = Resource::new(gvk, "prod").with_annotation(CLUSTER_SELECTOR_ANNOTATION, "sel-prod");
        assert!(selectors.keeps(&plain));
        assert!(selectors.keeps(&dev));
        assert!(!selectors.keeps(&prod));
    }

    #[test]
    fn test_malformed_selector_is_declared_but_inactive() {
        let objects = vec![
            cluster("cluster-1", "prod"),
            Resource::new(KnownKind::ClusterSelector.gvk(), "broken")
                .with_spec(json!({"selector": {"matchLabels": "nope"}})),
        ];
        let selectors = ClusterSelectors::resolve(&objects, Some("cluster-1"));
        assert!(selectors.is_declared("broken"));
        assert!(!selectors.is_active("broken"));
        assert!(selectors.selector("broken").is_none());
    }
}
