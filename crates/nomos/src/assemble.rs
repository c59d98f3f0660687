//! Flattens a validated tree into the output handed to the applier.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Data, Root};
use crate::knv::KnvError;
use crate::resource::{GroupVersionKind, KnownKind, Resource};
use crate::system::{SyncDeclaration, SystemConfig};

/// Everything the compiler emits for one cluster.
///
/// Two compiles of the same input produce equal values, so callers can
/// compare outputs to decide whether anything needs re-applying.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledPolicies {
    /// Objects effective in each namespace, keyed by namespace name.
    #[serde(rename = "perNamespaceResources")]
    pub namespaces: BTreeMap<String, Vec<Resource>>,
    #[serde(rename = "clusterResources")]
    pub cluster: Vec<Resource>,
    pub syncs: Vec<SyncDeclaration>,
}

impl CompiledPolicies {
    /// Kinds downstream controllers need to watch.
    pub fn kinds_to_sync(&self) -> BTreeSet<GroupVersionKind> {
        self.syncs.iter().flat_map(SyncDeclaration::gvks).collect()
    }

    pub fn namespace(&self, name: &str) -> Option<&[Resource]> {
        self.namespaces.get(name).map(Vec::as_slice)
    }

    pub fn resource_count(&self) -> usize {
        self.cluster.len() + self.namespaces.values().map(Vec::len).sum::<usize>()
    }
}

/// Builds the output from a tree that has passed every validator.
///
/// Namespaced objects get `metadata.namespace` from their directory.
/// NamespaceSelectors only steer compilation and are not emitted. Syncs
/// for kinds the compiler manages itself are added to the declared ones.
pub fn assemble(root: &Root, data: &Data) -> Result<CompiledPolicies, KnvError> {
    let system = data.require::<SystemConfig>()?;

    let mut namespaces = BTreeMap::new();
    for node in root.namespaces() {
        let name = node.name().to_string();
        let objects: Vec<Resource> = node
            .objects
            .iter()
            .filter(|o| !o.is(KnownKind::NamespaceSelector))
            .map(|o| {
                let mut object = o.clone();
                if !object.is(KnownKind::Namespace) {
                    object.metadata.namespace = name.clone();
                }
                object
            })
            .collect();
        if namespaces.insert(name.clone(), objects).is_some() {
            return Err(KnvError::internal(format!(
                "namespace {} assembled twice",
                name
            )));
        }
    }

    let cluster = root.cluster.objects.clone();

    let mut syncs = system.syncs.clone();
    let mut implicit = vec![KnownKind::Namespace.gvk()];
    if cluster.iter().any(|o| o.is(KnownKind::HierarchicalQuota)) {
        implicit.push(KnownKind::HierarchicalQuota.gvk());
    }
    for gvk in implicit {
        if !syncs.iter().any(|s| s.group_kind() == gvk.group_kind()) {
            syncs.push(SyncDeclaration::implicit(&gvk));
        }
    }
    syncs.sort_by(|a, b| (&a.group, &a.kind).cmp(&(&b.group, &b.kind)));

    Ok(CompiledPolicies {
        namespaces,
        cluster,
        syncs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeType, TreeNode};
    use crate::resource::kinds::HIERARCHICAL_QUOTA_NAME;
    use serde_json::json;

    fn sample_root() -> Root {
        let mut bar = TreeNode::new("namespaces/bar", NodeType::Namespace);
        bar.objects = vec![
            Resource::new(KnownKind::Namespace.gvk(), "bar"),
            Resource::new(KnownKind::ResourceQuota.gvk(), "quota"),
            Resource::new(KnownKind::NamespaceSelector.gvk(), "local"),
        ];
        let mut tree = TreeNode::new("namespaces", NodeType::AbstractNamespace);
        tree.children.push(bar);

        Root {
            tree: Some(tree),
            ..Default::default()
        }
    }

    fn data_with_syncs(syncs: Vec<SyncDeclaration>) -> Data {
        let mut data = Data::new();
        data.insert(SystemConfig {
            syncs,
            ..Default::default()
        });
        data
    }

    #[test]
    fn test_assigns_namespaces_and_drops_selectors() {
        let data = data_with_syncs(vec![SyncDeclaration::implicit(&KnownKind::ResourceQuota.gvk())]);
        let compiled = assemble(&sample_root(), &data).unwrap();

        let bar = compiled.namespace("bar").unwrap();
        assert_eq!(bar.len(), 2);
        assert_eq!(bar[0].metadata.namespace, "");
        assert_eq!(bar[1].metadata.namespace, "bar");
        assert_eq!(compiled.resource_count(), 2);
    }

    #[test]
    fn test_implicit_syncs() {
        let mut root = sample_root();
        root.cluster.objects.push(
            Resource::new(KnownKind::HierarchicalQuota.gvk(), HIERARCHICAL_QUOTA_NAME)
                .with_spec(json!({"hierarchy": {}})),
        );
        let data = data_with_syncs(vec![SyncDeclaration::implicit(&KnownKind::ResourceQuota.gvk())]);
        let compiled = assemble(&root, &data).unwrap();

        let kinds: Vec<String> = compiled.syncs.iter().map(|s| s.kind.clone()).collect();
        assert_eq!(kinds, vec!["Namespace", "ResourceQuota", "HierarchicalQuota"]);
        assert!(compiled.kinds_to_sync().contains(&KnownKind::HierarchicalQuota.gvk()));
        assert_eq!(compiled.kinds_to_sync().len(), 3);
    }

    #[test]
    fn test_serialized_shape() {
        let data = data_with_syncs(Vec::new());
        let compiled = assemble(&sample_root(), &data).unwrap();
        let value = serde_json::to_value(&compiled).unwrap();
        assert_eq!(value["perNamespaceResources"]["bar"][1]["kind"], "ResourceQuota");
        assert_eq!(value["perNamespaceResources"]["bar"][1]["metadata"]["namespace"], "bar");
        assert_eq!(value["clusterResources"], json!([]));
        assert_eq!(value["syncs"][0]["kind"], "Namespace");
    }

    #[test]
    fn test_missing_system_config_is_internal() {
        let error = assemble(&sample_root(), &Data::new()).unwrap_err();
        assert!(error.is_internal());
    }
}
