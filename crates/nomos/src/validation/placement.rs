use crate::ast::TreeNode;
use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::kinds::RESERVED_NAMESPACES_CONFIG;
use crate::resource::{KnownKind, Resource};
use crate::visitor::{VisitContext, Visitor};

/// Fixed per-directory allow-lists of kinds.
///
/// Scope against discovery is checked separately, after cluster selection,
/// by [`super::ScopeValidator`].
#[derive(Debug, Default)]
pub struct PlacementValidator;

impl PlacementValidator {
    pub fn new() -> Self {
        Self
    }

    /// Reports compiler configuration declared outside `system/`. Returns
    /// whether the object was one.
    fn misplaced_system_kind(object: &Resource, cx: &mut VisitContext<'_>) -> bool {
        let misplaced = object.known_kind().is_some_and(|k| k.is_system_kind());
        if misplaced {
            cx.report(KnvError::IllegalSystemResourcePlacement {
                object: object.to_ref(),
            });
        }
        misplaced
    }
}

fn allowed_in_system(object: &Resource) -> bool {
    match object.known_kind() {
        Some(kind) if kind.is_system_kind() => true,
        Some(KnownKind::ConfigMap) => object.name() == RESERVED_NAMESPACES_CONFIG,
        _ => false,
    }
}

fn allowed_in_cluster_registry(object: &Resource) -> bool {
    matches!(
        object.known_kind(),
        Some(KnownKind::Cluster | KnownKind::ClusterSelector)
    )
}

pub(super) fn allowed_in_namespaces(object: &Resource) -> bool {
    !matches!(
        object.known_kind(),
        Some(
            KnownKind::Cluster
                | KnownKind::ClusterSelector
                | KnownKind::CustomResourceDefinition
                | KnownKind::HierarchicalQuota
        )
    )
}

fn allowed_in_cluster(object: &Resource) -> bool {
    !matches!(
        object.known_kind(),
        Some(
            KnownKind::Namespace
                | KnownKind::NamespaceSelector
                | KnownKind::ClusterSelector
                | KnownKind::Cluster
                | KnownKind::HierarchicalQuota
        )
    )
}

impl Visitor for PlacementValidator {
    fn name(&self) -> &'static str {
        "placement"
    }

    fn visit_system_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        if !allowed_in_system(object) {
            cx.report(KnvError::IllegalKindInSystem {
                object: object.to_ref(),
            });
        }
    }

    fn visit_cluster_registry_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        if Self::misplaced_system_kind(object, cx) {
            return;
        }
        if !allowed_in_cluster_registry(object) {
            cx.report(KnvError::IllegalKindInClusterRegistry {
                object: object.to_ref(),
            });
        }
    }

    fn visit_cluster_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        if Self::misplaced_system_kind(object, cx) {
            return;
        }
        if !allowed_in_cluster(object) {
            cx.report(KnvError::IllegalKindInCluster {
                object: object.to_ref(),
            });
        }
    }

    fn visit_object(&mut self, _node: &TreeNode, object: &Resource, cx: &mut VisitContext<'_>) {
        if Self::misplaced_system_kind(object, cx) {
            return;
        }
        if !allowed_in_namespaces(object) {
            cx.report(KnvError::IllegalKindInNamespaces {
                object: object.to_ref(),
            });
        }
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "IllegalKindInSystem",
        "system/ holds compiler configuration only: Repo, Sync, HierarchyConfig \
         and the nomos-reserved-namespaces ConfigMap.",
        KnvError::IllegalKindInSystem {
            object: example_object("system/role.yaml", "rbac.authorization.k8s.io/v1", "Role", "reader"),
        },
    ))?;
    registry.register(CodeEntry::new(
        "IllegalSystemResourcePlacement",
        "Repo, Sync and HierarchyConfig objects configure the compiler and may \
         only be declared in system/.",
        KnvError::IllegalSystemResourcePlacement {
            object: example_object("namespaces/bar/sync.yaml", "nomos.dev/v1", "Sync", "quotas"),
        },
    ))?;
    registry.register(CodeEntry::new(
        "IllegalKindInClusterRegistry",
        "clusterregistry/ may only declare Cluster and ClusterSelector objects.",
        KnvError::IllegalKindInClusterRegistry {
            object: example_object("clusterregistry/cm.yaml", "v1", "ConfigMap", "settings"),
        },
    ))?;
    registry.register(CodeEntry::new(
        "IllegalKindInNamespaces",
        "The namespaces tree may only declare namespaced objects, Namespaces and \
         NamespaceSelectors. Cluster-scoped kinds belong in cluster/ and cluster \
         registry kinds in clusterregistry/.",
        KnvError::IllegalKindInNamespaces {
            object: example_object("namespaces/bar/cr.yaml", "rbac.authorization.k8s.io/v1", "ClusterRole", "viewer"),
        },
    ))?;
    registry.register(CodeEntry::new(
        "IllegalKindInCluster",
        "cluster/ may only declare cluster-scoped objects. Namespaces are declared \
         by directories in the namespaces tree.",
        KnvError::IllegalKindInCluster {
            object: example_object("cluster/ns.yaml", "v1", "Namespace", "bar"),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Directory;
    use crate::knv::Code;
    use crate::validation::testing::{config_map, namespace, repo, role, root_from, run};

    #[test]
    fn test_system_allow_list() {
        let root = root_from(vec![Directory::new("system")
            .with_object(repo(false))
            .with_object(config_map(RESERVED_NAMESPACES_CONFIG))
            .with_object(config_map("other"))
            .with_object(role("reader"))]);
        assert_eq!(
            run(&root, PlacementValidator::new()),
            vec![Code::ILLEGAL_KIND_IN_SYSTEM, Code::ILLEGAL_KIND_IN_SYSTEM]
        );
    }

    #[test]
    fn test_system_kinds_outside_system() {
        let sync = Resource::new(KnownKind::Sync.gvk(), "quotas");
        let root = root_from(vec![
            Directory::new("cluster").with_object(repo(false)),
            Directory::new("namespaces").with_object(sync),
        ]);
        assert_eq!(
            run(&root, PlacementValidator::new()),
            vec![
                Code::ILLEGAL_SYSTEM_RESOURCE_PLACEMENT,
                Code::ILLEGAL_SYSTEM_RESOURCE_PLACEMENT
            ]
        );
    }

    #[test]
    fn test_section_kinds() {
        let root = root_from(vec![
            Directory::new("clusterregistry")
                .with_object(Resource::new(KnownKind::Cluster.gvk(), "prod-1"))
                .with_object(config_map("settings")),
            Directory::new("cluster").with_object(namespace("bar")),
            Directory::new("namespaces")
                .with_object(Resource::new(KnownKind::ClusterSelector.gvk(), "prod")),
        ]);
        assert_eq!(
            run(&root, PlacementValidator::new()),
            vec![
                Code::ILLEGAL_KIND_IN_CLUSTER_REGISTRY,
                Code::ILLEGAL_KIND_IN_NAMESPACES,
                Code::ILLEGAL_KIND_IN_CLUSTER
            ]
        );
    }
}
