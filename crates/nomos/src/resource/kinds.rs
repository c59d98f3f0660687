//! Kinds, annotations and names the compiler gives special meaning to.

use super::{GroupKind, GroupVersionKind};

/// API group of the compiler's own configuration kinds.
pub const NOMOS_GROUP: &str = "nomos.dev";
pub const NOMOS_VERSION: &str = "v1";
pub const CLUSTER_REGISTRY_GROUP: &str = "clusterregistry.k8s.io";
pub const CLUSTER_REGISTRY_VERSION: &str = "v1alpha1";
pub const APIEXTENSIONS_GROUP: &str = "apiextensions.k8s.io";
pub const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

/// Prefix reserved for compiler-owned labels and annotations.
pub const RESERVED_PREFIX: &str = "nomos.dev/";

pub const NAMESPACE_SELECTOR_ANNOTATION: &str = "nomos.dev/namespace-selector";
pub const CLUSTER_SELECTOR_ANNOTATION: &str = "nomos.dev/cluster-selector";
pub const MANAGEMENT_ANNOTATION: &str = "nomos.dev/managed";
pub const MANAGEMENT_DISABLED: &str = "disabled";
pub const SOURCE_PATH_ANNOTATION: &str = "nomos.dev/source-path";

/// Reserved-prefix annotations that users may declare themselves.
pub const ALLOWED_ANNOTATIONS: &[&str] = &[
    NAMESPACE_SELECTOR_ANNOTATION,
    CLUSTER_SELECTOR_ANNOTATION,
    MANAGEMENT_ANNOTATION,
];

/// Name of the system ConfigMap listing reserved namespaces.
pub const RESERVED_NAMESPACES_CONFIG: &str = "nomos-reserved-namespaces";
/// Name of the generated cluster-level quota aggregate.
pub const HIERARCHICAL_QUOTA_NAME: &str = "nomos-hierarchical-quota";

/// Namespaces no directory may claim.
pub const BUILTIN_RESERVED_NAMESPACES: &[&str] = &["nomos-system", "kube-public", "kube-node-lease"];

/// Kinds that the compiler recognises by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownKind {
    Namespace,
    ResourceQuota,
    ConfigMap,
    List,
    Repo,
    Sync,
    HierarchyConfig,
    NamespaceSelector,
    ClusterSelector,
    HierarchicalQuota,
    Cluster,
    CustomResourceDefinition,
}

impl KnownKind {
    pub fn classify(group: &str, kind: &str) -> Option<Self> {
        let known = match (group, kind) {
            ("", "Namespace") => KnownKind::Namespace,
            ("", "ResourceQuota") => KnownKind::ResourceQuota,
            ("", "ConfigMap") => KnownKind::ConfigMap,
            ("", "List") => KnownKind::List,
            (NOMOS_GROUP, "Repo") => KnownKind::Repo,
            (NOMOS_GROUP, "Sync") => KnownKind::Sync,
            (NOMOS_GROUP, "HierarchyConfig") => KnownKind::HierarchyConfig,
            (NOMOS_GROUP, "NamespaceSelector") => KnownKind::NamespaceSelector,
            (NOMOS_GROUP, "ClusterSelector") => KnownKind::ClusterSelector,
            (NOMOS_GROUP, "HierarchicalQuota") => KnownKind::HierarchicalQuota,
            (CLUSTER_REGISTRY_GROUP, "Cluster") => KnownKind::Cluster,
            (APIEXTENSIONS_GROUP, "CustomResourceDefinition") => {
                KnownKind::CustomResourceDefinition
            }
            _ => return None,
        };
        Some(known)
    }

    pub fn gvk(&self) -> GroupVersionKind {
        match self {
            KnownKind::Namespace => GroupVersionKind::new("", "v1", "Namespace"),
            KnownKind::ResourceQuota => GroupVersionKind::new("", "v1", "ResourceQuota"),
            KnownKind::ConfigMap => GroupVersionKind::new("", "v1", "ConfigMap"),
            KnownKind::List => GroupVersionKind::new("", "v1", "List"),
            KnownKind::Repo => GroupVersionKind::new(NOMOS_GROUP, NOMOS_VERSION, "Repo"),
            KnownKind::Sync => GroupVersionKind::new(NOMOS_GROUP, NOMOS_VERSION, "Sync"),
            KnownKind::HierarchyConfig => {
                GroupVersionKind::new(NOMOS_GROUP, NOMOS_VERSION, "HierarchyConfig")
            }
            KnownKind::NamespaceSelector => {
                GroupVersionKind::new(NOMOS_GROUP, NOMOS_VERSION, "NamespaceSelector")
            }
            KnownKind::ClusterSelector => {
                GroupVersionKind::new(NOMOS_GROUP, NOMOS_VERSION, "ClusterSelector")
            }
            KnownKind::HierarchicalQuota => {
                GroupVersionKind::new(NOMOS_GROUP, NOMOS_VERSION, "HierarchicalQuota")
            }
            KnownKind::Cluster => GroupVersionKind::new(
                CLUSTER_REGISTRY_GROUP,
                CLUSTER_REGISTRY_VERSION,
                "Cluster",
            ),
            KnownKind::CustomResourceDefinition => {
                GroupVersionKind::new(APIEXTENSIONS_GROUP, "v1", "CustomResourceDefinition")
            }
        }
    }

    pub fn group_kind(&self) -> GroupKind {
        self.gvk().group_kind()
    }

    /// Kinds that configure the compiler and only belong in `system/`.
    pub fn is_system_kind(&self) -> bool {
        matches!(
            self,
            KnownKind::Repo | KnownKind::Sync | KnownKind::HierarchyConfig
        )
    }
}

/// Whether a group/kind may never be named by a Sync.
pub fn is_unsyncable(gk: &GroupKind) -> bool {
    gk.group == NOMOS_GROUP
        || matches!(
            KnownKind::classify(&gk.group, &gk.kind),
            Some(KnownKind::Namespace | KnownKind::CustomResourceDefinition)
        )
}

/// Group/kinds that are synced without a declaring Sync object.
pub fn is_implicitly_synced(gk: &GroupKind) -> bool {
    matches!(
        KnownKind::classify(&gk.group, &gk.kind),
        Some(KnownKind::Namespace | KnownKind::HierarchicalQuota)
    )
}
