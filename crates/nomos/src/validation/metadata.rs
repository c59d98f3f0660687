use super::{is_dns_subdomain, is_path_segment_name};
use crate::ast::TreeNode;
use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::kinds::RBAC_GROUP;
use crate::resource::{KnownKind, Resource};
use crate::visitor::{VisitContext, Visitor};

/// Checks object names and namespace declarations.
#[derive(Debug, Default)]
pub struct MetadataValidator;

impl MetadataValidator {
    pub fn new() -> Self {
        Self
    }

    fn check_name(object: &Resource, cx: &mut VisitContext<'_>) {
        let name = object.name();
        if name.is_empty() {
            cx.report(KnvError::MissingObjectName {
                object: object.to_ref(),
            });
            return;
        }
        let valid = if object.gvk.group == RBAC_GROUP {
            is_path_segment_name(name)
        } else {
            is_dns_subdomain(name)
        };
        if !valid {
            cx.report(KnvError::InvalidMetadataName {
                object: object.to_ref(),
            });
        }
    }
}

impl Visitor for MetadataValidator {
    fn name(&self) -> &'static str {
        "metadata"
    }

    fn visit_system_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check_name(object, cx);
    }

    fn visit_cluster_registry_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check_name(object, cx);
    }

    fn visit_cluster_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check_name(object, cx);
    }

    fn visit_object(&mut self, node: &TreeNode, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check_name(object, cx);

        if object.is(KnownKind::Namespace) {
            if !node.path.contains('/') {
                cx.report(KnvError::IllegalTopLevelNamespace {
                    object: object.to_ref(),
                });
            } else if !object.name().is_empty() && object.name() != node.name() {
                cx.report(KnvError::InvalidNamespaceName {
                    object: object.to_ref(),
                    expected: node.name().to_string(),
                });
            }
            return;
        }

        let declared = object.metadata.namespace.as_str();
        if !declared.is_empty() && !(node.is_namespace() && declared == node.name()) {
            cx.report(KnvError::IllegalMetadataNamespaceDeclaration {
                object: object.to_ref(),
                dir: node.path.clone(),
            });
        }
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "IllegalMetadataNamespaceDeclaration",
        "The namespace of an object in the tree comes from its directory. \
         metadata.namespace may be omitted, or set to the directory's Namespace. \
         Objects in abstract namespaces must leave it unset.",
        KnvError::IllegalMetadataNamespaceDeclaration {
            object: example_object("namespaces/bar/role.yaml", "rbac.authorization.k8s.io/v1", "Role", "reader"),
            dir: "namespaces/bar".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "IllegalTopLevelNamespace",
        "The namespaces root is always abstract and cannot itself be a Namespace.",
        KnvError::IllegalTopLevelNamespace {
            object: example_object("namespaces/ns.yaml", "v1", "Namespace", "namespaces"),
        },
    ))?;
    registry.register(CodeEntry::new(
        "InvalidNamespaceName",
        "A Namespace object must be named after the directory that declares it.",
        KnvError::InvalidNamespaceName {
            object: example_object("namespaces/bar/ns.yaml", "v1", "Namespace", "baz"),
            expected: "bar".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "MissingObjectName",
        "Every object must declare metadata.name.",
        KnvError::MissingObjectName {
            object: example_object("cluster/role.yaml", "rbac.authorization.k8s.io/v1", "ClusterRole", ""),
        },
    ))?;
    registry.register(CodeEntry::new(
        "InvalidMetadataName",
        "Object names must be RFC 1123 subdomains. RBAC objects only need to be \
         valid path segments.",
        KnvError::InvalidMetadataName {
            object: example_object("namespaces/bar/cm.yaml", "v1", "ConfigMap", "Not_Valid"),
        },
    ))
}
