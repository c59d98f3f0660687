use crate::ast::TreeNode;
use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::kinds::{
    ALLOWED_ANNOTATIONS, MANAGEMENT_ANNOTATION, MANAGEMENT_DISABLED, RESERVED_PREFIX,
};
use crate::resource::Resource;
use crate::visitor::{VisitContext, Visitor};

/// Rejects user-declared labels and annotations in the reserved
/// `nomos.dev/` namespace, apart from the few annotations users are
/// expected to write.
#[derive(Debug, Default)]
pub struct AnnotationValidator;

impl AnnotationValidator {
    pub fn new() -> Self {
        Self
    }

    fn check(object: &Resource, cx: &mut VisitContext<'_>) {
        let annotations: Vec<String> = object
            .metadata
            .annotations
            .keys()
            .filter(|k| k.starts_with(RESERVED_PREFIX) && !ALLOWED_ANNOTATIONS.contains(&k.as_str()))
            .cloned()
            .collect();
        if !annotations.is_empty() {
            cx.report(KnvError::IllegalAnnotationDefinition {
                object: object.to_ref(),
                keys: annotations,
            });
        }

        let labels: Vec<String> = object
            .metadata
            .labels
            .keys()
            .filter(|k| k.starts_with(RESERVED_PREFIX))
            .cloned()
            .collect();
        if !labels.is_empty() {
            cx.report(KnvError::IllegalLabelDefinition {
                object: object.to_ref(),
                keys: labels,
            });
        }

        if let Some(value) = object.annotation(MANAGEMENT_ANNOTATION) {
            if value != MANAGEMENT_DISABLED {
                cx.report(KnvError::IllegalManagementAnnotation {
                    object: object.to_ref(),
                    value: value.to_string(),
                });
            }
        }
    }
}

impl Visitor for AnnotationValidator {
    fn name(&self) -> &'static str {
        "annotations"
    }

    fn visit_system_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check(object, cx);
    }

    fn visit_cluster_registry_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check(object, cx);
    }

    fn visit_cluster_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check(object, cx);
    }

    fn visit_object(&mut self, _node: &TreeNode, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check(object, cx);
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "IllegalManagementAnnotation",
        "The management annotation only accepts the value `disabled`, which leaves \
         the object unmanaged. Remove the annotation to manage the object.",
        KnvError::IllegalManagementAnnotation {
            object: example_object("namespaces/bar/cm.yaml", "v1", "ConfigMap", "settings"),
            value: "enabled".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "IllegalAnnotationDefinition",
        "Annotations starting with `nomos.dev/` are written by the compiler. Users \
         may only declare the namespace-selector, cluster-selector and management \
         annotations.",
        KnvError::IllegalAnnotationDefinition {
            object: example_object("cluster/cr.yaml", "rbac.authorization.k8s.io/v1", "ClusterRole", "viewer"),
            keys: vec!["nomos.dev/source-path".to_string()],
        },
    ))?;
    registry.register(CodeEntry::new(
        "IllegalLabelDefinition",
        "Labels starting with `nomos.dev/` are reserved and may not be declared.",
        KnvError::IllegalLabelDefinition {
            object: example_object("namespaces/bar/ns.yaml", "v1", "Namespace", "bar"),
            keys: vec!["nomos.dev/team".to_string()],
        },
    ))
}
