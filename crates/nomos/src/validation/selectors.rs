use std::collections::BTreeSet;

use crate::ast::TreeNode;
use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::kinds::{CLUSTER_SELECTOR_ANNOTATION, NAMESPACE_SELECTOR_ANNOTATION};
use crate::resource::{KnownKind, Resource};
use crate::selectors::{ClusterSelectors, SelectorSpec};
use crate::visitor::{VisitContext, Visitor};

/// Checks selector declarations and the annotations that reference them.
///
/// A namespace-selector annotation must name a NamespaceSelector declared
/// in the same directory or an ancestor. A cluster-selector annotation
/// must name a ClusterSelector declared in `clusterregistry/`, whether or
/// not it applies to the current cluster.
///
/// Reads: [`ClusterSelectors`].
#[derive(Debug, Default)]
pub struct SelectorValidator {
    /// Names of NamespaceSelectors in scope, one frame per entered directory.
    frames: Vec<BTreeSet<String>>,
}

impl SelectorValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn namespace_selector_in_scope(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.contains(name))
    }

    fn check_spec(object: &Resource, cx: &mut VisitContext<'_>) {
        let reason = match object.decode_spec::<SelectorSpec>() {
            Ok(spec) => match spec.selector.compile() {
                Ok(_) => return,
                Err(e) => e.to_string(),
            },
            Err(e) => e.to_string(),
        };
        cx.report(KnvError::InvalidSelector {
            object: object.to_ref(),
            reason,
        });
    }

    fn forbid(object: &Resource, annotation: &str, cx: &mut VisitContext<'_>) -> bool {
        if object.annotation(annotation).is_none() {
            return false;
        }
        cx.report(KnvError::IllegalSelectorAnnotation {
            object: object.to_ref(),
            annotation: annotation.to_string(),
        });
        true
    }

    fn check_cluster_selector_reference(object: &Resource, cx: &mut VisitContext<'_>) {
        let Some(name) = object.annotation(CLUSTER_SELECTOR_ANNOTATION) else {
            return;
        };
        let data = cx.data;
        match data.require::<ClusterSelectors>() {
            Ok(selectors) if selectors.is_declared(name) => {}
            Ok(_) => cx.report(KnvError::ObjectHasUnknownClusterSelector {
                object: object.to_ref(),
                selector: name.to_string(),
            }),
            Err(e) => cx.report(e),
        }
    }
}

impl Visitor for SelectorValidator {
    fn name(&self) -> &'static str {
        "selectors"
    }

    fn visit_system_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::forbid(object, NAMESPACE_SELECTOR_ANNOTATION, cx);
        Self::forbid(object, CLUSTER_SELECTOR_ANNOTATION, cx);
    }

    fn visit_cluster_registry_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::forbid(object, NAMESPACE_SELECTOR_ANNOTATION, cx);
        Self::forbid(object, CLUSTER_SELECTOR_ANNOTATION, cx);
        if object.is(KnownKind::ClusterSelector) {
            Self::check_spec(object, cx);
        }
    }

    fn visit_cluster_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::forbid(object, NAMESPACE_SELECTOR_ANNOTATION, cx);
        Self::check_cluster_selector_reference(object, cx);
    }

    fn visit_tree_node(&mut self, node: &TreeNode, _cx: &mut VisitContext<'_>) {
        let declared = node
            .objects
            .iter()
            .filter(|o| o.is(KnownKind::NamespaceSelector))
            .map(|o| o.name().to_string())
            .collect();
        self.frames.push(declared);
    }

    fn visit_object(&mut self, _node: &TreeNode, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check_cluster_selector_reference(object, cx);

        if object.is(KnownKind::NamespaceSelector) {
            Self::check_spec(object, cx);
            Self::forbid(object, NAMESPACE_SELECTOR_ANNOTATION, cx);
            return;
        }
        if object.is(KnownKind::Namespace) {
            Self::forbid(object, NAMESPACE_SELECTOR_ANNOTATION, cx);
            return;
        }
        if let Some(name) = object.annotation(NAMESPACE_SELECTOR_ANNOTATION) {
            if !self.namespace_selector_in_scope(name) {
                cx.report(KnvError::ObjectHasUnknownNamespaceSelector {
                    object: object.to_ref(),
                    selector: name.to_string(),
                });
            }
        }
    }

    fn leave_tree_node(&mut self, _node: &TreeNode, _cx: &mut VisitContext<'_>) {
        self.frames.pop();
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "IllegalSelectorAnnotation",
        "Namespace-selector annotations are only meaningful on objects in the \
         namespaces tree, and never on Namespace or NamespaceSelector objects. \
         Cluster-selector annotations may not appear in system/ or clusterregistry/.",
        KnvError::IllegalSelectorAnnotation {
            object: example_object("namespaces/bar/ns.yaml", "v1", "Namespace", "bar"),
            annotation: NAMESPACE_SELECTOR_ANNOTATION.to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "ObjectHasUnknownNamespaceSelector",
        "A namespace-selector annotation must name a NamespaceSelector declared in \
         the object's directory or one of its parents.",
        KnvError::ObjectHasUnknownNamespaceSelector {
            object: example_object("namespaces/eng/rb.yaml", "rbac.authorization.k8s.io/v1", "RoleBinding", "admins"),
            selector: "sre-supported".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "ObjectHasUnknownClusterSelector",
        "A cluster-selector annotation must name a ClusterSelector declared in \
         clusterregistry/. Selectors that exist but do not match the current \
         cluster are not an error; the object is simply left out.",
        KnvError::ObjectHasUnknownClusterSelector {
            object: example_object("cluster/cr.yaml", "rbac.authorization.k8s.io/v1", "ClusterRole", "viewer"),
            selector: "prod-only".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "InvalidSelector",
        "Selectors use matchLabels and matchExpressions. Expressions take the \
         operators In, NotIn, Exists and DoesNotExist; In and NotIn need values \
         and the others must have none.",
        KnvError::InvalidSelector {
            object: example_object("clusterregistry/sel.yaml", "nomos.dev/v1", "ClusterSelector", "prod-only"),
            reason: "unknown operator `Equals` for key `env`".to_string(),
        },
    ))
}
