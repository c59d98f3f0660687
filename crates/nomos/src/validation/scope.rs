use crate::ast::TreeNode;
use crate::discovery::{DiscoveryInfo, Scope};
use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::kinds::NOMOS_GROUP;
use crate::resource::{KnownKind, Resource};
use crate::visitor::{VisitContext, Visitor};

/// Checks emitted objects against the scope the cluster serves them at.
///
/// Runs after cluster selection, so objects excluded for this cluster are
/// not checked. Kinds missing from discovery are only reported when the
/// caller supplied discovery data.
///
/// Reads: [`DiscoveryInfo`].
#[derive(Debug, Default)]
pub struct ScopeValidator;

impl ScopeValidator {
    pub fn new() -> Self {
        Self
    }

    fn check(object: &Resource, expected: Scope, cx: &mut VisitContext<'_>) {
        if object.gvk.group == NOMOS_GROUP || object.is(KnownKind::Namespace) {
            return;
        }
        let data = cx.data;
        let info = match data.require::<DiscoveryInfo>() {
            Ok(info) => info,
            Err(e) => {
                cx.report(e);
                return;
            }
        };
        match info.discovery.scope(&object.group_kind()) {
            Some(scope) if scope == expected => {}
            Some(Scope::Cluster) => cx.report(KnvError::IllegalKindInNamespaces {
                object: object.to_ref(),
            }),
            Some(Scope::Namespaced) => cx.report(KnvError::IllegalKindInCluster {
                object: object.to_ref(),
            }),
            None if info.explicit => cx.report(KnvError::UnknownObjectKind {
                object: object.to_ref(),
            }),
            None => {}
        }
    }
}

impl Visitor for ScopeValidator {
    fn name(&self) -> &'static str {
        "scope"
    }

    fn visit_cluster_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check(object, Scope::Cluster, cx);
    }

    fn visit_object(&mut self, _node: &TreeNode, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check(object, Scope::Namespaced, cx);
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "UnknownObjectKind",
        "When discovery data is supplied, every emitted object must be of a kind \
         the target cluster serves. Check the apiVersion and kind, or install the \
         CustomResourceDefinition first.",
        KnvError::UnknownObjectKind {
            object: example_object("cluster/widget.yaml", "example.com/v1", "Widget", "default"),
        },
    ))
}
