use super::placement::allowed_in_namespaces;
use crate::ast::TreeNode;
use crate::hierarchy::{HierarchyModes, Propagation};
use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::{KnownKind, Resource};
use crate::visitor::{VisitContext, Visitor};

/// Checks what abstract namespace directories may declare under the
/// current hierarchy configuration, and that inheritable objects have
/// somewhere to go.
///
/// Reads: [`HierarchyModes`].
#[derive(Debug, Default)]
pub struct AbstractNamespaceValidator;

impl AbstractNamespaceValidator {
    pub fn new() -> Self {
        Self
    }
}

/// Objects whose placement is judged elsewhere.
fn exempt(object: &Resource) -> bool {
    match object.known_kind() {
        Some(KnownKind::NamespaceSelector | KnownKind::Namespace) => true,
        Some(kind) if kind.is_system_kind() => true,
        _ => !allowed_in_namespaces(object),
    }
}

impl Visitor for AbstractNamespaceValidator {
    fn name(&self) -> &'static str {
        "abstract-namespaces"
    }

    fn visit_tree_node(&mut self, node: &TreeNode, cx: &mut VisitContext<'_>) {
        if node.is_namespace() {
            return;
        }
        let data = cx.data;
        let modes = match data.require::<HierarchyModes>() {
            Ok(modes) => modes,
            Err(e) => {
                cx.report(e);
                return;
            }
        };

        let mut inheritable = false;
        for object in node.objects.iter().filter(|o| !exempt(o)) {
            match modes.propagation(&object.group_kind()) {
                Propagation::Disabled | Propagation::None => {
                    cx.report(KnvError::IllegalAbstractNamespaceObjectKind {
                        object: object.to_ref(),
                    });
                }
                Propagation::Inherit => inheritable = true,
                Propagation::HierarchicalQuota => {}
            }
        }

        if inheritable && !node.has_namespace_below() {
            cx.report(KnvError::UnsyncableResources {
                dir: node.path.clone(),
            });
        }
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "IllegalAbstractNamespaceObjectKind",
        "Without experimentalInheritance, abstract namespace directories may only \
         declare NamespaceSelectors. With it, objects whose kind uses the `none` \
         hierarchy mode are still not allowed there.",
        KnvError::IllegalAbstractNamespaceObjectKind {
            object: example_object("namespaces/eng/rb.yaml", "rbac.authorization.k8s.io/v1", "RoleBinding", "admins"),
        },
    ))?;
    registry.register(CodeEntry::new(
        "UnsyncableResources",
        "Objects in an abstract namespace are only ever written to the namespaces \
         below it. A directory that declares such objects but has no Namespace \
         below it would silently drop them.",
        KnvError::UnsyncableResources {
            dir: "namespaces/eng".to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Directory;
    use crate::knv::Code;
    use crate::validation::testing::{config_map, namespace, repo, role, root_from, run};
    use serde_json::json;

    fn sync(kind: &str, mode: &str) -> Resource {
        Resource::new(KnownKind::Sync.gvk(), kind.to_lowercase())
            .with_spec(json!({"group": "", "kind": kind, "versions": [{"version": "v1", "hierarchyMode": mode}]}))
    }

    #[test]
    fn test_inheritance_disabled() {
        let root = root_from(vec![
            Directory::new("system").with_object(repo(false)),
            Directory::new("namespaces")
                .with_object(Resource::new(KnownKind::NamespaceSelector.gvk(), "all"))
                .with_object(role("reader")),
            Directory::new("namespaces/bar").with_object(namespace("bar")),
        ]);
        assert_eq!(
            run(&root, AbstractNamespaceValidator::new()),
            vec![Code::ILLEGAL_ABSTRACT_NAMESPACE_OBJECT_KIND]
        );
    }

    #[test]
    fn test_none_mode_rejected_when_enabled() {
        let root = root_from(vec![
            Directory::new("system")
                .with_object(repo(true))
                .with_object(sync("ConfigMap", "none")),
            Directory::new("namespaces")
                .with_object(config_map("settings"))
                .with_object(role("reader")),
            Directory::new("namespaces/bar").with_object(namespace("bar")),
        ]);
        assert_eq!(
            run(&root, AbstractNamespaceValidator::new()),
            vec![Code::ILLEGAL_ABSTRACT_NAMESPACE_OBJECT_KIND]
        );
    }

    #[test]
    fn test_inheritable_objects_need_a_namespace() {
        let root = root_from(vec![
            Directory::new("system").with_object(repo(true)),
            Directory::new("namespaces"),
            Directory::new("namespaces/eng").with_object(role("reader")),
            Directory::new("namespaces/rnd").with_object(role("writer")),
            Directory::new("namespaces/rnd/bar").with_object(namespace("bar")),
        ]);
        assert_eq!(
            run(&root, AbstractNamespaceValidator::new()),
            vec![Code::UNSYNCABLE_RESOURCES]
        );
    }
}
