use std::collections::BTreeMap;

use crate::ast::{is_within, TreeNode};
use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::kinds::RESERVED_NAMESPACES_CONFIG;
use crate::resource::{GroupKind, KnownKind, Resource, ResourceRef};
use crate::visitor::{VisitContext, Visitor};

type Key = (GroupKind, String);

/// Detects objects of one group/kind sharing a name where both would end up
/// in the same place: within a flat directory, or within a tree directory
/// and its ancestors.
///
/// Namespaces and ResourceQuotas are exempt: duplicates within a directory
/// are reported by [`super::SingletonValidator`], and quotas along a path
/// are merged rather than overwritten.
#[derive(Debug, Default)]
pub struct NameCollisionValidator {
    flat: BTreeMap<(&'static str, GroupKind, String), Vec<ResourceRef>>,
    tree: BTreeMap<Key, Vec<(String, ResourceRef)>>,
}

impl NameCollisionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_flat(&mut self, section: &'static str, object: &Resource) {
        if object.name().is_empty() {
            return;
        }
        self.flat
            .entry((section, object.group_kind(), object.name().to_string()))
            .or_default()
            .push(object.to_ref());
    }
}

fn collide(a: &(String, ResourceRef), b: &(String, ResourceRef)) -> bool {
    a.0 == b.0 || is_within(&a.0, &b.0) || is_within(&b.0, &a.0)
}

impl Visitor for NameCollisionValidator {
    fn name(&self) -> &'static str {
        "name-collisions"
    }

    fn visit_system_object(&mut self, object: &Resource, _cx: &mut VisitContext<'_>) {
        // Extra Repos and reserved-namespace ConfigMaps are reported as
        // singletons.
        let singleton = object.is(KnownKind::Repo)
            || (object.is(KnownKind::ConfigMap) && object.name() == RESERVED_NAMESPACES_CONFIG);
        if !singleton {
            self.record_flat("system", object);
        }
    }

    fn visit_cluster_registry_object(&mut self, object: &Resource, _cx: &mut VisitContext<'_>) {
        self.record_flat("clusterregistry", object);
    }

    fn visit_cluster_object(&mut self, object: &Resource, _cx: &mut VisitContext<'_>) {
        self.record_flat("cluster", object);
    }

    fn visit_object(&mut self, node: &TreeNode, object: &Resource, _cx: &mut VisitContext<'_>) {
        if object.name().is_empty()
            || object.is(KnownKind::Namespace)
            || object.is(KnownKind::ResourceQuota)
        {
            return;
        }
        self.tree
            .entry((object.group_kind(), object.name().to_string()))
            .or_default()
            .push((node.path.clone(), object.to_ref()));
    }

    fn finish(&mut self, cx: &mut VisitContext<'_>) {
        for ((_, _, name), objects) in &self.flat {
            if objects.len() > 1 {
                cx.report(KnvError::MetadataNameCollision {
                    name: name.clone(),
                    objects: objects.clone(),
                });
            }
        }

        for ((_, name), entries) in &self.tree {
            let colliding: Vec<ResourceRef> = entries
                .iter()
                .enumerate()
                .filter(|(i, a)| {
                    entries
                        .iter()
                        .enumerate()
                        .any(|(j, b)| *i != j && collide(a, b))
                })
                .map(|(_, (_, object))| object.clone())
                .collect();
            if !colliding.is_empty() {
                cx.report(KnvError::MetadataNameCollision {
                    name: name.clone(),
                    objects: colliding,
                });
            }
        }
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "MetadataNameCollision",
        "Two objects of the same group and kind may not share a name if they are \
         declared in the same directory, or if one is declared in a directory \
         above the other. Both would be written to the same namespace.",
        KnvError::MetadataNameCollision {
            name: "admins".to_string(),
            objects: vec![
                example_object("namespaces/eng/rb.yaml", "rbac.authorization.k8s.io/v1", "RoleBinding", "admins"),
                example_object("namespaces/eng/bar/rb.yaml", "rbac.authorization.k8s.io/v1", "RoleBinding", "admins"),
            ],
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
    fn test_ancestor_collision() {
        let root = root_from(vec![
            Directory::new("namespaces"),
            Directory::new("namespaces/eng").with_object(role("admin").at("namespaces/eng/r.yaml")),
            Directory::new("namespaces/eng/bar")
                .with_object(namespace("bar"))
                .with_object(role("admin").at("namespaces/eng/bar/r.yaml")),
        ]);
        assert_eq!(
            run(&root, NameCollisionValidator::new()),
            vec![Code::METADATA_NAME_COLLISION]
        );
    }

    #[test]
    fn test_sibling_branches_do_not_collide() {
        let root = root_from(vec![
            Directory::new("namespaces"),
            Directory::new("namespaces/bar")
                .with_object(namespace("bar"))
                .with_object(role("admin")),
            Directory::new("namespaces/baz")
                .with_object(namespace("baz"))
                .with_object(role("admin"))
                .with_object(config_map("admin")),
        ]);
        assert!(run(&root, NameCollisionValidator::new()).is_empty());
    }

    #[test]
    fn test_flat_sections() {
        let root = root_from(vec![
            Directory::new("system")
                .with_object(repo(false))
                .with_object(repo(false)),
            Directory::new("cluster")
                .with_object(role("viewer").at("cluster/a.yaml"))
                .with_object(role("viewer").at("cluster/b.yaml")),
        ]);
        assert_eq!(
            run(&root, NameCollisionValidator::new()),
            vec![Code::METADATA_NAME_COLLISION]
        );
    }

    #[test]
    fn test_quotas_exempt() {
        let quota = || Resource::new(KnownKind::ResourceQuota.gvk(), "quota");
        let root = root_from(vec![
            Directory::new("namespaces").with_object(quota().at("namespaces/q.yaml")),
            Directory::new("namespaces/bar")
                .with_object(namespace("bar"))
                .with_object(quota().at("namespaces/bar/a.yaml"))
                .with_object(quota().at("namespaces/bar/b.yaml")),
        ]);
        assert!(run(&root, NameCollisionValidator::new()).is_empty());
    }
}
