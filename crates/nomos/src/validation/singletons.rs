use crate::ast::TreeNode;
use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::kinds::RESERVED_NAMESPACES_CONFIG;
use crate::resource::{KnownKind, Resource, ResourceRef};
use crate::visitor::{VisitContext, Visitor};

/// Kinds that may appear at most once per scope: one Repo and one
/// reserved-namespaces ConfigMap in `system/`, one Namespace and one
/// ResourceQuota per tree directory. The Repo is also required.
#[derive(Debug, Default)]
pub struct SingletonValidator {
    repos: Vec<ResourceRef>,
    reserved_configs: Vec<ResourceRef>,
}

impl SingletonValidator {
    pub fn new() -> Self {
        Self::default()
    }
}

fn refs_of(node: &TreeNode, kind: KnownKind) -> Vec<ResourceRef> {
    node.objects
        .iter()
        .filter(|o| o.is(kind))
        .map(Resource::to_ref)
        .collect()
}

impl Visitor for SingletonValidator {
    fn name(&self) -> &'static str {
        "singletons"
    }

    fn visit_system_object(&mut self, object: &Resource, _cx: &mut VisitContext<'_>) {
        if object.is(KnownKind::Repo) {
            self.repos.push(object.to_ref());
        } else if object.is(KnownKind::ConfigMap) && object.name() == RESERVED_NAMESPACES_CONFIG {
            self.reserved_configs.push(object.to_ref());
        }
    }

    fn visit_tree_node(&mut self, node: &TreeNode, cx: &mut VisitContext<'_>) {
        let namespaces = refs_of(node, KnownKind::Namespace);
        if namespaces.len() > 1 {
            cx.report(KnvError::MultipleSingletons {
                kind: "Namespace".to_string(),
                objects: namespaces,
            });
        }

        let quotas = refs_of(node, KnownKind::ResourceQuota);
        if quotas.len() > 1 {
            cx.report(KnvError::ConflictingResourceQuota {
                dir: node.path.clone(),
                quotas,
            });
        }
    }

    fn finish(&mut self, cx: &mut VisitContext<'_>) {
        match self.repos.len() {
            0 => cx.report(KnvError::MissingRepo),
            1 => {}
            _ => cx.report(KnvError::MultipleSingletons {
                kind: "Repo".to_string(),
                objects: self.repos.clone(),
            }),
        }
        if self.reserved_configs.len() > 1 {
            cx.report(KnvError::MultipleSingletons {
                kind: "ConfigMap".to_string(),
                objects: self.reserved_configs.clone(),
            });
        }
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "ConflictingResourceQuota",
        "A directory may declare at most one ResourceQuota. Combine the limits \
         into a single object.",
        KnvError::ConflictingResourceQuota {
            dir: "namespaces/bar".to_string(),
            quotas: vec![
                example_object("namespaces/bar/rq.yaml", "v1", "ResourceQuota", "quota"),
                example_object("namespaces/bar/rq-2.yaml", "v1", "ResourceQuota", "quota-2"),
            ],
        },
    ))?;
    registry.register(CodeEntry::new(
        "MissingRepo",
        "system/ must declare exactly one Repo object describing the repository \
         format.",
        KnvError::MissingRepo,
    ))?;
    registry.register(CodeEntry::new(
        "MultipleSingletons",
        "Some objects may only be declared once: the Repo and the \
         nomos-reserved-namespaces ConfigMap in system/, and the Namespace of a \
         namespace directory.",
        KnvError::MultipleSingletons {
            kind: "Repo".to_string(),
            objects: vec![
                example_object("system/repo.yaml", "nomos.dev/v1", "Repo", "repo"),
                example_object("system/repo-2.yaml", "nomos.dev/v1", "Repo", "repo-2"),
            ],
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Directory;
    use crate::knv::Code;
    use crate::validation::testing::{namespace, repo, root_from, run};

    fn quota(source: &str) -> Resource {
        Resource::new(KnownKind::ResourceQuota.gvk(), "quota").at(source)
    }

    #[test]
    fn test_repo_count() {
        let none = root_from(vec![Directory::new("system")]);
        assert_eq!(run(&none, SingletonValidator::new()), vec![Code::MISSING_REPO]);

        let one = root_from(vec![Directory::new("system").with_object(repo(false))]);
        assert!(run(&one, SingletonValidator::new()).is_empty());

        let two = root_from(vec![Directory::new("system")
            .with_object(repo(false))
            .with_object(repo(false).at("system/repo-2.yaml"))]);
        assert_eq!(
            run(&two, SingletonValidator::new()),
            vec![Code::MULTIPLE_SINGLETONS]
        );
    }

    #[test]
    fn test_two_quotas_in_one_directory() {
        let root = root_from(vec![
            Directory::new("system").with_object(repo(false)),
            Directory::new("namespaces"),
            Directory::new("namespaces/bar")
                .with_object(namespace("bar"))
                .with_object(quota("namespaces/bar/rq.yaml"))
                .with_object(quota("namespaces/bar/rq-2.yaml")),
        ]);
        let codes = run(&root, SingletonValidator::new());
        assert_eq!(codes, vec![Code::CONFLICTING_RESOURCE_QUOTA]);
    }

    #[test]
    fn test_quotas_in_different_directories() {
        let root = root_from(vec![
            Directory::new("system").with_object(repo(false)),
            Directory::new("namespaces").with_object(quota("namespaces/rq.yaml")),
            Directory::new("namespaces/bar")
                .with_object(namespace("bar"))
                .with_object(quota("namespaces/bar/rq.yaml")),
        ]);
        assert!(run(&root, SingletonValidator::new()).is_empty());
    }

    #[test]
    fn test_two_namespaces_in_one_directory() {
        let root = root_from(vec![
            Directory::new("system").with_object(repo(false)),
            Directory::new("namespaces"),
            Directory::new("namespaces/bar")
                .with_object(namespace("bar").at("namespaces/bar/a.yaml"))
                .with_object(namespace("bar").at("namespaces/bar/b.yaml")),
        ]);
        assert_eq!(
            run(&root, SingletonValidator::new()),
            vec![Code::MULTIPLE_SINGLETONS]
        );
    }
}
