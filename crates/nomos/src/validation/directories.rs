use std::collections::BTreeMap;

use super::is_dns_label;
use crate::ast::TreeNode;
use crate::knv::{CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::system::SystemConfig;
use crate::visitor::{VisitContext, Visitor};

/// Checks directory names in the namespace tree: each must be a valid,
/// unreserved namespace name, unique across the whole tree.
///
/// Reads: [`SystemConfig`].
#[derive(Debug, Default)]
pub struct DirectoryValidator {
    seen: BTreeMap<String, Vec<String>>,
}

impl DirectoryValidator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Visitor for DirectoryValidator {
    fn name(&self) -> &'static str {
        "directory-names"
    }

    fn visit_tree_node(&mut self, node: &TreeNode, cx: &mut VisitContext<'_>) {
        // The namespaces root is named by configuration, not by users.
        if !node.path.contains('/') {
            return;
        }
        let name = node.name();
        if !is_dns_label(name) {
            cx.report(KnvError::InvalidDirectoryName {
                dir: node.path.clone(),
            });
        } else {
            let data = cx.data;
            match data.require::<SystemConfig>() {
                Ok(system) if system.is_reserved(name) => {
                    cx.report(KnvError::ReservedDirectoryName {
                        dir: node.path.clone(),
                    });
                }
                Ok(_) => {}
                Err(e) => cx.report(e),
            }
        }
        self.seen
            .entry(name.to_string())
            .or_default()
            .push(node.path.clone());
    }

    fn finish(&mut self, cx: &mut VisitContext<'_>) {
        for dirs in self.seen.values().filter(|dirs| dirs.len() > 1) {
            cx.report(KnvError::DuplicateDirectoryName { dirs: dirs.clone() });
        }
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "ReservedDirectoryName",
        "Every directory below the namespaces root may become a namespace, so no \
         directory may use a reserved namespace name. Reserved names are built in \
         or listed in the nomos-reserved-namespaces ConfigMap.",
        KnvError::ReservedDirectoryName {
            dir: "namespaces/kube-public".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "DuplicateDirectoryName",
        "Directory names are unique across the namespace tree, even in unrelated \
         branches.",
        KnvError::DuplicateDirectoryName {
            dirs: vec!["namespaces/eng/bar".to_string(), "namespaces/rnd/bar".to_string()],
        },
    ))?;
    registry.register(CodeEntry::new(
        "InvalidDirectoryName",
        "Directory names below the namespaces root must be lowercase RFC 1123 labels.",
        KnvError::InvalidDirectoryName {
            dir: "namespaces/Foo_Bar".to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Directory;
    use crate::knv::Code;
    use crate::resource::kinds::RESERVED_NAMESPACES_CONFIG;
    use crate::validation::testing::{config_map, namespace, root_from, run};
    use serde_json::json;

    #[test]
    fn test_duplicate_names_across_branches() {
        let root = root_from(vec![
            Directory::new("namespaces"),
            Directory::new("namespaces/eng"),
            Directory::new("namespaces/eng/bar").with_object(namespace("bar")),
            Directory::new("namespaces/rnd"),
            Directory::new("namespaces/rnd/bar").with_object(namespace("bar")),
        ]);
        assert_eq!(
            run(&root, DirectoryValidator::new()),
            vec![Code::DUPLICATE_DIRECTORY_NAME]
        );
    }

    #[test]
    fn test_reserved_and_invalid_names() {
        let mut reserved = config_map(RESERVED_NAMESPACES_CONFIG);
        reserved
            .body
            .insert("data".to_string(), json!({"legacy": "reserved"}));
        let root = root_from(vec![
            Directory::new("namespaces"),
            Directory::new("namespaces/Invalid_Name"),
            Directory::new("namespaces/kube-public"),
            Directory::new("namespaces/legacy"),
            Directory::new("system").with_object(reserved),
        ]);
        assert_eq!(
            run(&root, DirectoryValidator::new()),
            vec![
                Code::RESERVED_DIRECTORY_NAME,
                Code::RESERVED_DIRECTORY_NAME,
                Code::INVALID_DIRECTORY_NAME
            ]
        );
    }

    #[test]
    fn test_clean_tree() {
        let root = root_from(vec![
            Directory::new("namespaces"),
            Directory::new("namespaces/default").with_object(namespace("default")),
        ]);
        assert!(run(&root, DirectoryValidator::new()).is_empty());
    }
}
