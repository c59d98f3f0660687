//! Assembles loaded directories into a [`Root`].

use super::{is_within, parent_path, DirRole, Directory, Layout, NodeType, Root, TreeNode};
use crate::knv::{CodeEntry, CodeRegistry, ErrorBuilder, KnvError, RegistryError};
use crate::resource::KnownKind;
use crate::selectors::SelectorSpec;

/// Builds the repository model from directories listed in depth-first
/// pre-order, as produced by [`crate::loader::ManifestLoader`].
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    layout: Layout,
}

impl TreeBuilder {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Structural problems are reported to `errors` and the offending
    /// directories are skipped. A directory whose parent was never seen
    /// means the input was not in pre-order and fails the build.
    pub fn build(
        &self,
        directories: Vec<Directory>,
        errors: &mut ErrorBuilder,
    ) -> Result<Root, KnvError> {
        let mut root = Root::default();
        let mut stack: Vec<TreeNode> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();

        for dir in directories {
            if skipped.iter().any(|s| is_within(&dir.path, s)) {
                continue;
            }

            let (role, depth) = self.layout.classify(&dir.path);
            match role {
                DirRole::Root | DirRole::Ignored => {
                    if !dir.objects.is_empty() {
                        tracing::debug!(path = %dir.path, "ignoring objects outside the policy directories");
                    }
                }
                DirRole::System | DirRole::ClusterRegistry | DirRole::Cluster => {
                    if depth > 0 {
                        let base = dir.path.split('/').next().unwrap_or_default().to_string();
                        errors.add(KnvError::IllegalSubdirectory {
                            base,
                            dir: dir.path.clone(),
                        });
                        skipped.push(dir.path);
                        continue;
                    }
                    let target = match role {
                        DirRole::System => &mut root.system.objects,
                        DirRole::ClusterRegistry => &mut root.cluster_registry.objects,
                        _ => &mut root.cluster.objects,
                    };
                    target.extend(dir.objects);
                }
                DirRole::Namespaces => {
                    if depth == 0 {
                        if !stack.is_empty() || root.tree.is_some() {
                            return Err(KnvError::internal(format!(
                                "namespaces directory {} visited twice",
                                dir.path
                            )));
                        }
                        // The tree root never becomes a Namespace node; a
                        // Namespace declared there is reported by validation.
                        stack.push(new_node(dir, NodeType::AbstractNamespace));
                        continue;
                    }

                    let parent = parent_path(&dir.path).to_string();
                    while stack.last().is_some_and(|top| top.path != parent) {
                        pop_into_parent(&mut stack, &mut root);
                    }
                    match stack.last() {
                        None => {
                            return Err(KnvError::internal(format!(
                                "parent directory {} of {} was not visited",
                                parent, dir.path
                            )));
                        }
                        Some(top) if top.is_namespace() => {
                            errors.add(KnvError::IllegalNamespaceSubdirectory {
                                parent,
                                child: dir.path.clone(),
                            });
                            skipped.push(dir.path);
                            continue;
                        }
                        Some(_) => {}
                    }

                    let node_type = if dir.objects.iter().any(|o| o.is(KnownKind::Namespace)) {
                        NodeType::Namespace
                    } else {
                        NodeType::AbstractNamespace
                    };
                    stack.push(new_node(dir, node_type));
                }
            }
        }

        while !stack.is_empty() {
            pop_into_parent(&mut stack, &mut root);
        }

        tracing::debug!(
            system = root.system.objects.len(),
            cluster_registry = root.cluster_registry.objects.len(),
            cluster = root.cluster.objects.len(),
            namespaces = root.namespaces().len(),
            "built policy tree"
        );
        Ok(root)
    }
}

fn new_node(dir: Directory, node_type: NodeType) -> TreeNode {
    let mut node = TreeNode::new(dir.path, node_type);
    for object in dir.objects.iter().filter(|o| o.is(KnownKind::NamespaceSelector)) {
        if let Ok(spec) = object.decode_spec::<SelectorSpec>() {
            if spec.selector.compile().is_ok() {
                node.selectors.insert(object.name().to_string(), spec.selector);
            }
        }
    }
    node.objects = dir.objects;
    node
}

fn pop_into_parent(stack: &mut Vec<TreeNode>, root: &mut Root) {
    if let Some(node) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => root.tree = Some(node),
        }
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "IllegalNamespaceSubdirectory",
        "A directory that declares a Namespace is a leaf of the hierarchy. Its \
         subdirectories, and everything below them, are rejected.",
        KnvError::IllegalNamespaceSubdirectory {
            parent: "namespaces/bar".to_string(),
            child: "namespaces/bar/extra".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "IllegalSubdirectory",
        "The system/, cluster/ and clusterregistry/ directories are flat.",
        KnvError::IllegalSubdirectory {
            base: "system".to_string(),
            dir: "system/extra".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "Internal",
        "The compiler reached a state that should be impossible. Please report it.",
        KnvError::internal("parent directory namespaces/a of namespaces/a/b was not visited"),
    ))?;
    Ok(())
}
