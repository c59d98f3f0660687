//! In-memory model of a policy repository.
//!
//! A [`Root`] holds the three flat top-level sections and the optional
//! namespace hierarchy. Passes see the tree through [`crate::visitor`];
//! derived facts travel beside it in a [`Data`] side-table.

pub mod builder;
pub mod data;

use std::collections::BTreeMap;

use crate::resource::{KnownKind, Resource};
use crate::selectors::{LabelSelector, Labels};

pub use builder::TreeBuilder;
pub use data::Data;

pub const SYSTEM_DIR: &str = "system";
pub const CLUSTER_REGISTRY_DIR: &str = "clusterregistry";
pub const CLUSTER_DIR: &str = "cluster";
pub const DEFAULT_NAMESPACES_DIR: &str = "namespaces";

/// One directory of the repository with the objects declared directly in it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directory {
    /// Slash-separated path relative to the repository root; `""` is the root.
    pub path: String,
    pub objects: Vec<Resource>,
}

impl Directory {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            objects: Vec::new(),
        }
    }

    pub fn with_object(mut self, object: Resource) -> Self {
        self.objects.push(object);
        self
    }
}

/// Objects from `system/`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct System {
    pub objects: Vec<Resource>,
}

/// Objects from `clusterregistry/`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterRegistry {
    pub objects: Vec<Resource>,
}

/// Objects from `cluster/`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cluster {
    pub objects: Vec<Resource>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Root {
    pub system: System,
    pub cluster_registry: ClusterRegistry,
    pub cluster: Cluster,
    /// The namespaces directory, if the repository has one.
    pub tree: Option<TreeNode>,
}

impl Root {
    /// Namespace nodes in pre-order.
    pub fn namespaces(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        if let Some(tree) = &self.tree {
            tree.collect_namespaces(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// A leaf directory declaring a Namespace.
    Namespace,
    /// An intermediate directory whose objects may be inherited.
    AbstractNamespace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub path: String,
    pub node_type: NodeType,
    pub objects: Vec<Resource>,
    pub children: Vec<TreeNode>,
    /// Well-formed NamespaceSelectors declared in this directory, by name.
    pub selectors: BTreeMap<String, LabelSelector>,
}

impl TreeNode {
    pub fn new(path: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            path: path.into(),
            node_type,
            objects: Vec::new(),
            children: Vec::new(),
            selectors: BTreeMap::new(),
        }
    }

    /// Base name of the directory.
    pub fn name(&self) -> &str {
        base_name(&self.path)
    }

    pub fn is_namespace(&self) -> bool {
        self.node_type == NodeType::Namespace
    }

    pub fn namespace_object(&self) -> Option<&Resource> {
        self.objects.iter().find(|o| o.is(KnownKind::Namespace))
    }

    /// Labels of the node's Namespace object; empty for abstract nodes.
    pub fn namespace_labels(&self) -> Labels {
        self.namespace_object()
            .map(|ns| ns.metadata.labels.clone())
            .unwrap_or_default()
    }

    /// Whether the subtree rooted here contains any Namespace node.
    pub fn has_namespace_below(&self) -> bool {
        self.is_namespace() || self.children.iter().any(TreeNode::has_namespace_below)
    }

    fn collect_namespaces<'a>(&'a self, out: &mut Vec<&'a TreeNode>) {
        if self.is_namespace() {
            out.push(self);
        }
        for child in &self.children {
            child.collect_namespaces(out);
        }
    }
}

/// Role of a directory, determined by its top-level component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirRole {
    Root,
    System,
    ClusterRegistry,
    Cluster,
    Namespaces,
    Ignored,
}

/// Maps directory paths to roles. The namespaces root is configurable.
#[derive(Debug, Clone)]
pub struct Layout {
    namespaces_dir: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACES_DIR)
    }
}

impl Layout {
    pub fn new(namespaces_dir: impl Into<String>) -> Self {
        Self {
            namespaces_dir: namespaces_dir.into(),
        }
    }

    pub fn namespaces_dir(&self) -> &str {
        &self.namespaces_dir
    }

    /// Role and depth below the top-level directory (0 for the top-level
    /// directory itself).
    pub fn classify(&self, path: &str) -> (DirRole, usize) {
        if path.is_empty() {
            return (DirRole::Root, 0);
        }
        let mut parts = path.split('/');
        let top = parts.next().unwrap_or_default();
        let depth = parts.count();
        let role = match top {
            SYSTEM_DIR => DirRole::System,
            CLUSTER_REGISTRY_DIR => DirRole::ClusterRegistry,
            CLUSTER_DIR => DirRole::Cluster,
            t if t == self.namespaces_dir => DirRole::Namespaces,
            _ => DirRole::Ignored,
        };
        (role, depth)
    }
}

pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn parent_path(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Whether `path` lies strictly below `dir`.
pub fn is_within(path: &str, dir: &str) -> bool {
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_classify() {
        let layout = Layout::default();
        assert_eq!(layout.classify(""), (DirRole::Root, 0));
        assert_eq!(layout.classify("system"), (DirRole::System, 0));
        assert_eq!(layout.classify("system/extra"), (DirRole::System, 1));
        assert_eq!(layout.classify("namespaces/a/b"), (DirRole::Namespaces, 2));
        assert_eq!(layout.classify("docs"), (DirRole::Ignored, 0));

        let custom = Layout::new("tree");
        assert_eq!(custom.classify("tree/a"), (DirRole::Namespaces, 1));
        assert_eq!(custom.classify("namespaces/a"), (DirRole::Ignored, 1));
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(base_name("namespaces/foo/bar"), "bar");
        assert_eq!(base_name("namespaces"), "namespaces");
        assert_eq!(parent_path("namespaces/foo/bar"), "namespaces/foo");
        assert_eq!(parent_path("namespaces"), "");
    }

    #[test]
    fn test_has_namespace_below() {
        let mut root = TreeNode::new("namespaces", NodeType::AbstractNamespace);
        let mut mid = TreeNode::new("namespaces/mid", NodeType::AbstractNamespace);
        assert!(!mid.has_namespace_below());
        mid.children
            .push(TreeNode::new("namespaces/mid/leaf", NodeType::Namespace));
        root.children.push(mid);
        assert!(root.has_namespace_below());
    }
}
