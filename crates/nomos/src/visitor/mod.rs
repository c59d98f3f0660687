//! Traversal of the policy tree.
//!
//! Read-only passes implement [`Visitor`] and report problems; rewriting
//! passes implement [`Transform`] and may edit or drop objects and whole
//! subtrees. Both are driven in the same fixed order: root, system,
//! clusterregistry, cluster, then the namespace tree in pre-order.

pub mod pipeline;

use crate::ast::{Data, NodeType, Root, TreeNode};
use crate::knv::{ErrorBuilder, KnvError};
use crate::resource::Resource;
use crate::selectors::Labels;

pub use pipeline::{Pipeline, PipelineOutcome, Stage};

/// State shared with a [`Visitor`].
pub struct VisitContext<'a> {
    pub data: &'a Data,
    pub errors: &'a mut ErrorBuilder,
}

impl VisitContext<'_> {
    pub fn report(&mut self, error: KnvError) {
        self.errors.add(error);
    }
}

/// A read-only pass. Every hook defaults to a no-op.
pub trait Visitor {
    fn name(&self) -> &'static str;

    fn visit_root(&mut self, _root: &Root, _cx: &mut VisitContext<'_>) {}

    fn visit_system_object(&mut self, _object: &Resource, _cx: &mut VisitContext<'_>) {}

    fn visit_cluster_registry_object(&mut self, _object: &Resource, _cx: &mut VisitContext<'_>) {}

    fn visit_cluster_object(&mut self, _object: &Resource, _cx: &mut VisitContext<'_>) {}

    fn visit_tree_node(&mut self, _node: &TreeNode, _cx: &mut VisitContext<'_>) {}

    fn visit_object(&mut self, _node: &TreeNode, _object: &Resource, _cx: &mut VisitContext<'_>) {}

    fn leave_tree_node(&mut self, _node: &TreeNode, _cx: &mut VisitContext<'_>) {}

    /// Called once after the whole tree has been visited.
    fn finish(&mut self, _cx: &mut VisitContext<'_>) {}
}

pub fn walk(root: &Root, visitor: &mut dyn Visitor, cx: &mut VisitContext<'_>) {
    visitor.visit_root(root, cx);
    for object in &root.system.objects {
        visitor.visit_system_object(object, cx);
    }
    for object in &root.cluster_registry.objects {
        visitor.visit_cluster_registry_object(object, cx);
    }
    for object in &root.cluster.objects {
        visitor.visit_cluster_object(object, cx);
    }
    if let Some(tree) = &root.tree {
        walk_node(tree, visitor, cx);
    }
    visitor.finish(cx);
}

fn walk_node(node: &TreeNode, visitor: &mut dyn Visitor, cx: &mut VisitContext<'_>) {
    visitor.visit_tree_node(node, cx);
    for object in &node.objects {
        visitor.visit_object(node, object, cx);
    }
    for child in &node.children {
        walk_node(child, visitor, cx);
    }
    visitor.leave_tree_node(node, cx);
}

/// State shared with a [`Transform`].
pub struct TransformContext<'a> {
    pub data: &'a mut Data,
    pub errors: &'a mut ErrorBuilder,
}

/// What to do with the object or subtree a hook was called for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Keep,
    Remove,
}

/// Identity of the node an object lives in, handed to object hooks while
/// the node itself is mutably borrowed.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeScope {
    pub path: String,
    pub node_type: NodeType,
    pub namespace_labels: Labels,
}

impl NodeScope {
    fn of(node: &TreeNode) -> Self {
        Self {
            path: node.path.clone(),
            node_type: node.node_type,
            namespace_labels: node.namespace_labels(),
        }
    }
}

/// A rewriting pass. Hooks keep everything by default.
pub trait Transform {
    fn name(&self) -> &'static str;

    fn transform_root(&mut self, _root: &mut Root, _cx: &mut TransformContext<'_>) {}

    fn transform_system_object(&mut self, _object: &mut Resource, _cx: &mut TransformContext<'_>) -> Action {
        Action::Keep
    }

    fn transform_cluster_registry_object(
        &mut self,
        _object: &mut Resource,
        _cx: &mut TransformContext<'_>,
    ) -> Action {
        Action::Keep
    }

    fn transform_cluster_object(&mut self, _object: &mut Resource, _cx: &mut TransformContext<'_>) -> Action {
        Action::Keep
    }

    /// Called before a node's objects and children. Returning
    /// [`Action::Remove`] drops the node and its whole subtree.
    fn enter_tree_node(&mut self, _node: &mut TreeNode, _cx: &mut TransformContext<'_>) -> Action {
        Action::Keep
    }

    fn transform_object(
        &mut self,
        _scope: &NodeScope,
        _object: &mut Resource,
        _cx: &mut TransformContext<'_>,
    ) -> Action {
        Action::Keep
    }

    fn leave_tree_node(&mut self, _node: &mut TreeNode, _cx: &mut TransformContext<'_>) {}

    /// Called once after the whole tree has been rewritten.
    fn finish(&mut self, _root: &mut Root, _cx: &mut TransformContext<'_>) {}
}

pub fn apply(root: &mut Root, transform: &mut dyn Transform, cx: &mut TransformContext<'_>) {
    transform.transform_root(root, cx);
    root.system
        .objects
        .retain_mut(|o| transform.transform_system_object(o, cx) == Action::Keep);
    root.cluster_registry
        .objects
        .retain_mut(|o| transform.transform_cluster_registry_object(o, cx) == Action::Keep);
    root.cluster
        .objects
        .retain_mut(|o| transform.transform_cluster_object(o, cx) == Action::Keep);

    let keep_tree = match root.tree.as_mut() {
        Some(tree) => apply_node(tree, transform, cx) == Action::Keep,
        None => true,
    };
    if !keep_tree {
        root.tree = None;
    }
    transform.finish(root, cx);
}

fn apply_node(node: &mut TreeNode, transform: &mut dyn Transform, cx: &mut TransformContext<'_>) -> Action {
    if transform.enter_tree_node(node, cx) == Action::Remove {
        return Action::Remove;
    }
    let scope = NodeScope::of(node);
    node.objects
        .retain_mut(|o| transform.transform_object(&scope, o, cx) == Action::Keep);
    node.children
        .retain_mut(|child| apply_node(child, transform, cx) == Action::Keep);
    transform.leave_tree_node(node, cx);
    Action::Keep
}
