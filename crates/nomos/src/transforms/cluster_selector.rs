use crate::ast::TreeNode;
use crate::resource::Resource;
use crate::selectors::ClusterSelectors;
use crate::visitor::{Action, NodeScope, Transform, TransformContext};

/// Drops objects whose ClusterSelector does not apply to the current
/// cluster. A Namespace that is dropped takes its whole directory with it.
///
/// Reads: [`ClusterSelectors`].
#[derive(Debug, Default)]
pub struct ClusterSelectorTransform;

impl ClusterSelectorTransform {
    fn decide(object: &Resource, cx: &mut TransformContext<'_>) -> Action {
        let keeps = match cx.data.require::<ClusterSelectors>() {
            Ok(selectors) => selectors.keeps(object),
            Err(e) => {
                cx.errors.add(e);
                return Action::Keep;
            }
        };
        if keeps {
            Action::Keep
        } else {
            tracing::debug!(source = %object.source, name = object.name(), "excluded by cluster selector");
            Action::Remove
        }
    }
}

impl Transform for ClusterSelectorTransform {
    fn name(&self) -> &'static str {
        "cluster-selector-filter"
    }

    fn transform_cluster_object(&mut self, object: &mut Resource, cx: &mut TransformContext<'_>) -> Action {
        Self::decide(object, cx)
    }

    fn enter_tree_node(&mut self, node: &mut TreeNode, cx: &mut TransformContext<'_>) -> Action {
        if !node.is_namespace() {
            return Action::Keep;
        }
        match node.namespace_object() {
            Some(namespace) => Self::decide(namespace, cx),
            None => Action::Keep,
        }
    }

    fn transform_object(
        &mut self,
        _scope: &NodeScope,
        object: &mut Resource,
        cx: &mut TransformContext<'_>,
    ) -> Action {
        Self::decide(object, cx)
    }
}
