use std::collections::BTreeMap;

use crate::ast::TreeNode;
use crate::resource::kinds::{CLUSTER_SELECTOR_ANNOTATION, NAMESPACE_SELECTOR_ANNOTATION};
use crate::resource::Resource;
use crate::selectors::{ClusterSelectors, LabelSelector};
use crate::visitor::{Action, NodeScope, Transform, TransformContext};

/// Replaces selector names in selector annotations with the canonical JSON
/// of the referenced selector, so emitted objects are self-describing.
///
/// Reads: [`ClusterSelectors`].
#[derive(Debug, Default)]
pub struct AnnotationInliner {
    /// NamespaceSelectors in scope, one frame per entered directory.
    scopes: Vec<BTreeMap<String, LabelSelector>>,
}

impl AnnotationInliner {
    pub fn new() -> Self {
        Self::default()
    }

    fn namespace_selector(&self, name: &str) -> Option<&LabelSelector> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }

    fn inline(&self, object: &mut Resource, cx: &mut TransformContext<'_>) {
        if let Some(name) = object.annotation(NAMESPACE_SELECTOR_ANNOTATION) {
            if let Some(json) = self.namespace_selector(name).and_then(to_json) {
                object.set_annotation(NAMESPACE_SELECTOR_ANNOTATION, json);
            }
        }

        let Some(name) = object.annotation(CLUSTER_SELECTOR_ANNOTATION) else {
            return;
        };
        match cx.data.require::<ClusterSelectors>() {
            Ok(selectors) => {
                if let Some(json) = selectors.selector(name).and_then(to_json) {
                    object.set_annotation(CLUSTER_SELECTOR_ANNOTATION, json);
                }
            }
            Err(e) => cx.errors.add(e),
        }
    }
}

fn to_json(selector: &LabelSelector) -> Option<String> {
    serde_json::to_string(selector).ok()
}

impl Transform for AnnotationInliner {
    fn name(&self) -> &'static str {
        "inline-selector-annotations"
    }

    fn transform_cluster_object(&mut self, object: &mut Resource, cx: &mut TransformContext<'_>) -> Action {
        self.inline(object, cx);
        Action::Keep
    }

    fn enter_tree_node(&mut self, node: &mut TreeNode, _cx: &mut TransformContext<'_>) -> Action {
        self.scopes.push(node.selectors.clone());
        Action::Keep
    }

    fn transform_object(
        &mut self,
        _scope: &NodeScope,
        object: &mut Resource,
        cx: &mut TransformContext<'_>,
    ) -> Action {
        self.inline(object, cx);
        Action::Keep
    }

    fn leave_tree_node(&mut self, _node: &mut TreeNode, _cx: &mut TransformContext<'_>) {
        self.scopes.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Data, NodeType, Root};
    use crate::knv::ErrorBuilder;
    use crate::resource::KnownKind;
    use crate::visitor::apply;
    use serde_json::json;

    #[test]
    fn test_inlines_both_selector_kinds() {
        let registry = vec![
            Resource::new(KnownKind::ClusterSelector.gvk(), "prod")
                .with_spec(json!({"selector": {"matchLabels": {"env": "prod"}}})),
        ];
        let mut data = Data::new();
        data.insert(ClusterSelectors::resolve(&registry, None));

        let mut tree = TreeNode::new("namespaces", NodeType::AbstractNamespace);
        tree.selectors.insert(
            "sre".to_string(),
            LabelSelector {
                match_labels: [("team".to_string(), "sre".to_string())].into(),
                ..Default::default()
            },
        );
        let mut leaf = TreeNode::new("namespaces/ops", NodeType::Namespace);
        leaf.objects.push(
            Resource::new(KnownKind::ConfigMap.gvk(), "cfg")
                .with_annotation(NAMESPACE_SELECTOR_ANNOTATION, "sre")
                .with_annotation(CLUSTER_SELECTOR_ANNOTATION, "prod"),
        );
        tree.children.push(leaf);

        let mut root = Root::default();
        root.tree = Some(tree);
        let mut errors = ErrorBuilder::new();
        apply(
            &mut root,
            &mut AnnotationInliner::new(),
            &mut TransformContext { data: &mut data, errors: &mut errors },
        );

        let object = &root.tree.unwrap().children[0].objects[0];
        assert_eq!(
            object.annotation(NAMESPACE_SELECTOR_ANNOTATION),
            Some(r#"{"matchLabels":{"team":"sre"}}"#)
        );
        assert_eq!(
            object.annotation(CLUSTER_SELECTOR_ANNOTATION),
            Some(r#"{"matchLabels":{"env":"prod"}}"#)
        );
    }
}
