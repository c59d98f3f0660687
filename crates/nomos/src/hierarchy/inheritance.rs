//! Copies objects from abstract namespaces into the namespaces below them.

use super::{HierarchyModes, Propagation};
use crate::ast::{NodeType, TreeNode};
use crate::resource::kinds::NAMESPACE_SELECTOR_ANNOTATION;
use crate::resource::{KnownKind, Resource};
use crate::selectors::{LabelSelector, Labels};
use crate::visitor::{Action, Transform, TransformContext};

/// Moves inheritable objects out of abstract namespaces and into every
/// descendant namespace they apply to. Objects in hierarchical-quota mode
/// stay where they are.
///
/// Runs after [`crate::transforms::AnnotationInliner`]: namespace-selector
/// annotations must already hold selector JSON.
///
/// Reads: [`HierarchyModes`].
#[derive(Debug, Default)]
pub struct InheritanceTransform {
    /// Objects inherited from each entered abstract namespace.
    frames: Vec<Vec<Resource>>,
}

impl InheritanceTransform {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Whether an object's namespace selector, if any, matches `labels`. A
/// selector that cannot be read matches nothing.
pub fn selector_applies(object: &Resource, labels: &Labels) -> bool {
    match object.annotation(NAMESPACE_SELECTOR_ANNOTATION) {
        None => true,
        Some(json) => serde_json::from_str::<LabelSelector>(json)
            .ok()
            .and_then(|s| s.compile().ok())
            .is_some_and(|s| s.matches(labels)),
    }
}

impl Transform for InheritanceTransform {
    fn name(&self) -> &'static str {
        "inheritance"
    }

    fn enter_tree_node(&mut self, node: &mut TreeNode, cx: &mut TransformContext<'_>) -> Action {
        let modes = match cx.data.require::<HierarchyModes>() {
            Ok(modes) => modes,
            Err(e) => {
                cx.errors.add(e);
                return Action::Keep;
            }
        };

        match node.node_type {
            NodeType::AbstractNamespace => {
                let mut frame = Vec::new();
                node.objects.retain(|object| {
                    let inherits = !object.is(KnownKind::NamespaceSelector)
                        && modes.propagation(&object.group_kind()) == Propagation::Inherit;
                    if inherits {
                        frame.push(object.clone());
                    }
                    !inherits
                });
                self.frames.push(frame);
            }
            NodeType::Namespace => {
                let labels = node.namespace_labels();
                node.objects.retain(|object| selector_applies(object, &labels));
                let inherited: Vec<Resource> = self
                    .frames
                    .iter()
                    .flatten()
                    .filter(|object| selector_applies(object, &labels))
                    .cloned()
                    .collect();
                if !inherited.is_empty() {
                    tracing::trace!(namespace = node.name(), count = inherited.len(), "inherited objects");
                }
                node.objects.extend(inherited);
            }
        }
        Action::Keep
    }

    fn leave_tree_node(&mut self, node: &mut TreeNode, _cx: &mut TransformContext<'_>) {
        if node.node_type == NodeType::AbstractNamespace {
            self.frames.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Data, Root};
    use crate::hierarchy::HierarchyMode;
    use crate::knv::ErrorBuilder;
    use crate::resource::GroupVersionKind;
    use crate::visitor::apply;

    fn role_binding(name: &str) -> Resource {
        Resource::new(
            GroupVersionKind::new("rbac.authorization.k8s.io", "v1", "RoleBinding"),
            name,
        )
    }

    fn namespace_node(path: &str, env: &str) -> TreeNode {
        let mut node = TreeNode::new(path, NodeType::Namespace);
        let name = path.rsplit('/').next().unwrap();
        node.objects
            .push(Resource::new(KnownKind::Namespace.gvk(), name).with_label("env", env));
        node
    }

    fn sample_root(abstract_objects: Vec<Resource>) -> Root {
        let mut eng = TreeNode::new("namespaces/eng", NodeType::AbstractNamespace);
        eng.objects = abstract_objects;
        eng.children.push(namespace_node("namespaces/eng/api", "prod"));
        eng.children.push(namespace_node("namespaces/eng/web", "dev"));
        let mut tree = TreeNode::new("namespaces", NodeType::AbstractNamespace);
        tree.objects.push(role_binding("everyone"));
        tree.children.push(eng);
        tree.children.push(namespace_node("namespaces/other", "dev"));
        Root {
            tree: Some(tree),
            ..Default::default()
        }
    }

    fn run(root: &mut Root, modes: HierarchyModes) {
        let mut data = Data::new();
        data.insert(modes);
        let mut errors = ErrorBuilder::new();
        apply(
            root,
            &mut InheritanceTransform::new(),
            &mut TransformContext { data: &mut data, errors: &mut errors },
        );
        assert!(errors.is_empty());
    }

    fn names(node: &TreeNode) -> Vec<&str> {
        node.objects.iter().map(Resource::name).collect()
    }

    #[test]
    fn test_objects_copied_down_and_removed() {
        let mut root = sample_root(vec![role_binding("eng-admins")]);
        run(&mut root, HierarchyModes::new(true));

        let tree = root.tree.unwrap();
        assert!(tree.objects.is_empty());
        let eng = &tree.children[0];
        assert!(eng.objects.is_empty());
        assert_eq!(names(&eng.children[0]), vec!["api", "everyone", "eng-admins"]);
        assert_eq!(names(&eng.children[1]), vec!["web", "everyone", "eng-admins"]);
        assert_eq!(names(&tree.children[1]), vec!["other", "everyone"]);
    }

    #[test]
    fn test_namespace_selector_limits_copies() {
        let selected = role_binding("prod-only")
            .with_annotation(NAMESPACE_SELECTOR_ANNOTATION, r#"{"matchLabels":{"env":"prod"}}"#);
        let mut root = sample_root(vec![selected]);
        run(&mut root, HierarchyModes::new(true));

        let tree = root.tree.unwrap();
        let eng = &tree.children[0];
        assert_eq!(names(&eng.children[0]), vec!["api", "everyone", "prod-only"]);
        assert_eq!(names(&eng.children[1]), vec!["web", "everyone"]);
    }

    #[test]
    fn test_disabled_inheritance_moves_nothing() {
        let mut root = sample_root(vec![role_binding("eng-admins")]);
        run(&mut root, HierarchyModes::new(false));

        let tree = root.tree.unwrap();
        assert_eq!(names(&tree), vec!["everyone"]);
        assert_eq!(names(&tree.children[0].children[0]), vec!["api"]);
    }

    #[test]
    fn test_hierarchical_quota_stays_in_place() {
        let quota = Resource::new(KnownKind::ResourceQuota.gvk(), "eng-quota");
        let mut root = sample_root(vec![quota]);
        let mut modes = HierarchyModes::new(true);
        modes.set(KnownKind::ResourceQuota.group_kind(), HierarchyMode::HierarchicalQuota);
        run(&mut root, modes);

        let tree = root.tree.unwrap();
        let eng = &tree.children[0];
        assert_eq!(names(eng), vec!["eng-quota"]);
        assert_eq!(names(&eng.children[0]), vec!["api", "everyone"]);
    }

    #[test]
    fn test_selector_applies() {
        let labels: Labels = [("env".to_string(), "prod".to_string())].into();
        let plain = role_binding("plain");
        assert!(selector_applies(&plain, &labels));
        let garbage = role_binding("x").with_annotation(NAMESPACE_SELECTOR_ANNOTATION, "not-json");
        assert!(!selector_applies(&garbage, &labels));
    }
}
