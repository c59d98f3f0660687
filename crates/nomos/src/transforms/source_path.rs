use crate::resource::kinds::SOURCE_PATH_ANNOTATION;
use crate::resource::Resource;
use crate::visitor::{Action, NodeScope, Transform, TransformContext};

/// Records each emitted object's source file in an annotation.
#[derive(Debug, Default)]
pub struct SourcePathTransform;

impl SourcePathTransform {
    fn annotate(object: &mut Resource) {
        if !object.source.is_empty() {
            let source = object.source.clone();
            object.set_annotation(SOURCE_PATH_ANNOTATION, source);
        }
    }
}

impl Transform for SourcePathTransform {
    fn name(&self) -> &'static str {
        "source-path"
    }

    fn transform_cluster_object(&mut self, object: &mut Resource, _cx: &mut TransformContext<'_>) -> Action {
        Self::annotate(object);
        Action::Keep
    }

    fn transform_object(
        &mut self,
        _scope: &NodeScope,
        object: &mut Resource,
        _cx: &mut TransformContext<'_>,
    ) -> Action {
        Self::annotate(object);
        Action::Keep
    }
}
