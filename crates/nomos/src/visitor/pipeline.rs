//! Ordered execution of passes over a [`Root`].

use tracing::debug_span;

use super::{apply, walk, Transform, TransformContext, VisitContext, Visitor};
use crate::ast::{Data, Root};
use crate::knv::ErrorBuilder;

/// One step of a [`Pipeline`].
pub enum Stage {
    Validate(Box<dyn Visitor + Send>),
    Transform(Box<dyn Transform + Send>),
    /// Stops the run if any error has been reported so far.
    Barrier,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Validate(v) => v.name(),
            Stage::Transform(t) => t.name(),
            Stage::Barrier => "barrier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed,
    /// The run stopped before the stage at this index.
    Halted { at: usize },
}

/// A fixed sequence of validators, transforms and barriers.
///
/// Validators accumulate errors without stopping; an internal error stops
/// the run after the stage that raised it. Transforms only run while the
/// batch is free of errors from earlier barriers.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(mut self, visitor: impl Visitor + Send + 'static) -> Self {
        self.stages.push(Stage::Validate(Box::new(visitor)));
        self
    }

    pub fn transform(mut self, transform: impl Transform + Send + 'static) -> Self {
        self.stages.push(Stage::Transform(Box::new(transform)));
        self
    }

    pub fn barrier(mut self) -> Self {
        self.stages.push(Stage::Barrier);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn run(self, root: &mut Root, data: &mut Data, errors: &mut ErrorBuilder) -> PipelineOutcome {
        for (index, mut stage) in self.stages.into_iter().enumerate() {
            let span = debug_span!("stage", index, name = stage.name());
            let _enter = span.enter();

            match &mut stage {
                Stage::Validate(visitor) => {
                    let before = errors.len();
                    let mut cx = VisitContext {
                        data: &*data,
                        errors: &mut *errors,
                    };
                    walk(root, visitor.as_mut(), &mut cx);
                    tracing::debug!(reported = errors.len() - before, "validator finished");
                }
                Stage::Transform(transform) => {
                    let mut cx = TransformContext {
                        data: &mut *data,
                        errors: &mut *errors,
                    };
                    apply(root, transform.as_mut(), &mut cx);
                }
                Stage::Barrier => {
                    if !errors.is_empty() {
                        tracing::debug!(errors = errors.len(), "halting at barrier");
                        return PipelineOutcome::Halted { at: index };
                    }
                }
            }

            if errors.has_internal() {
                return PipelineOutcome::Halted { at: index + 1 };
            }
        }
        PipelineOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knv::KnvError;
    use crate::resource::{KnownKind, Resource};
    use crate::visitor::Action;

    struct AlwaysFails;

    impl Visitor for AlwaysFails {
        fn name(&self) -> &'static str {
            "always-fails"
        }

        fn visit_root(&mut self, _root: &Root, cx: &mut VisitContext<'_>) {
            cx.report(KnvError::MissingRepo);
        }
    }

    struct Panics;

    impl Visitor for Panics {
        fn name(&self) -> &'static str {
            "internal"
        }

        fn visit_root(&mut self, _root: &Root, cx: &mut VisitContext<'_>) {
            cx.report(KnvError::internal("unreachable state"));
        }
    }

    struct DropCluster;

    impl Transform for DropCluster {
        fn name(&self) -> &'static str {
            "drop-cluster"
        }

        fn transform_cluster_object(&mut self, _object: &mut Resource, _cx: &mut TransformContext<'_>) -> Action {
            Action::Remove
        }
    }

    fn root_with_cluster_object() -> Root {
        let mut root = Root::default();
        root.cluster
            .objects
            .push(Resource::new(KnownKind::ConfigMap.gvk(), "cfg"));
        root
    }

    #[test]
    fn test_validators_accumulate_until_barrier() {
        let pipeline = Pipeline::new()
            .validate(AlwaysFails)
            .validate(AlwaysFails)
            .barrier()
            .transform(DropCluster);
        assert_eq!(
            pipeline.stage_names(),
            vec!["always-fails", "always-fails", "barrier", "drop-cluster"]
        );

        let mut root = root_with_cluster_object();
        let mut errors = ErrorBuilder::new();
        let outcome = pipeline.run(&mut root, &mut Data::new(), &mut errors);
        assert_eq!(outcome, PipelineOutcome::Halted { at: 2 });
        assert_eq!(errors.len(), 2);
        assert_eq!(root.cluster.objects.len(), 1);
    }

    #[test]
    fn test_clean_run_completes() {
        let mut root = root_with_cluster_object();
        let mut errors = ErrorBuilder::new();
        let outcome = Pipeline::new()
            .barrier()
            .transform(DropCluster)
            .run(&mut root, &mut Data::new(), &mut errors);
        assert_eq!(outcome, PipelineOutcome::Completed);
        assert!(root.cluster.objects.is_empty());
    }

    #[test]
    fn test_internal_error_halts_immediately() {
        let mut root = Root::default();
        let mut errors = ErrorBuilder::new();
        let outcome = Pipeline::new()
            .validate(Panics)
            .validate(AlwaysFails)
            .run(&mut root, &mut Data::new(), &mut errors);
        assert_eq!(outcome, PipelineOutcome::Halted { at: 1 });
        assert_eq!(errors.len(), 1);
    }
}
