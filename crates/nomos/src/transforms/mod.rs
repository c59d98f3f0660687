//! Rewriting passes that run once the input has validated cleanly.

mod cluster_selector;
mod inline;
mod source_path;

pub use cluster_selector::ClusterSelectorTransform;
pub use inline::AnnotationInliner;
pub use source_path::SourcePathTransform;
