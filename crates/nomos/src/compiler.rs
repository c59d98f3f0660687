//! The compile driver: load, build, validate, transform, assemble.

use std::path::Path;
use tracing::info_span;

use crate::assemble::{assemble, CompiledPolicies};
use crate::ast::{Data, Directory, Layout, TreeBuilder};
use crate::config::CompileOptions;
use crate::discovery::DiscoveryInfo;
use crate::error::Result;
use crate::hierarchy::{InheritanceTransform, QuotaTransform};
use crate::knv::{CodeRegistry, ErrorBuilder, KnvError, MultiError, RegistryError};
use crate::loader::{self, ManifestLoader};
use crate::selectors::ClusterSelectors;
use crate::system::SystemConfig;
use crate::transforms::{AnnotationInliner, ClusterSelectorTransform, SourcePathTransform};
use crate::validation::{
    self, AbstractNamespaceValidator, AnnotationValidator, DirectoryValidator, MetadataValidator,
    NameCollisionValidator, PlacementValidator, RepoValidator, ScopeValidator, SelectorValidator,
    SingletonValidator, SyncCoverageValidator, SyncValidator,
};
use crate::visitor::Pipeline;

/// Builds the catalogue of every error code the compiler can report.
pub fn code_registry() -> std::result::Result<CodeRegistry, RegistryError> {
    let mut registry = CodeRegistry::new();
    loader::register_codes(&mut registry)?;
    crate::ast::builder::register_codes(&mut registry)?;
    validation::register_codes(&mut registry)?;
    Ok(registry)
}

/// Compiles policy repositories for one cluster.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// The passes run on every compile, in order.
    pub fn pipeline() -> Pipeline {
        Pipeline::new()
            .validate(DirectoryValidator::new())
            .validate(MetadataValidator::new())
            .validate(AnnotationValidator::new())
            .validate(SelectorValidator::new())
            .validate(NameCollisionValidator::new())
            .validate(PlacementValidator::new())
            .validate(SingletonValidator::new())
            .validate(RepoValidator::new())
            .validate(SyncValidator::new())
            .validate(AbstractNamespaceValidator::new())
            .barrier()
            .transform(SourcePathTransform)
            .transform(ClusterSelectorTransform)
            .transform(AnnotationInliner::new())
            .transform(InheritanceTransform::new())
            .transform(QuotaTransform)
            .validate(ScopeValidator::new())
            .validate(SyncCoverageValidator::new())
            .barrier()
    }

    /// Loads and compiles the repository at `path`.
    pub fn compile_dir(&self, path: &Path) -> Result<CompiledPolicies> {
        let loaded = ManifestLoader::new(path).load()?;
        Ok(self.compile(loaded.directories, loaded.errors)?)
    }

    /// Compiles directories listed in depth-first pre-order. `initial`
    /// carries problems found while reading them, which reject the run
    /// like any other.
    ///
    /// Either every check passes and the whole output is returned, or
    /// nothing is. An internal error is returned on its own, without the
    /// rest of the batch.
    pub fn compile(
        &self,
        directories: Vec<Directory>,
        initial: Vec<KnvError>,
    ) -> std::result::Result<CompiledPolicies, MultiError> {
        let span = info_span!(
            "compile",
            cluster = self.options.cluster_name.as_deref().unwrap_or("<none>")
        );
        let _enter = span.enter();

        let mut errors = ErrorBuilder::new();
        errors.add(initial);

        let builder = TreeBuilder::new(Layout::new(&self.options.namespaces_dir));
        let mut root = builder.build(directories, &mut errors)?;

        let (system, system_errors) = SystemConfig::resolve(&root.system);
        errors.add(system_errors);

        let mut data = Data::new();
        data.insert(system.hierarchy_modes());
        data.insert(system);
        data.insert(ClusterSelectors::resolve(
            &root.cluster_registry.objects,
            self.options.cluster_name.as_deref(),
        ));
        data.insert(DiscoveryInfo::from_option(self.options.discovery.clone()));

        let outcome = Self::pipeline().run(&mut root, &mut data, &mut errors);
        if let Some(rejected) = errors.build() {
            tracing::info!(errors = rejected.len(), ?outcome, "policy rejected");
            return Err(only_internal(rejected));
        }
        tracing::debug!(?outcome, "pipeline finished");

        let compiled = assemble(&root, &data)?;
        tracing::info!(
            namespaces = compiled.namespaces.len(),
            cluster_objects = compiled.cluster.len(),
            syncs = compiled.syncs.len(),
            "policy compiled"
        );
        Ok(compiled)
    }
}

/// Keeps only internal errors when there are any; they make the rest of
/// the batch unreliable.
fn only_internal(errors: MultiError) -> MultiError {
    let internal: Vec<KnvError> = errors.iter().filter(|e| e.is_internal()).cloned().collect();
    MultiError::from_errors(internal).unwrap_or(errors)
}
