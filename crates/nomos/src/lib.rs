pub mod assemble;
pub mod ast;
pub mod compiler;
pub mod config;
pub mod discovery;
pub mod error;
pub mod hierarchy;
pub mod knv;
pub mod loader;
pub mod resource;
pub mod selectors;
pub mod system;
pub mod transforms;
pub mod validation;
pub mod visitor;
pub mod watcher;

pub use assemble::{assemble, CompiledPolicies};
pub use ast::{Directory, Root, TreeBuilder};
pub use compiler::{code_registry, Compiler};
pub use config::{CompileOptions, CompilerConfig};
pub use discovery::{ApiResource, Discovery};
pub use error::{NomosError, Result};
pub use knv::{Code, CodeRegistry, ErrorReport, KnvError, MultiError};
pub use loader::{LoadedTree, ManifestLoader};
pub use resource::{GroupKind, GroupVersionKind, Resource};
pub use visitor::Pipeline;
pub use watcher::{BackgroundWatcher, CompileEvent, Outcome, PolicyWatcher};
