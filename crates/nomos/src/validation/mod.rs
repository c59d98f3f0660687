//! Validators run over the policy tree.
//!
//! Input validators run before any rewriting and see the tree as declared.
//! Output validators run after the transforms and see what will be
//! emitted for the current cluster.

mod abstract_namespace;
mod annotations;
mod coverage;
mod directories;
mod metadata;
mod placement;
mod repo;
mod scope;
mod selectors;
mod singletons;
mod sync;
mod uniqueness;

pub use abstract_namespace::AbstractNamespaceValidator;
pub use annotations::AnnotationValidator;
pub use coverage::SyncCoverageValidator;
pub use directories::DirectoryValidator;
pub use metadata::MetadataValidator;
pub use placement::PlacementValidator;
pub use repo::RepoValidator;
pub use scope::ScopeValidator;
pub use selectors::SelectorValidator;
pub use singletons::SingletonValidator;
pub use sync::SyncValidator;
pub use uniqueness::NameCollisionValidator;

use regex::Regex;
use std::sync::LazyLock;

use crate::knv::{CodeRegistry, RegistryError};

/// Registers the codes owned by every validator.
pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    directories::register_codes(registry)?;
    metadata::register_codes(registry)?;
    annotations::register_codes(registry)?;
    selectors::register_codes(registry)?;
    uniqueness::register_codes(registry)?;
    placement::register_codes(registry)?;
    singletons::register_codes(registry)?;
    repo::register_codes(registry)?;
    sync::register_codes(registry)?;
    abstract_namespace::register_codes(registry)?;
    scope::register_codes(registry)?;
    coverage::register_codes(registry)?;
    Ok(())
}

static RE_DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap());
static RE_DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

/// A valid namespace or directory name: an RFC 1123 label.
pub fn is_dns_label(name: &str) -> bool {
    name.len() <= 63 && RE_DNS_LABEL.is_match(name)
}

/// A valid name for most object kinds: an RFC 1123 subdomain.
pub fn is_dns_subdomain(name: &str) -> bool {
    name.len() <= 253 && RE_DNS_SUBDOMAIN.is_match(name)
}

/// The looser rule used for RBAC objects, whose names only need to be
/// usable as a URL path segment.
pub fn is_path_segment_name(name: &str) -> bool {
    name != "." && name != ".." && !name.contains('/') && !name.contains('%')
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for driving a single validator over an in-memory tree.

    use serde_json::json;

    use crate::ast::{Data, Directory, Root, TreeBuilder};
    use crate::discovery::DiscoveryInfo;
    use crate::knv::{Code, ErrorBuilder};
    use crate::resource::{GroupVersionKind, KnownKind, Resource};
    use crate::selectors::ClusterSelectors;
    use crate::system::SystemConfig;
    use crate::visitor::{walk, VisitContext, Visitor};

    pub fn root_from(dirs: Vec<Directory>) -> Root {
        let mut errors = ErrorBuilder::new();
        let root = TreeBuilder::default().build(dirs, &mut errors).unwrap();
        assert!(errors.is_empty(), "unexpected structural errors");
        root
    }

    pub fn namespace(name: &str) -> Resource {
        Resource::new(KnownKind::Namespace.gvk(), name)
    }

    pub fn config_map(name: &str) -> Resource {
        Resource::new(KnownKind::ConfigMap.gvk(), name)
    }

    pub fn role(name: &str) -> Resource {
        Resource::new(
            GroupVersionKind::new("rbac.authorization.k8s.io", "v1", "Role"),
            name,
        )
    }

    pub fn repo(inheritance: bool) -> Resource {
        Resource::new(KnownKind::Repo.gvk(), "repo")
            .with_spec(json!({"version": "1.0.0", "experimentalInheritance": inheritance}))
            .at("system/repo.yaml")
    }

    /// Publishes the artifacts validators read, derived from `root`.
    pub fn data_for(root: &Root, cluster: Option<&str>) -> Data {
        let (system, _) = SystemConfig::resolve(&root.system);
        let mut data = Data::new();
        data.insert(system.hierarchy_modes());
        data.insert(system);
        data.insert(ClusterSelectors::resolve(&root.cluster_registry.objects, cluster));
        data.insert(DiscoveryInfo::from_option(None));
        data
    }

    pub fn run_with(root: &Root, data: &Data, mut visitor: impl Visitor) -> Vec<Code> {
        let mut errors = ErrorBuilder::new();
        walk(root, &mut visitor, &mut VisitContext { data, errors: &mut errors });
        errors
            .build()
            .map(|e| e.codes())
            .unwrap_or_default()
    }

    pub fn run(root: &Root, visitor: impl Visitor) -> Vec<Code> {
        let data = data_for(root, None);
        run_with(root, &data, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_rules() {
        assert!(is_dns_label("foo-bar1"));
        assert!(!is_dns_label("Foo"));
        assert!(!is_dns_label("-foo"));
        assert!(!is_dns_label("foo.bar"));
        assert!(!is_dns_label(&"a".repeat(64)));

        assert!(is_dns_subdomain("foo.bar-baz"));
        assert!(!is_dns_subdomain("foo..bar"));
        assert!(!is_dns_subdomain("foo_bar"));

        assert!(is_path_segment_name("system:aggregate-to-view"));
        assert!(!is_path_segment_name(".."));
        assert!(!is_path_segment_name("a/b"));
    }
}
