use std::collections::BTreeMap;

use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::kinds::RESERVED_NAMESPACES_CONFIG;
use crate::resource::{KnownKind, Resource};
use crate::system::{RepoSpec, RESERVED_VALUE, SUPPORTED_REPO_VERSIONS};
use crate::visitor::{VisitContext, Visitor};

/// Checks the Repo version and the reserved-namespaces ConfigMap.
///
/// Specs that do not decode at all were already reported when the system
/// configuration was resolved.
#[derive(Debug, Default)]
pub struct RepoValidator;

impl RepoValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Visitor for RepoValidator {
    fn name(&self) -> &'static str {
        "repo"
    }

    fn visit_system_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        if object.is(KnownKind::Repo) {
            if let Ok(spec) = object.decode_spec::<RepoSpec>() {
                if !SUPPORTED_REPO_VERSIONS.contains(&spec.version.as_str()) {
                    cx.report(KnvError::UnsupportedRepoSpecVersion {
                        object: object.to_ref(),
                        version: spec.version,
                        supported: SUPPORTED_REPO_VERSIONS.join(", "),
                    });
                }
            }
            return;
        }

        if object.is(KnownKind::ConfigMap) && object.name() == RESERVED_NAMESPACES_CONFIG {
            let Some(data) = object.body.get("data") else {
                return;
            };
            let Ok(entries) = serde_json::from_value::<BTreeMap<String, String>>(data.clone()) else {
                return;
            };
            for (namespace, value) in entries {
                if value != RESERVED_VALUE {
                    cx.report(KnvError::InvalidReservedNamespaceValue {
                        object: object.to_ref(),
                        namespace,
                        value,
                    });
                }
            }
        }
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "UnsupportedRepoSpecVersion",
        "The Repo's spec.version names the repository format. Only the listed \
         versions are understood by this compiler.",
        KnvError::UnsupportedRepoSpecVersion {
            object: example_object("system/repo.yaml", "nomos.dev/v1", "Repo", "repo"),
            version: "0.0.1".to_string(),
            supported: SUPPORTED_REPO_VERSIONS.join(", "),
        },
    ))?;
    registry.register(CodeEntry::new(
        "InvalidReservedNamespaceValue",
        "Every entry of the nomos-reserved-namespaces ConfigMap maps a namespace \
         name to the value `reserved`.",
        KnvError::InvalidReservedNamespaceValue {
            object: example_object("system/reserved.yaml", "v1", "ConfigMap", RESERVED_NAMESPACES_CONFIG),
            namespace: "legacy".to_string(),
            value: "yes".to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Directory;
    use crate::knv::Code;
    use crate::validation::testing::{config_map, repo, root_from, run};
    use serde_json::json;

    #[test]
    fn test_repo_version() {
        let old = Resource::new(KnownKind::Repo.gvk(), "repo").with_spec(json!({"version": "0.0.1"}));
        let root = root_from(vec![Directory::new("system").with_object(old)]);
        assert_eq!(
            run(&root, RepoValidator::new()),
            vec![Code::UNSUPPORTED_REPO_SPEC_VERSION]
        );

        let root = root_from(vec![Directory::new("system").with_object(repo(true))]);
        assert!(run(&root, RepoValidator::new()).is_empty());
    }

    #[test]
    fn test_reserved_namespace_values() {
        let mut reserved = config_map(RESERVED_NAMESPACES_CONFIG);
        reserved.body.insert(
            "data".to_string(),
            json!({"legacy": "reserved", "old": "yes", "other": "no"}),
        );
        let root = root_from(vec![Directory::new("system").with_object(reserved)]);
        assert_eq!(
            run(&root, RepoValidator::new()),
            vec![
                Code::INVALID_RESERVED_NAMESPACE_VALUE,
                Code::INVALID_RESERVED_NAMESPACE_VALUE
            ]
        );
    }
}
