//! Typed views of the `system/` directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ast::System;
use crate::hierarchy::{HierarchyMode, HierarchyModes};
use crate::knv::KnvError;
use crate::resource::kinds::{BUILTIN_RESERVED_NAMESPACES, RESERVED_NAMESPACES_CONFIG};
use crate::resource::{GroupKind, GroupVersionKind, KnownKind, Resource, ResourceRef};

/// Repo spec versions this compiler understands.
pub const SUPPORTED_REPO_VERSIONS: &[&str] = &["0.1.0", "1.0.0"];

/// Value marking an entry of the reserved-namespaces ConfigMap.
pub const RESERVED_VALUE: &str = "reserved";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSpec {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub experimental_inheritance: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSpec {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    #[serde(default)]
    pub versions: Vec<SyncVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncVersion {
    pub version: String,
    #[serde(default, skip_serializing_if = "HierarchyMode::is_default")]
    pub hierarchy_mode: HierarchyMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyConfigSpec {
    #[serde(default)]
    pub resources: Vec<HierarchyConfigResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyConfigResource {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub hierarchy_mode: HierarchyMode,
}

/// A group/kind that will be synced, with the versions and modes declared
/// for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDeclaration {
    pub group: String,
    pub kind: String,
    pub versions: Vec<SyncVersion>,
    /// The declaring Sync object; `None` for implicit syncs.
    #[serde(skip)]
    pub source: Option<ResourceRef>,
}

impl SyncDeclaration {
    pub fn from_spec(spec: SyncSpec, source: ResourceRef) -> Self {
        Self {
            group: spec.group,
            kind: spec.kind,
            versions: spec.versions,
            source: Some(source),
        }
    }

    /// A sync the compiler adds on its own.
    pub fn implicit(gvk: &GroupVersionKind) -> Self {
        Self {
            group: gvk.group.clone(),
            kind: gvk.kind.clone(),
            versions: vec![SyncVersion {
                version: gvk.version.clone(),
                hierarchy_mode: HierarchyMode::Default,
            }],
            source: None,
        }
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(&self.group, &self.kind)
    }

    /// The first non-default mode declared across versions.
    pub fn mode(&self) -> HierarchyMode {
        self.versions
            .iter()
            .map(|v| &v.hierarchy_mode)
            .find(|m| !m.is_default())
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v.version == version)
    }

    pub fn gvks(&self) -> impl Iterator<Item = GroupVersionKind> + '_ {
        self.versions
            .iter()
            .map(|v| GroupVersionKind::new(&self.group, &v.version, &self.kind))
    }
}

/// A hierarchy mode declared by a HierarchyConfig entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyDeclaration {
    pub group_kind: GroupKind,
    pub mode: HierarchyMode,
    pub source: ResourceRef,
}

/// Compiler configuration decoded from `system/`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemConfig {
    /// The first well-formed Repo, if any.
    pub repo: Option<RepoSpec>,
    /// Entries of the reserved-namespaces ConfigMap, name to value.
    pub reserved_namespaces: BTreeMap<String, String>,
    pub syncs: Vec<SyncDeclaration>,
    pub hierarchy: Vec<HierarchyDeclaration>,
}

impl SystemConfig {
    /// Decodes the typed system objects. Objects whose spec does not
    /// decode are reported and left out; misplaced kinds are ignored here
    /// and reported by validation.
    pub fn resolve(system: &System) -> (Self, Vec<KnvError>) {
        let mut config = SystemConfig::default();
        let mut errors = Vec::new();

        for object in &system.objects {
            match object.known_kind() {
                Some(KnownKind::Repo) => match object.decode_spec::<RepoSpec>() {
                    Ok(spec) => {
                        config.repo.get_or_insert(spec);
                    }
                    Err(e) => errors.push(parse_error(object, e)),
                },
                Some(KnownKind::Sync) => match object.decode_spec::<SyncSpec>() {
                    Ok(spec) => config
                        .syncs
                        .push(SyncDeclaration::from_spec(spec, object.to_ref())),
                    Err(e) => errors.push(parse_error(object, e)),
                },
                Some(KnownKind::HierarchyConfig) => match object.decode_spec::<HierarchyConfigSpec>() {
                    Ok(spec) => {
                        for resource in spec.resources {
                            for kind in resource.kinds {
                                config.hierarchy.push(HierarchyDeclaration {
                                    group_kind: GroupKind::new(&resource.group, kind),
                                    mode: resource.hierarchy_mode.clone(),
                                    source: object.to_ref(),
                                });
                            }
                        }
                    }
                    Err(e) => errors.push(parse_error(object, e)),
                },
                Some(KnownKind::ConfigMap) if object.name() == RESERVED_NAMESPACES_CONFIG => {
                    match decode_data(object) {
                        Ok(data) => config.reserved_namespaces.extend(data),
                        Err(e) => errors.push(parse_error(object, e)),
                    }
                }
                _ => {}
            }
        }

        (config, errors)
    }

    pub fn inheritance_enabled(&self) -> bool {
        self.repo
            .as_ref()
            .map(|r| r.experimental_inheritance)
            .unwrap_or(false)
    }

    /// Whether no directory may be named `name`.
    pub fn is_reserved(&self, name: &str) -> bool {
        BUILTIN_RESERVED_NAMESPACES.contains(&name) || self.reserved_namespaces.contains_key(name)
    }

    /// Hierarchy modes from Syncs, overridden by HierarchyConfig entries.
    pub fn hierarchy_modes(&self) -> HierarchyModes {
        let mut modes = HierarchyModes::new(self.inheritance_enabled());
        for sync in &self.syncs {
            modes.set(sync.group_kind(), sync.mode());
        }
        for declared in &self.hierarchy {
            modes.set(declared.group_kind.clone(), declared.mode.clone());
        }
        modes
    }
}

fn decode_data(object: &Resource) -> Result<BTreeMap<String, String>, serde_json::Error> {
    match object.body.get("data") {
        Some(data) => serde_json::from_value(data.clone()),
        None => Ok(BTreeMap::new()),
    }
}

fn parse_error(object: &Resource, e: serde_json::Error) -> KnvError {
    KnvError::ObjectParse {
        path: object.source.clone(),
        message: format!("{} {}: {}", object.kind(), object.name(), e),
    }
}
