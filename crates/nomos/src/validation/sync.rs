use std::collections::{BTreeMap, BTreeSet};

use crate::ast::Root;
use crate::discovery::DiscoveryInfo;
use crate::hierarchy::{allowed_modes, HierarchyMode};
use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::kinds::is_unsyncable;
use crate::resource::{GroupKind, ResourceRef};
use crate::system::{SyncDeclaration, SystemConfig};
use crate::visitor::{VisitContext, Visitor};

/// Checks Sync and HierarchyConfig declarations: which kinds they may
/// name, which hierarchy modes they may use, and, when discovery data was
/// supplied, that the named versions are served.
///
/// Reads: [`SystemConfig`], [`DiscoveryInfo`].
#[derive(Debug, Default)]
pub struct SyncValidator;

impl SyncValidator {
    pub fn new() -> Self {
        Self
    }
}

fn illegal_mode(
    object: &ResourceRef,
    gk: &GroupKind,
    mode: &HierarchyMode,
    inheritance_enabled: bool,
) -> Option<KnvError> {
    if mode.is_allowed(gk, inheritance_enabled) {
        return None;
    }
    Some(KnvError::IllegalHierarchyMode {
        object: object.clone(),
        group_kind: gk.to_string(),
        mode: mode.to_string(),
        allowed: allowed_modes(gk, inheritance_enabled).join(", "),
    })
}

fn check_sync(
    sync: &SyncDeclaration,
    object: &ResourceRef,
    system: &SystemConfig,
    discovery: &DiscoveryInfo,
    cx: &mut VisitContext<'_>,
) {
    let gk = sync.group_kind();
    if is_unsyncable(&gk) {
        cx.report(KnvError::UnsupportedSyncKind {
            object: object.clone(),
            group_kind: gk.to_string(),
        });
        return;
    }

    let modes: BTreeSet<&str> = sync.versions.iter().map(|v| v.hierarchy_mode.as_str()).collect();
    if modes.len() > 1 {
        cx.report(KnvError::InconsistentHierarchyModes {
            object: object.clone(),
            group_kind: gk.to_string(),
        });
    }

    for version in &sync.versions {
        if let Some(e) = illegal_mode(object, &gk, &version.hierarchy_mode, system.inheritance_enabled()) {
            cx.report(e);
        }
    }

    if discovery.explicit {
        for gvk in sync.gvks() {
            if !discovery.discovery.serves(&gvk) {
                cx.report(KnvError::UnknownResourceInSync {
                    object: object.clone(),
                    group_kind: gk.to_string(),
                    version: gvk.version.clone(),
                });
            }
        }
    }
}

impl Visitor for SyncValidator {
    fn name(&self) -> &'static str {
        "syncs"
    }

    fn visit_root(&mut self, _root: &Root, cx: &mut VisitContext<'_>) {
        let data = cx.data;
        let (system, discovery) = match (data.require::<SystemConfig>(), data.require::<DiscoveryInfo>()) {
            (Ok(system), Ok(discovery)) => (system, discovery),
            (Err(e), _) | (_, Err(e)) => {
                cx.report(e);
                return;
            }
        };

        let mut by_kind: BTreeMap<GroupKind, Vec<ResourceRef>> = BTreeMap::new();
        for sync in &system.syncs {
            let Some(object) = &sync.source else {
                continue;
            };
            check_sync(sync, object, system, discovery, cx);
            by_kind.entry(sync.group_kind()).or_default().push(object.clone());
        }
        for (gk, objects) in by_kind {
            if objects.len() > 1 {
                cx.report(KnvError::DuplicateSyncGroupKind {
                    group_kind: gk.to_string(),
                    objects,
                });
            }
        }

        for declared in &system.hierarchy {
            if is_unsyncable(&declared.group_kind) {
                cx.report(KnvError::UnsupportedSyncKind {
                    object: declared.source.clone(),
                    group_kind: declared.group_kind.to_string(),
                });
            } else if let Some(e) = illegal_mode(
                &declared.source,
                &declared.group_kind,
                &declared.mode,
                system.inheritance_enabled(),
            ) {
                cx.report(e);
            }
        }
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "UnsupportedSyncKind",
        "Namespaces, CustomResourceDefinitions and the compiler's own nomos.dev \
         kinds are handled by the compiler and may not be named by a Sync or a \
         HierarchyConfig.",
        KnvError::UnsupportedSyncKind {
            object: example_object("system/sync.yaml", "nomos.dev/v1", "Sync", "namespaces"),
            group_kind: "Namespace".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "UnknownResourceInSync",
        "When discovery data is supplied, every version a Sync names must be \
         served by the target cluster.",
        KnvError::UnknownResourceInSync {
            object: example_object("system/sync.yaml", "nomos.dev/v1", "Sync", "widgets"),
            group_kind: "Widget.example.com".to_string(),
            version: "v1".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "IllegalHierarchyMode",
        "Without experimentalInheritance in the Repo only the default mode may be \
         declared. With it, `inherit` and `none` are allowed for every kind and \
         `hierarchicalQuota` for ResourceQuota only.",
        KnvError::IllegalHierarchyMode {
            object: example_object("system/sync.yaml", "nomos.dev/v1", "Sync", "configmaps"),
            group_kind: "ConfigMap".to_string(),
            mode: "hierarchicalQuota".to_string(),
            allowed: "default, inherit, none".to_string(),
        },
    ))?;
    registry.register(CodeEntry::new(
        "DuplicateSyncGroupKind",
        "Each group/kind may be named by only one Sync. List additional versions \
         in that Sync instead.",
        KnvError::DuplicateSyncGroupKind {
            group_kind: "ConfigMap".to_string(),
            objects: vec![
                example_object("system/sync.yaml", "nomos.dev/v1", "Sync", "configmaps"),
                example_object("system/sync-2.yaml", "nomos.dev/v1", "Sync", "configmaps-2"),
            ],
        },
    ))?;
    registry.register(CodeEntry::new(
        "InconsistentHierarchyModes",
        "The hierarchy mode applies to a group/kind as a whole, so every version \
         listed by a Sync must declare the same mode.",
        KnvError::InconsistentHierarchyModes {
            object: example_object("system/sync.yaml", "nomos.dev/v1", "Sync", "quotas"),
            group_kind: "ResourceQuota".to_string(),
        },
    ))
}
