//! Coded policy violations.
//!
//! Every problem found in a policy tree is a [`KnvError`] carrying a stable
//! numeric code. Errors are collected per run with an [`ErrorBuilder`] and
//! reported together as a [`MultiError`]. The code catalogue lives in
//! [`catalog`].

pub mod builder;
pub mod catalog;

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::resource::ResourceRef;

pub use builder::{ErrorBuilder, IntoKnvErrors, MultiError};
pub use catalog::{CodeEntry, CodeRegistry, RegistryError};

/// Stable identifier of an error class, rendered as `KNVdddd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Code(pub u16);

impl Code {
    pub const RESERVED_DIRECTORY_NAME: Code = Code(1001);
    pub const DUPLICATE_DIRECTORY_NAME: Code = Code(1002);
    pub const ILLEGAL_NAMESPACE_SUBDIRECTORY: Code = Code(1003);
    pub const ILLEGAL_SELECTOR_ANNOTATION: Code = Code(1004);
    pub const ILLEGAL_MANAGEMENT_ANNOTATION: Code = Code(1005);
    pub const OBJECT_PARSE: Code = Code(1006);
    pub const ILLEGAL_ABSTRACT_NAMESPACE_OBJECT_KIND: Code = Code(1007);
    pub const CONFLICTING_RESOURCE_QUOTA: Code = Code(1008);
    pub const ILLEGAL_METADATA_NAMESPACE_DECLARATION: Code = Code(1009);
    pub const ILLEGAL_ANNOTATION_DEFINITION: Code = Code(1010);
    pub const ILLEGAL_LABEL_DEFINITION: Code = Code(1011);
    pub const OBJECT_HAS_UNKNOWN_NAMESPACE_SELECTOR: Code = Code(1012);
    pub const OBJECT_HAS_UNKNOWN_CLUSTER_SELECTOR: Code = Code(1013);
    pub const INVALID_SELECTOR: Code = Code(1014);
    pub const MISSING_REPO: Code = Code(1017);
    pub const ILLEGAL_SUBDIRECTORY: Code = Code(1018);
    pub const ILLEGAL_TOP_LEVEL_NAMESPACE: Code = Code(1019);
    pub const INVALID_NAMESPACE_NAME: Code = Code(1020);
    pub const UNKNOWN_OBJECT_KIND: Code = Code(1021);
    pub const ILLEGAL_KIND_IN_SYSTEM: Code = Code(1024);
    pub const UNSUPPORTED_REPO_SPEC_VERSION: Code = Code(1027);
    pub const INVALID_DIRECTORY_NAME: Code = Code(1028);
    pub const METADATA_NAME_COLLISION: Code = Code(1029);
    pub const MULTIPLE_SINGLETONS: Code = Code(1030);
    pub const MISSING_OBJECT_NAME: Code = Code(1031);
    pub const UNSUPPORTED_SYNC_KIND: Code = Code(1032);
    pub const ILLEGAL_SYSTEM_RESOURCE_PLACEMENT: Code = Code(1033);
    pub const INVALID_RESERVED_NAMESPACE_VALUE: Code = Code(1034);
    pub const INVALID_METADATA_NAME: Code = Code(1036);
    pub const ILLEGAL_KIND_IN_CLUSTER_REGISTRY: Code = Code(1037);
    pub const ILLEGAL_KIND_IN_NAMESPACES: Code = Code(1038);
    pub const ILLEGAL_KIND_IN_CLUSTER: Code = Code(1039);
    pub const UNKNOWN_RESOURCE_IN_SYNC: Code = Code(1040);
    pub const ILLEGAL_HIERARCHY_MODE: Code = Code(1041);
    pub const DUPLICATE_SYNC_GROUP_KIND: Code = Code(1042);
    pub const UNSYNCED_OBJECT_KIND: Code = Code(1043);
    pub const UNSYNCABLE_RESOURCES: Code = Code(1044);
    pub const INCONSISTENT_HIERARCHY_MODES: Code = Code(1046);
    pub const INTERNAL: Code = Code(9998);
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KNV{:04}", self.0)
    }
}

/// Broad grouping used when rendering the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    Structure,
    Declaration,
    Reference,
    Semantics,
    Internal,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Structure => write!(f, "Directory structure"),
            Category::Declaration => write!(f, "Object declarations"),
            Category::Reference => write!(f, "References"),
            Category::Semantics => write!(f, "Semantics"),
            Category::Internal => write!(f, "Internal"),
        }
    }
}

/// A single policy violation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KnvError {
    #[error("KNV1001: Directories MUST NOT have reserved namespace names. Rename or remove directory:\n\npath: {dir}\nname: {}", base_name(.dir))]
    ReservedDirectoryName { dir: String },

    #[error("KNV1002: Directory names MUST be unique. Rename one of these directories:\n\n{}", paths(.dirs))]
    DuplicateDirectoryName { dirs: Vec<String> },

    #[error("KNV1003: A Namespace directory MUST NOT have subdirectories. Remove the subdirectory:\n\nnamespace: {parent}\nsubdirectory: {child}")]
    IllegalNamespaceSubdirectory { parent: String, child: String },

    #[error("KNV1004: Objects of this kind MUST NOT declare the `{annotation}` annotation. Remove it from:\n\n{object}")]
    IllegalSelectorAnnotation {
        object: ResourceRef,
        annotation: String,
    },

    #[error("KNV1005: Objects MUST NOT declare the management annotation with any value other than `disabled`. Found `{value}` on:\n\n{object}")]
    IllegalManagementAnnotation { object: ResourceRef, value: String },

    #[error("KNV1006: Unable to parse a document:\n\npath: {path}\n{message}")]
    ObjectParse { path: String, message: String },

    #[error("KNV1007: Objects of this kind are not allowed in abstract namespace directories with the current hierarchy configuration:\n\n{object}")]
    IllegalAbstractNamespaceObjectKind { object: ResourceRef },

    #[error("KNV1008: A directory MUST NOT declare more than one ResourceQuota:\n\npath: {dir}\n\n{}", refs(.quotas))]
    ConflictingResourceQuota {
        dir: String,
        quotas: Vec<ResourceRef>,
    },

    #[error("KNV1009: metadata.namespace MUST be unset or equal to the Namespace declared by its directory:\n\npath: {dir}\n\n{object}")]
    IllegalMetadataNamespaceDeclaration { object: ResourceRef, dir: String },

    #[error("KNV1010: Objects MUST NOT declare annotations with the reserved prefix. Remove {} from:\n\n{object}", quoted(.keys))]
    IllegalAnnotationDefinition {
        object: ResourceRef,
        keys: Vec<String>,
    },

    #[error("KNV1011: Objects MUST NOT declare labels with the reserved prefix. Remove {} from:\n\n{object}", quoted(.keys))]
    IllegalLabelDefinition {
        object: ResourceRef,
        keys: Vec<String>,
    },

    #[error("KNV1012: Object references NamespaceSelector `{selector}`, which is not declared in its directory or any parent directory:\n\n{object}")]
    ObjectHasUnknownNamespaceSelector {
        object: ResourceRef,
        selector: String,
    },

    #[error("KNV1013: Object references ClusterSelector `{selector}`, which is not declared in clusterregistry/:\n\n{object}")]
    ObjectHasUnknownClusterSelector {
        object: ResourceRef,
        selector: String,
    },

    #[error("KNV1014: Selector is invalid: {reason}\n\n{object}")]
    InvalidSelector { object: ResourceRef, reason: String },

    #[error("KNV1017: The system/ directory MUST declare exactly one Repo object, but none was found.")]
    MissingRepo,

    #[error("KNV1018: The `{base}/` directory MUST NOT have subdirectories:\n\npath: {dir}")]
    IllegalSubdirectory { base: String, dir: String },

    #[error("KNV1019: Namespace objects MUST NOT be declared directly in the namespaces root directory:\n\n{object}")]
    IllegalTopLevelNamespace { object: ResourceRef },

    #[error("KNV1020: A Namespace object MUST be named after its directory. Expected `{expected}`:\n\n{object}")]
    InvalidNamespaceName {
        object: ResourceRef,
        expected: String,
    },

    #[error("KNV1021: The kind is not served by the target cluster:\n\n{object}")]
    UnknownObjectKind { object: ResourceRef },

    #[error("KNV1024: Objects of this kind MUST NOT be declared in system/:\n\n{object}")]
    IllegalKindInSystem { object: ResourceRef },

    #[error("KNV1027: Unsupported Repo spec.version `{version}`. Supported versions: {supported}\n\n{object}")]
    UnsupportedRepoSpecVersion {
        object: ResourceRef,
        version: String,
        supported: String,
    },

    #[error("KNV1028: Directory names MUST be valid namespace names (lowercase DNS labels):\n\npath: {dir}")]
    InvalidDirectoryName { dir: String },

    #[error("KNV1029: Objects of the same kind MUST have unique names within a directory and its ancestors. Found {} objects named `{name}`:\n\n{}", .objects.len(), refs(.objects))]
    MetadataNameCollision {
        name: String,
        objects: Vec<ResourceRef>,
    },

    #[error("KNV1030: Multiple {kind} objects are declared where only one is allowed:\n\n{}", refs(.objects))]
    MultipleSingletons {
        kind: String,
        objects: Vec<ResourceRef>,
    },

    #[error("KNV1031: Objects MUST declare metadata.name:\n\n{object}")]
    MissingObjectName { object: ResourceRef },

    #[error("KNV1032: `{group_kind}` MUST NOT be named by a Sync or HierarchyConfig:\n\n{object}")]
    UnsupportedSyncKind {
        object: ResourceRef,
        group_kind: String,
    },

    #[error("KNV1033: Compiler configuration kinds MUST only be declared in system/:\n\n{object}")]
    IllegalSystemResourcePlacement { object: ResourceRef },

    #[error("KNV1034: Reserved namespace `{namespace}` has invalid value `{value}`; the only accepted value is `reserved`:\n\n{object}")]
    InvalidReservedNamespaceValue {
        object: ResourceRef,
        namespace: String,
        value: String,
    },

    #[error("KNV1036: metadata.name is not a valid object name:\n\n{object}")]
    InvalidMetadataName { object: ResourceRef },

    #[error("KNV1037: Only Cluster and ClusterSelector objects may be declared in clusterregistry/:\n\n{object}")]
    IllegalKindInClusterRegistry { object: ResourceRef },

    #[error("KNV1038: Objects of this kind MUST NOT be declared in the namespaces tree:\n\n{object}")]
    IllegalKindInNamespaces { object: ResourceRef },

    #[error("KNV1039: Objects of this kind MUST NOT be declared in cluster/:\n\n{object}")]
    IllegalKindInCluster { object: ResourceRef },

    #[error("KNV1040: Sync names `{group_kind}` at version `{version}`, which is not served by the target cluster:\n\n{object}")]
    UnknownResourceInSync {
        object: ResourceRef,
        group_kind: String,
        version: String,
    },

    #[error("KNV1041: Hierarchy mode `{mode}` is not allowed for `{group_kind}`. Allowed modes: {allowed}\n\n{object}")]
    IllegalHierarchyMode {
        object: ResourceRef,
        group_kind: String,
        mode: String,
        allowed: String,
    },

    #[error("KNV1042: `{group_kind}` MUST be named by at most one Sync:\n\n{}", refs(.objects))]
    DuplicateSyncGroupKind {
        group_kind: String,
        objects: Vec<ResourceRef>,
    },

    #[error("KNV1043: No Sync declares this object's kind and version:\n\n{object}")]
    UnsyncedObjectKind { object: ResourceRef },

    #[error("KNV1044: Abstract namespace declares inheritable objects but has no Namespace below it:\n\npath: {dir}")]
    UnsyncableResources { dir: String },

    #[error("KNV1046: All versions of `{group_kind}` MUST use the same hierarchy mode:\n\n{object}")]
    InconsistentHierarchyModes {
        object: ResourceRef,
        group_kind: String,
    },

    #[error("KNV9998: Internal error: {message}")]
    Internal { message: String },
}

impl KnvError {
    pub fn internal(message: impl Into<String>) -> Self {
        KnvError::Internal {
            message: message.into(),
        }
    }

    pub fn code(&self) -> Code {
        match self {
            KnvError::ReservedDirectoryName { .. } => Code::RESERVED_DIRECTORY_NAME,
            KnvError::DuplicateDirectoryName { .. } => Code::DUPLICATE_DIRECTORY_NAME,
            KnvError::IllegalNamespaceSubdirectory { .. } => Code::ILLEGAL_NAMESPACE_SUBDIRECTORY,
            KnvError::IllegalSelectorAnnotation { .. } => Code::ILLEGAL_SELECTOR_ANNOTATION,
            KnvError::IllegalManagementAnnotation { .. } => Code::ILLEGAL_MANAGEMENT_ANNOTATION,
            KnvError::ObjectParse { .. } => Code::OBJECT_PARSE,
            KnvError::IllegalAbstractNamespaceObjectKind { .. } => {
                Code::ILLEGAL_ABSTRACT_NAMESPACE_OBJECT_KIND
            }
            KnvError::ConflictingResourceQuota { .. } => Code::CONFLICTING_RESOURCE_QUOTA,
            KnvError::IllegalMetadataNamespaceDeclaration { .. } => {
                Code::ILLEGAL_METADATA_NAMESPACE_DECLARATION
            }
            KnvError::IllegalAnnotationDefinition { .. } => Code::ILLEGAL_ANNOTATION_DEFINITION,
            KnvError::IllegalLabelDefinition { .. } => Code::ILLEGAL_LABEL_DEFINITION,
            KnvError::ObjectHasUnknownNamespaceSelector { .. } => {
                Code::OBJECT_HAS_UNKNOWN_NAMESPACE_SELECTOR
            }
            KnvError::ObjectHasUnknownClusterSelector { .. } => {
                Code::OBJECT_HAS_UNKNOWN_CLUSTER_SELECTOR
            }
            KnvError::InvalidSelector { .. } => Code::INVALID_SELECTOR,
            KnvError::MissingRepo => Code::MISSING_REPO,
            KnvError::IllegalSubdirectory { .. } => Code::ILLEGAL_SUBDIRECTORY,
            KnvError::IllegalTopLevelNamespace { .. } => Code::ILLEGAL_TOP_LEVEL_NAMESPACE,
            KnvError::InvalidNamespaceName { .. } => Code::INVALID_NAMESPACE_NAME,
            KnvError::UnknownObjectKind { .. } => Code::UNKNOWN_OBJECT_KIND,
            KnvError::IllegalKindInSystem { .. } => Code::ILLEGAL_KIND_IN_SYSTEM,
            KnvError::UnsupportedRepoSpecVersion { .. } => Code::UNSUPPORTED_REPO_SPEC_VERSION,
            KnvError::InvalidDirectoryName { .. } => Code::INVALID_DIRECTORY_NAME,
            KnvError::MetadataNameCollision { .. } => Code::METADATA_NAME_COLLISION,
            KnvError::MultipleSingletons { .. } => Code::MULTIPLE_SINGLETONS,
            KnvError::MissingObjectName { .. } => Code::MISSING_OBJECT_NAME,
            KnvError::UnsupportedSyncKind { .. } => Code::UNSUPPORTED_SYNC_KIND,
            KnvError::IllegalSystemResourcePlacement { .. } => {
                Code::ILLEGAL_SYSTEM_RESOURCE_PLACEMENT
            }
            KnvError::InvalidReservedNamespaceValue { .. } => {
                Code::INVALID_RESERVED_NAMESPACE_VALUE
            }
            KnvError::InvalidMetadataName { .. } => Code::INVALID_METADATA_NAME,
            KnvError::IllegalKindInClusterRegistry { .. } => Code::ILLEGAL_KIND_IN_CLUSTER_REGISTRY,
            KnvError::IllegalKindInNamespaces { .. } => Code::ILLEGAL_KIND_IN_NAMESPACES,
            KnvError::IllegalKindInCluster { .. } => Code::ILLEGAL_KIND_IN_CLUSTER,
            KnvError::UnknownResourceInSync { .. } => Code::UNKNOWN_RESOURCE_IN_SYNC,
            KnvError::IllegalHierarchyMode { .. } => Code::ILLEGAL_HIERARCHY_MODE,
            KnvError::DuplicateSyncGroupKind { .. } => Code::DUPLICATE_SYNC_GROUP_KIND,
            KnvError::UnsyncedObjectKind { .. } => Code::UNSYNCED_OBJECT_KIND,
            KnvError::UnsyncableResources { .. } => Code::UNSYNCABLE_RESOURCES,
            KnvError::InconsistentHierarchyModes { .. } => Code::INCONSISTENT_HIERARCHY_MODES,
            KnvError::Internal { .. } => Code::INTERNAL,
        }
    }

    pub fn category(&self) -> Category {
        match self.code().0 {
            1001..=1003 | 1018 | 1019 | 1028 | 1044 => Category::Structure,
            1012 | 1013 | 1021 | 1040 | 1043 => Category::Reference,
            1007 | 1008 | 1027 | 1029 | 1030 | 1017 | 1032 | 1041 | 1042 | 1046 => {
                Category::Semantics
            }
            9998 => Category::Internal,
            _ => Category::Declaration,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, KnvError::Internal { .. })
    }

    /// Source files and directories the error points at.
    pub fn paths(&self) -> Vec<String> {
        match self {
            KnvError::ReservedDirectoryName { dir }
            | KnvError::InvalidDirectoryName { dir }
            | KnvError::UnsyncableResources { dir }
            | KnvError::IllegalSubdirectory { dir, .. } => vec![dir.clone()],
            KnvError::DuplicateDirectoryName { dirs } => dirs.clone(),
            KnvError::IllegalNamespaceSubdirectory { child, .. } => vec![child.clone()],
            KnvError::ObjectParse { path, .. } => vec![path.clone()],
            KnvError::ConflictingResourceQuota { quotas: objects, .. }
            | KnvError::MetadataNameCollision { objects, .. }
            | KnvError::MultipleSingletons { objects, .. }
            | KnvError::DuplicateSyncGroupKind { objects, .. } => {
                objects.iter().map(|o| o.source.clone()).collect()
            }
            KnvError::MissingRepo | KnvError::Internal { .. } => Vec::new(),
            KnvError::IllegalSelectorAnnotation { object, .. }
            | KnvError::IllegalManagementAnnotation { object, .. }
            | KnvError::IllegalAbstractNamespaceObjectKind { object }
            | KnvError::IllegalMetadataNamespaceDeclaration { object, .. }
            | KnvError::IllegalAnnotationDefinition { object, .. }
            | KnvError::IllegalLabelDefinition { object, .. }
            | KnvError::ObjectHasUnknownNamespaceSelector { object, .. }
            | KnvError::ObjectHasUnknownClusterSelector { object, .. }
            | KnvError::InvalidSelector { object, .. }
            | KnvError::IllegalTopLevelNamespace { object }
            | KnvError::InvalidNamespaceName { object, .. }
            | KnvError::UnknownObjectKind { object }
            | KnvError::IllegalKindInSystem { object }
            | KnvError::UnsupportedRepoSpecVersion { object, .. }
            | KnvError::MissingObjectName { object }
            | KnvError::UnsupportedSyncKind { object, .. }
            | KnvError::IllegalSystemResourcePlacement { object }
            | KnvError::InvalidReservedNamespaceValue { object, .. }
            | KnvError::InvalidMetadataName { object }
            | KnvError::IllegalKindInClusterRegistry { object }
            | KnvError::IllegalKindInNamespaces { object }
            | KnvError::IllegalKindInCluster { object }
            | KnvError::UnknownResourceInSync { object, .. }
            | KnvError::IllegalHierarchyMode { object, .. }
            | KnvError::UnsyncedObjectKind { object }
            | KnvError::InconsistentHierarchyModes { object, .. } => vec![object.source.clone()],
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code().to_string(),
            message: self.to_string(),
            paths: self.paths(),
        }
    }
}

/// Serializable form of a [`KnvError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    pub paths: Vec<String>,
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn paths(dirs: &[String]) -> String {
    dirs.iter()
        .map(|d| format!("path: {}", d))
        .collect::<Vec<_>>()
        .join("\n")
}

fn refs(objects: &[ResourceRef]) -> String {
    objects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn quoted(keys: &[String]) -> String {
    keys.iter()
        .map(|k| format!("`{}`", k))
        .collect::<Vec<_>>()
        .join(", ")
}
