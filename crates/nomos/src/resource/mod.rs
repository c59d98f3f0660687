//! Generic, kind-agnostic representation of declared objects.
//!
//! Every document found in the policy tree becomes a [`Resource`]: the
//! identity fields (`apiVersion`, `kind`, `metadata`) are decoded eagerly,
//! everything else is kept as an untyped JSON payload so that arbitrary
//! kinds survive the compiler unchanged.

pub mod kinds;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub use kinds::KnownKind;

/// An API group plus a kind, rendered as `Role.rbac.authorization.k8s.io`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKind {
    #[serde(default)]
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Full type identity of an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Splits an `apiVersion` string (`v1`, `apps/v1`) into group and version.
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(&self.group, &self.kind)
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// Object metadata. Fields the compiler does not interpret are preserved
/// in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A declared object together with the file it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub gvk: GroupVersionKind,
    pub metadata: ObjectMeta,
    /// Every top-level field other than `apiVersion`, `kind` and `metadata`.
    pub body: Map<String, Value>,
    /// Slash-separated path of the source file, relative to the policy root.
    pub source: String,
}

impl Resource {
    /// Creates an object with no payload. Mostly useful for building trees
    /// in memory.
    pub fn new(gvk: GroupVersionKind, name: impl Into<String>) -> Self {
        Self {
            gvk,
            metadata: ObjectMeta {
                name: name.into(),
                ..Default::default()
            },
            body: Map::new(),
            source: String::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = namespace.into();
        self
    }

    pub fn with_spec(mut self, spec: Value) -> Self {
        self.body.insert("spec".to_string(), spec);
        self
    }

    pub fn at(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Decodes a single manifest document.
    pub fn from_manifest(value: Value, source: impl Into<String>) -> Result<Self, String> {
        let Value::Object(mut map) = value else {
            return Err("document is not a mapping".to_string());
        };

        let api_version = take_string(&mut map, "apiVersion")?;
        let kind = take_string(&mut map, "kind")?;
        let metadata = match map.remove("metadata") {
            Some(Value::Null) | None => ObjectMeta::default(),
            Some(value) => {
                serde_json::from_value(value).map_err(|e| format!("invalid metadata: {}", e))?
            }
        };

        Ok(Self {
            gvk: GroupVersionKind::from_api_version(&api_version, kind),
            metadata,
            body: map,
            source: source.into(),
        })
    }

    /// Re-assembles the object into manifest form.
    pub fn to_manifest(&self) -> Value {
        let mut map = Map::new();
        map.insert("apiVersion".to_string(), Value::String(self.gvk.api_version()));
        map.insert("kind".to_string(), Value::String(self.gvk.kind.clone()));
        map.insert(
            "metadata".to_string(),
            serde_json::to_value(&self.metadata).unwrap_or(Value::Null),
        );
        for (key, value) in &self.body {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn kind(&self) -> &str {
        &self.gvk.kind
    }

    pub fn group_kind(&self) -> GroupKind {
        self.gvk.group_kind()
    }

    pub fn known_kind(&self) -> Option<KnownKind> {
        KnownKind::classify(&self.gvk.group, &self.gvk.kind)
    }

    pub fn is(&self, kind: KnownKind) -> bool {
        self.known_kind() == Some(kind)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }

    pub fn set_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.annotations.insert(key.into(), value.into());
    }

    pub fn spec(&self) -> Option<&Value> {
        self.body.get("spec")
    }

    pub fn spec_mut(&mut self) -> Option<&mut Value> {
        self.body.get_mut("spec")
    }

    /// Decodes `spec` into a typed view. A missing spec decodes as `{}`.
    pub fn decode_spec<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let spec = self
            .spec()
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        serde_json::from_value(spec)
    }

    /// Directory portion of the source path.
    pub fn source_dir(&self) -> &str {
        self.source.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef::from(self)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_manifest().serialize(serializer)
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Result<String, String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::String(_)) | Some(Value::Null) | None => Err(format!("missing {}", key)),
        Some(_) => Err(format!("{} must be a string", key)),
    }
}

/// Identity of an object as printed in error messages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ResourceRef {
    pub source: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub gvk: GroupVersionKind,
}

impl ResourceRef {
    pub fn new(source: impl Into<String>, gvk: GroupVersionKind, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            namespace: String::new(),
            gvk,
        }
    }
}

impl From<&Resource> for ResourceRef {
    fn from(resource: &Resource) -> Self {
        Self {
            source: resource.source.clone(),
            name: resource.metadata.name.clone(),
            namespace: resource.metadata.namespace.clone(),
            gvk: resource.gvk.clone(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "source: {}", self.source)?;
        if !self.namespace.is_empty() {
            writeln!(f, "namespace: {}", self.namespace)?;
        }
        writeln!(f, "metadata.name: {}", self.name)?;
        writeln!(f, "group: {}", self.gvk.group)?;
        writeln!(f, "version: {}", self.gvk.version)?;
        write!(f, "kind: {}", self.gvk.kind)
    }
}
