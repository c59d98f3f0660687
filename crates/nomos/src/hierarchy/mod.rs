//! Hierarchy modes: how objects declared in abstract namespaces reach the
//! namespaces below them.

pub mod inheritance;
pub mod quantity;
pub mod quota;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::resource::{GroupKind, KnownKind};

pub use inheritance::InheritanceTransform;
pub use quantity::Quantity;
pub use quota::QuotaTransform;

/// Declared hierarchy mode of a group/kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HierarchyMode {
    #[default]
    Default,
    Inherit,
    None,
    HierarchicalQuota,
    /// A value the compiler does not recognise; always illegal.
    Unknown(String),
}

impl HierarchyMode {
    pub fn is_default(&self) -> bool {
        matches!(self, HierarchyMode::Default)
    }

    /// Whether the mode may be declared for `gk` under the given
    /// inheritance setting.
    pub fn is_allowed(&self, gk: &GroupKind, inheritance_enabled: bool) -> bool {
        allowed_modes(gk, inheritance_enabled).contains(&self.as_str())
    }

    pub fn as_str(&self) -> &str {
        match self {
            HierarchyMode::Default => "default",
            HierarchyMode::Inherit => "inherit",
            HierarchyMode::None => "none",
            HierarchyMode::HierarchicalQuota => "hierarchicalQuota",
            HierarchyMode::Unknown(s) => s,
        }
    }
}

impl From<String> for HierarchyMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" | "default" => HierarchyMode::Default,
            "inherit" => HierarchyMode::Inherit,
            "none" => HierarchyMode::None,
            "hierarchicalQuota" => HierarchyMode::HierarchicalQuota,
            _ => HierarchyMode::Unknown(s),
        }
    }
}

impl From<HierarchyMode> for String {
    fn from(mode: HierarchyMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for HierarchyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Modes that may be declared for a group/kind.
pub fn allowed_modes(gk: &GroupKind, inheritance_enabled: bool) -> &'static [&'static str] {
    let quota = KnownKind::classify(&gk.group, &gk.kind) == Some(KnownKind::ResourceQuota);
    match (inheritance_enabled, quota) {
        (false, _) => &["default"],
        (true, false) => &["default", "inherit", "none"],
        (true, true) => &["default", "inherit", "none", "hierarchicalQuota"],
    }
}

/// Effective treatment of an object declared in an abstract namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Inheritance is off; only NamespaceSelectors may appear there.
    Disabled,
    /// Copied into every applicable descendant namespace.
    Inherit,
    /// Not allowed in abstract namespaces.
    None,
    /// Kept in place and aggregated into the cluster-level quota.
    HierarchicalQuota,
}

/// Resolved hierarchy mode per group/kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyModes {
    inheritance_enabled: bool,
    modes: BTreeMap<GroupKind, HierarchyMode>,
}

impl HierarchyModes {
    pub fn new(inheritance_enabled: bool) -> Self {
        Self {
            inheritance_enabled,
            modes: BTreeMap::new(),
        }
    }

    pub fn inheritance_enabled(&self) -> bool {
        self.inheritance_enabled
    }

    /// Records the mode for a group/kind; later declarations win.
    pub fn set(&mut self, gk: GroupKind, mode: HierarchyMode) {
        self.modes.insert(gk, mode);
    }

    pub fn mode(&self, gk: &GroupKind) -> HierarchyMode {
        self.modes.get(gk).cloned().unwrap_or_default()
    }

    pub fn propagation(&self, gk: &GroupKind) -> Propagation {
        if !self.inheritance_enabled {
            return Propagation::Disabled;
        }
        match self.mode(gk) {
            HierarchyMode::Default | HierarchyMode::Inherit => Propagation::Inherit,
            HierarchyMode::HierarchicalQuota
                if KnownKind::classify(&gk.group, &gk.kind) == Some(KnownKind::ResourceQuota) =>
            {
                Propagation::HierarchicalQuota
            }
            _ => Propagation::None,
        }
    }
}
