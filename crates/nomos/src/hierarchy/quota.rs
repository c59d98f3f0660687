//! ResourceQuota handling after inheritance.
//!
//! In inherit mode a namespace may end up with several quotas (its own
//! plus inherited copies); they are merged into one whose limits are the
//! minimum of each. In hierarchical-quota mode quotas are not copied:
//! abstract-namespace quotas are folded into a single cluster-level
//! HierarchicalQuota object describing the whole tree.

use serde_json::{json, Map, Value};

use super::{HierarchyModes, Propagation, Quantity};
use crate::ast::{Root, TreeNode};
use crate::resource::kinds::HIERARCHICAL_QUOTA_NAME;
use crate::resource::{KnownKind, Resource};
use crate::visitor::{Transform, TransformContext};

/// Reads: [`HierarchyModes`].
#[derive(Debug, Default)]
pub struct QuotaTransform;

impl Transform for QuotaTransform {
    fn name(&self) -> &'static str {
        "resource-quota"
    }

    fn finish(&mut self, root: &mut Root, cx: &mut TransformContext<'_>) {
        let propagation = match cx.data.require::<HierarchyModes>() {
            Ok(modes) => modes.propagation(&KnownKind::ResourceQuota.group_kind()),
            Err(e) => {
                cx.errors.add(e);
                return;
            }
        };
        let Some(tree) = root.tree.as_mut() else {
            return;
        };

        match propagation {
            Propagation::Inherit => merge_namespace_quotas(tree),
            Propagation::HierarchicalQuota => {
                let hierarchy = hierarchy_node(tree);
                strip_abstract_quotas(tree);
                let aggregate = Resource::new(
                    KnownKind::HierarchicalQuota.gvk(),
                    HIERARCHICAL_QUOTA_NAME,
                )
                .with_spec(json!({ "hierarchy": hierarchy }));
                root.cluster.objects.push(aggregate);
            }
            Propagation::Disabled | Propagation::None => {}
        }
    }
}

fn merge_namespace_quotas(node: &mut TreeNode) {
    if node.is_namespace() {
        let mut quotas = Vec::new();
        node.objects.retain(|object| {
            let is_quota = object.is(KnownKind::ResourceQuota);
            if is_quota {
                quotas.push(object.clone());
            }
            !is_quota
        });
        let mut quotas = quotas.into_iter();
        if let Some(mut merged) = quotas.next() {
            for other in quotas {
                merge_hard_limits(&mut merged, &other);
            }
            node.objects.push(merged);
        }
    }
    for child in &mut node.children {
        merge_namespace_quotas(child);
    }
}

/// Lowers each `spec.hard` limit in `base` to the one in `other` where that
/// is smaller, and adopts limits only `other` declares.
pub fn merge_hard_limits(base: &mut Resource, other: &Resource) {
    let Some(other_hard) = hard_limits(other).cloned() else {
        return;
    };
    let spec = base
        .body
        .entry("spec")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(spec) = spec else {
        return;
    };
    let hard = spec
        .entry("hard")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(hard) = hard else {
        return;
    };

    for (resource, limit) in other_hard {
        match hard.get(&resource) {
            Some(current) if !is_smaller(&limit, current) => {}
            _ => {
                hard.insert(resource, limit);
            }
        }
    }
}

fn hard_limits(quota: &Resource) -> Option<&Map<String, Value>> {
    quota.spec()?.get("hard")?.as_object()
}

fn is_smaller(candidate: &Value, current: &Value) -> bool {
    let parse = |v: &Value| match v {
        Value::String(s) => s.parse::<Quantity>().ok(),
        Value::Number(n) => n.to_string().parse::<Quantity>().ok(),
        _ => None,
    };
    match (parse(candidate), parse(current)) {
        (Some(a), Some(b)) => a < b,
        _ => {
            log::warn!("Cannot compare quota limits {} and {}", candidate, current);
            false
        }
    }
}

fn hierarchy_node(node: &TreeNode) -> Value {
    let mut out = Map::new();
    out.insert("name".to_string(), Value::String(node.name().to_string()));
    let node_type = if node.is_namespace() {
        "namespace"
    } else {
        "abstractNamespace"
    };
    out.insert("type".to_string(), Value::String(node_type.to_string()));
    if let Some(quota) = node.objects.iter().find(|o| o.is(KnownKind::ResourceQuota)) {
        out.insert("resourceQuotaV1".to_string(), quota.to_manifest());
    }
    if !node.children.is_empty() {
        out.insert(
            "children".to_string(),
            Value::Array(node.children.iter().map(hierarchy_node).collect()),
        );
    }
    Value::Object(out)
}

fn strip_abstract_quotas(node: &mut TreeNode) {
    if !node.is_namespace() {
        node.objects.retain(|o| !o.is(KnownKind::ResourceQuota));
    }
    for child in &mut node.children {
        strip_abstract_quotas(child);
    }
}
