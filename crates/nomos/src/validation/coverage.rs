use crate::ast::TreeNode;
use crate::knv::{catalog::example_object, CodeEntry, CodeRegistry, KnvError, RegistryError};
use crate::resource::kinds::{is_implicitly_synced, is_unsyncable};
use crate::resource::Resource;
use crate::system::SystemConfig;
use crate::visitor::{VisitContext, Visitor};

/// Every emitted object must be covered by a Sync naming its group, kind
/// and version. Kinds the compiler manages itself need none.
///
/// Reads: [`SystemConfig`].
#[derive(Debug, Default)]
pub struct SyncCoverageValidator;

impl SyncCoverageValidator {
    pub fn new() -> Self {
        Self
    }

    fn check(object: &Resource, cx: &mut VisitContext<'_>) {
        let gk = object.group_kind();
        if is_implicitly_synced(&gk) || is_unsyncable(&gk) {
            return;
        }
        let data = cx.data;
        let system = match data.require::<SystemConfig>() {
            Ok(system) => system,
            Err(e) => {
                cx.report(e);
                return;
            }
        };
        let covered = system
            .syncs
            .iter()
            .any(|sync| sync.group_kind() == gk && sync.has_version(&object.gvk.version));
        if !covered {
            cx.report(KnvError::UnsyncedObjectKind {
                object: object.to_ref(),
            });
        }
    }
}

impl Visitor for SyncCoverageValidator {
    fn name(&self) -> &'static str {
        "sync-coverage"
    }

    fn visit_cluster_object(&mut self, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check(object, cx);
    }

    fn visit_object(&mut self, _node: &TreeNode, object: &Resource, cx: &mut VisitContext<'_>) {
        Self::check(object, cx);
    }
}

pub(crate) fn register_codes(registry: &mut CodeRegistry) -> Result<(), RegistryError> {
    registry.register(CodeEntry::new(
        "UnsyncedObjectKind",
        "Objects are only written to the cluster for kinds declared by a Sync in \
         system/. Add a Sync listing this object's group, kind and version.",
        KnvError::UnsyncedObjectKind {
            object: example_object("namespaces/bar/cm.yaml", "v1", "ConfigMap", "settings"),
        },
    ))
}
