//! Per-item authorization checks over an [`EffectiveRole`].
//!
//! Checks are pure and synchronous; one engine is shared by every concurrent
//! evaluation.
use crate::{EffectiveRole, PrivilegeRegistry, PrivilegeScope};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    registry: Arc<PrivilegeRegistry>,
}

impl AuthorizationEngine {
    pub fn new(registry: Arc<PrivilegeRegistry>) -> Self {
        Self { registry }
    }

    /// True iff some granted cluster privilege implies `privilege`.
    pub fn check_cluster(&self, role: &EffectiveRole, privilege: &str) -> bool {
        role.cluster().iter().any(|granted| {
            self.registry
                .implies(granted, privilege, PrivilegeScope::Cluster)
        })
    }

    /// True iff one grant both matches `index` and holds a privilege that
    /// implies `privilege`.
    ///
    /// `index` is a literal name. A `*` inside it is not expanded.
    pub fn check_index(&self, role: &EffectiveRole, index: &str, privilege: &str) -> bool {
        role.indices().iter().any(|grant| {
            grant.matches_index(index)
                && grant.privileges().iter().any(|granted| {
                    self.registry
                        .implies(granted, privilege, PrivilegeScope::Index)
                })
        })
    }
}
