//! Role and effective-role value types.
//!
//! # Purpose
//! A [`Role`] bundles granted cluster privileges with index grants. Roles are
//! built once through [`RoleBuilder`] (or a [`RoleDescriptor`] loaded from
//! data), validated against the privilege registry, and never mutated.
//!
//! # How it fits
//! Role providers hand out `Arc<Role>` values; the resolver unions a
//! principal's roles into an [`EffectiveRole`] that the authorization engine
//! evaluates.
//!
//! # Key invariants
//! - Every privilege named in a role exists in the registry for its scope.
//! - Equality ignores insertion order of privileges, patterns and grants.
//!
//! # Examples
//! ```rust
//! use warden_authz::{PrivilegeRegistry, Role};
//!
//! let registry = PrivilegeRegistry::builtin();
//! let role = Role::builder("writer")
//!     .cluster(["monitor"])
//!     .add_index(["write"], ["academy"])
//!     .build(&registry)
//!     .expect("role");
//! assert_eq!(role.indices().len(), 1);
//! ```
//!
//! # Common pitfalls
//! - Granting a privilege name that only exists in the other scope; `read` is
//!   an index privilege, not a cluster one.
use crate::matcher::wildcard_match;
use crate::{AuthzError, AuthzResult, PrivilegeRegistry, PrivilegeScope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Index privileges granted on a set of index-name patterns.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexGrant {
    patterns: BTreeSet<String>,
    privileges: BTreeSet<String>,
}

impl IndexGrant {
    pub fn new(
        patterns: impl IntoIterator<Item = impl Into<String>>,
        privileges: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            privileges: privileges.into_iter().map(Into::into).collect(),
        }
    }

    pub fn patterns(&self) -> &BTreeSet<String> {
        &self.patterns
    }

    pub fn privileges(&self) -> &BTreeSet<String> {
        &self.privileges
    }

    /// Whether any pattern of this grant matches the literal index name.
    pub fn matches_index(&self, index: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| wildcard_match(pattern, index))
    }
}

/// Immutable, validated role definition.
#[derive(Debug, Clone)]
pub struct Role {
    name: String,
    cluster: BTreeSet<String>,
    indices: Vec<IndexGrant>,
}

impl Role {
    pub fn builder(name: impl Into<String>) -> RoleBuilder {
        RoleBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cluster(&self) -> &BTreeSet<String> {
        &self.cluster
    }

    pub fn indices(&self) -> &[IndexGrant] {
        &self.indices
    }

    fn sorted_grants(&self) -> Vec<&IndexGrant> {
        let mut grants: Vec<&IndexGrant> = self.indices.iter().collect();
        grants.sort();
        grants
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.cluster == other.cluster
            && self.sorted_grants() == other.sorted_grants()
    }
}

impl Eq for Role {}

/// Accumulates grants and validates them into a [`Role`].
#[derive(Debug, Clone)]
pub struct RoleBuilder {
    name: String,
    cluster: BTreeSet<String>,
    indices: Vec<IndexGrant>,
}

impl RoleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cluster: BTreeSet::new(),
            indices: Vec::new(),
        }
    }

    /// Grant cluster privileges.
    pub fn cluster(mut self, privileges: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cluster
            .extend(privileges.into_iter().map(Into::into));
        self
    }

    /// Grant index privileges on the given index-name patterns.
    pub fn add_index(
        mut self,
        privileges: impl IntoIterator<Item = impl Into<String>>,
        patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.indices.push(IndexGrant::new(patterns, privileges));
        self
    }

    pub fn add_grant(mut self, grant: IndexGrant) -> Self {
        self.indices.push(grant);
        self
    }

    /// Validate every granted privilege and freeze the role.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidRole`] if the role name is blank or has
    ///   surrounding whitespace.
    /// - [`AuthzError::UnknownPrivilegeInGrant`] if a grant names a privilege
    ///   the registry does not know for that scope.
    pub fn build(self, registry: &PrivilegeRegistry) -> AuthzResult<Role> {
        if self.name.trim().is_empty() {
            return Err(AuthzError::InvalidRole(
                "role name must not be empty".to_string(),
            ));
        }
        if self.name.trim() != self.name {
            return Err(AuthzError::InvalidRole(format!(
                "role name {:?} has surrounding whitespace",
                self.name
            )));
        }
        for privilege in &self.cluster {
            ensure_registered(registry, &self.name, privilege, PrivilegeScope::Cluster)?;
        }
        for grant in &self.indices {
            for privilege in &grant.privileges {
                ensure_registered(registry, &self.name, privilege, PrivilegeScope::Index)?;
            }
        }
        Ok(Role {
            name: self.name,
            cluster: self.cluster,
            indices: self.indices,
        })
    }
}

fn ensure_registered(
    registry: &PrivilegeRegistry,
    role: &str,
    privilege: &str,
    scope: PrivilegeScope,
) -> AuthzResult<()> {
    if registry.contains(privilege, scope) {
        Ok(())
    } else {
        Err(AuthzError::UnknownPrivilegeInGrant {
            role: role.to_string(),
            scope,
            privilege: privilege.to_string(),
        })
    }
}

/// Index grant as it appears in a role definition document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicesPrivileges {
    pub names: Vec<String>,
    pub privileges: Vec<String>,
}

/// Serializable role definition, e.g. one entry of a roles file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    pub name: String,
    #[serde(default)]
    pub cluster: Vec<String>,
    #[serde(default)]
    pub indices: Vec<IndicesPrivileges>,
}

impl RoleDescriptor {
    /// Turn the descriptor into a validated [`Role`].
    pub fn build(&self, registry: &PrivilegeRegistry) -> AuthzResult<Role> {
        let builder = self.indices.iter().fold(
            Role::builder(self.name.clone()).cluster(self.cluster.iter().cloned()),
            |builder, entry| {
                builder.add_index(entry.privileges.iter().cloned(), entry.names.iter().cloned())
            },
        );
        builder.build(registry)
    }
}

/// Union of every role resolved for one principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveRole {
    roles: Vec<String>,
    cluster: BTreeSet<String>,
    indices: Vec<IndexGrant>,
}

impl EffectiveRole {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Union the given roles: cluster privileges are merged, index grants are
    /// concatenated in iteration order.
    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a Role>) -> Self {
        let mut effective = Self::default();
        for role in roles {
            effective.roles.push(role.name.clone());
            effective.cluster.extend(role.cluster.iter().cloned());
            effective.indices.extend(role.indices.iter().cloned());
        }
        effective
    }

    /// Names of the roles that contributed, in union order.
    pub fn role_names(&self) -> &[String] {
        &self.roles
    }

    pub fn cluster(&self) -> &BTreeSet<String> {
        &self.cluster
    }

    pub fn indices(&self) -> &[IndexGrant] {
        &self.indices
    }

    pub fn is_empty(&self) -> bool {
        self.cluster.is_empty() && self.indices.is_empty()
    }
}

impl From<&Role> for EffectiveRole {
    fn from(role: &Role) -> Self {
        Self::from_roles([role])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PrivilegeRegistry {
        PrivilegeRegistry::builtin()
    }

    #[test]
    fn builder_collects_grants() {
        let role = Role::builder("test2")
            .cluster(["monitor"])
            .add_index(["index"], ["academy"])
            .add_index(["write"], ["initiative"])
            .build(&registry())
            .expect("role");
        assert_eq!(role.name(), "test2");
        assert!(role.cluster().contains("monitor"));
        assert_eq!(role.indices().len(), 2);
        assert!(role.indices()[1].privileges().contains("write"));
    }

    #[test]
    fn builder_rejects_unknown_grant_privilege() {
        let err = Role::builder("broken")
            .add_index(["scribble"], ["academy"])
            .build(&registry())
            .expect_err("unknown privilege");
        assert!(matches!(
            err,
            AuthzError::UnknownPrivilegeInGrant { scope: PrivilegeScope::Index, ref privilege, .. }
                if privilege == "scribble"
        ));
    }

    #[test]
    fn builder_rejects_privilege_from_other_scope() {
        let err = Role::builder("broken")
            .cluster(["read"])
            .build(&registry())
            .expect_err("read is index-scoped");
        assert!(matches!(
            err,
            AuthzError::UnknownPrivilegeInGrant { scope: PrivilegeScope::Cluster, .. }
        ));
    }

    #[test]
    fn builder_rejects_blank_name() {
        let err = Role::builder("  ").build(&registry()).expect_err("blank");
        assert!(matches!(err, AuthzError::InvalidRole(_)));
    }

    #[test]
    fn builder_rejects_padded_name() {
        for name in [" ops", "ops ", "\tops\n"] {
            let err = Role::builder(name)
                .cluster(["monitor"])
                .build(&registry())
                .expect_err("padded");
            assert!(matches!(err, AuthzError::InvalidRole(_)), "{name:?}");
        }
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = Role::builder("ops")
            .cluster(["monitor", "manage_pipeline"])
            .add_index(["read", "index"], ["logs-*", "metrics-*"])
            .add_index(["all"], ["ops"])
            .build(&registry())
            .expect("a");
        let b = Role::builder("ops")
            .cluster(["manage_pipeline", "monitor"])
            .add_index(["all"], ["ops"])
            .add_index(["index", "read"], ["metrics-*", "logs-*"])
            .build(&registry())
            .expect("b");
        assert_eq!(a, b);

        let c = Role::builder("ops")
            .cluster(["monitor"])
            .add_index(["all"], ["ops"])
            .build(&registry())
            .expect("c");
        assert_ne!(a, c);
    }

    #[test]
    fn grant_matching_uses_stored_patterns() {
        let grant = IndexGrant::new(["logstash-*", "audit"], ["read"]);
        assert!(grant.matches_index("logstash-2016-01"));
        assert!(grant.matches_index("audit"));
        assert!(!grant.matches_index("log*"));
        assert!(!IndexGrant::new(Vec::<String>::new(), ["read"]).matches_index("audit"));
    }

    #[test]
    fn descriptor_builds_role() {
        let descriptor: RoleDescriptor = serde_json::from_value(serde_json::json!({
            "name": "role_b",
            "indices": [{ "names": ["foo"], "privileges": ["all"] }]
        }))
        .expect("descriptor");
        assert!(descriptor.cluster.is_empty());
        let role = descriptor.build(&registry()).expect("role");
        let expected = Role::builder("role_b")
            .add_index(["all"], ["foo"])
            .build(&registry())
            .expect("expected");
        assert_eq!(role, expected);
    }

    #[test]
    fn effective_role_unions_members() {
        let registry = registry();
        let a = Role::builder("a")
            .cluster(["monitor"])
            .add_index(["read"], ["logs-*"])
            .build(&registry)
            .expect("a");
        let b = Role::builder("b")
            .cluster(["monitor", "manage"])
            .add_index(["write"], ["logs-*"])
            .build(&registry)
            .expect("b");
        let effective = EffectiveRole::from_roles([&a, &b]);
        assert_eq!(effective.role_names(), ["a".to_string(), "b".to_string()]);
        assert_eq!(effective.cluster().len(), 2);
        assert_eq!(effective.indices().len(), 2);
        assert!(!effective.is_empty());
        assert!(EffectiveRole::empty().is_empty());
    }
}
