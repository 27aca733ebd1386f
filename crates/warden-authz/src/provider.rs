//! Role provider and principal directory capabilities.
//!
//! # Purpose
//! Defines the async lookup seams the resolver and evaluator consume, plus
//! the in-process providers shipped with the crate.
//!
//! # Key invariants
//! - Providers publish whole `Arc<Role>` values; a reader never observes a
//!   partially updated role.
//! - A lookup miss is `Ok(None)`, never an error.
//!
//! # Examples
//! ```rust
//! use warden_authz::{InMemoryRoleProvider, PrivilegeRegistry, Role, RoleProvider};
//!
//! let registry = PrivilegeRegistry::builtin();
//! let role = Role::builder("reader").add_index(["read"], ["logs-*"]).build(&registry).expect("role");
//! let provider = InMemoryRoleProvider::with_roles("native", [role]);
//! let rt = tokio::runtime::Runtime::new().expect("rt");
//! rt.block_on(async {
//!     let found = provider.lookup("reader").await.expect("lookup");
//!     assert!(found.is_some());
//! });
//! ```
use crate::{AuthzResult, PrivilegeRegistry, ProviderError, Role};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Name of the built-in role granting everything.
pub const SUPERUSER_ROLE: &str = "superuser";

#[async_trait]
pub trait RoleProvider: Send + Sync {
    /// Short provider name used in logs and metrics labels.
    fn name(&self) -> &str;

    /// Look up a role definition by name.
    async fn lookup(&self, role: &str) -> Result<Option<Arc<Role>>, ProviderError>;
}

/// Source of the role names assigned to an authenticated principal.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Role names for `principal`; unknown principals have none.
    async fn role_names(&self, principal: &str) -> Result<Vec<String>, ProviderError>;
}

#[async_trait]
impl PrincipalDirectory for HashMap<String, Vec<String>> {
    async fn role_names(&self, principal: &str) -> Result<Vec<String>, ProviderError> {
        Ok(self.get(principal).cloned().unwrap_or_default())
    }
}

/// Mutable in-process role provider.
///
/// Updates replace the stored `Arc<Role>` under a write lock, so concurrent
/// lookups see either the old or the new definition (last writer wins).
#[derive(Debug)]
pub struct InMemoryRoleProvider {
    name: String,
    roles: RwLock<HashMap<String, Arc<Role>>>,
}

impl InMemoryRoleProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roles: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_roles(name: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        let roles = roles
            .into_iter()
            .map(|role| (role.name().to_string(), Arc::new(role)))
            .collect();
        Self {
            name: name.into(),
            roles: RwLock::new(roles),
        }
    }

    /// Publish a role definition, replacing any previous one with that name.
    pub async fn put(&self, role: Role) -> Option<Arc<Role>> {
        self.roles
            .write()
            .await
            .insert(role.name().to_string(), Arc::new(role))
    }

    pub async fn remove(&self, role: &str) -> Option<Arc<Role>> {
        self.roles.write().await.remove(role)
    }

    /// Swap the whole role set in one step.
    pub async fn replace_all(&self, roles: impl IntoIterator<Item = Role>) {
        let next: HashMap<String, Arc<Role>> = roles
            .into_iter()
            .map(|role| (role.name().to_string(), Arc::new(role)))
            .collect();
        *self.roles.write().await = next;
    }

    pub async fn len(&self) -> usize {
        self.roles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.roles.read().await.is_empty()
    }
}

#[async_trait]
impl RoleProvider for InMemoryRoleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, role: &str) -> Result<Option<Arc<Role>>, ProviderError> {
        Ok(self.roles.read().await.get(role).cloned())
    }
}

/// Built-in roles that cannot be redefined by later providers.
///
/// Register it first so reserved names win precedence.
#[derive(Debug)]
pub struct ReservedRoleProvider {
    roles: HashMap<String, Arc<Role>>,
}

impl ReservedRoleProvider {
    /// Build the reserved roles against `registry`.
    ///
    /// # Errors
    /// - Fails if the registry lacks the `all` privilege in either scope.
    pub fn new(registry: &PrivilegeRegistry) -> AuthzResult<Self> {
        let superuser = Role::builder(SUPERUSER_ROLE)
            .cluster([crate::ALL_PRIVILEGE])
            .add_index([crate::ALL_PRIVILEGE], ["*"])
            .build(registry)?;
        let mut roles = HashMap::new();
        roles.insert(SUPERUSER_ROLE.to_string(), Arc::new(superuser));
        Ok(Self { roles })
    }

    pub fn is_reserved(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }
}

#[async_trait]
impl RoleProvider for ReservedRoleProvider {
    fn name(&self) -> &str {
        "reserved"
    }

    async fn lookup(&self, role: &str) -> Result<Option<Arc<Role>>, ProviderError> {
        Ok(self.roles.get(role).cloned())
    }
}
