//! YAML file-backed role provider and principal role source.
//!
//! # Purpose
//! Loads role definitions and principal-to-role assignments from one YAML
//! document:
//!
//! ```yaml
//! roles:
//!   - name: writer
//!     cluster: [monitor]
//!     indices:
//!       - names: [academy]
//!         privileges: [write]
//! users:
//!   alice: [writer]
//! ```
//!
//! # Key invariants
//! - Every role is validated against the privilege registry at load; one bad
//!   role rejects the whole file.
//! - [`FileRoleProvider::reload`] publishes the new roles and users together.
//!   A failed reload keeps serving the previous snapshot.
//! - [`FileRoleSource`] answers each principal from one snapshot, so a reload
//!   never pairs old assignments with new definitions.
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use warden_authz::{
    AuthzResult, EffectiveRole, PrincipalRoleSource, PrivilegeRegistry, ProviderError, Role,
    RoleDescriptor, RoleProvider, RoleResolver,
};

/// Parsed, not yet validated, role file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleFile {
    #[serde(default)]
    pub roles: Vec<RoleDescriptor>,
    #[serde(default)]
    pub users: HashMap<String, Vec<String>>,
}

impl RoleFile {
    pub fn parse(contents: &str) -> Result<Self, ProviderError> {
        serde_yaml::from_str(contents).map_err(|err| ProviderError::Parse(err.to_string()))
    }

    pub async fn read(path: &Path) -> Result<Self, ProviderError> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::parse(&contents)
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    roles: HashMap<String, Arc<Role>>,
    users: HashMap<String, Vec<String>>,
}

impl Snapshot {
    fn build(file: RoleFile, registry: &PrivilegeRegistry) -> Result<Self> {
        let mut roles = HashMap::with_capacity(file.roles.len());
        for descriptor in &file.roles {
            let role = descriptor
                .build(registry)
                .with_context(|| format!("validate role {}", descriptor.name))?;
            if roles
                .insert(role.name().to_string(), Arc::new(role))
                .is_some()
            {
                bail!("duplicate role definition: {}", descriptor.name);
            }
        }
        Ok(Self {
            roles,
            users: file.users,
        })
    }
}

#[async_trait]
impl RoleProvider for Snapshot {
    fn name(&self) -> &str {
        "file"
    }

    async fn lookup(&self, role: &str) -> Result<Option<Arc<Role>>, ProviderError> {
        Ok(self.roles.get(role).cloned())
    }
}

pub struct FileRoleProvider {
    path: PathBuf,
    registry: Arc<PrivilegeRegistry>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl FileRoleProvider {
    pub async fn load(path: impl Into<PathBuf>, registry: Arc<PrivilegeRegistry>) -> Result<Self> {
        let path = path.into();
        let snapshot = read_snapshot(&path, &registry).await?;
        tracing::info!(
            path = %path.display(),
            roles = snapshot.roles.len(),
            users = snapshot.users.len(),
            "role file loaded"
        );
        Ok(Self {
            path,
            registry,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Re-read the file and swap in the new definitions.
    ///
    /// Returns the number of roles now served.
    pub async fn reload(&self) -> Result<usize> {
        let next = match read_snapshot(&self.path, &self.registry).await {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "role file reload failed"
                );
                return Err(err);
            }
        };
        let count = next.roles.len();
        *self.snapshot.write().await = Arc::new(next);
        tracing::info!(path = %self.path.display(), roles = count, "role file reloaded");
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.current().await.roles.keys().cloned().collect();
        names.sort();
        names
    }

    async fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }
}

async fn read_snapshot(path: &Path, registry: &PrivilegeRegistry) -> Result<Snapshot> {
    let file = RoleFile::read(path)
        .await
        .with_context(|| format!("read role file: {}", path.display()))?;
    Snapshot::build(file, registry).with_context(|| format!("load role file: {}", path.display()))
}

#[async_trait]
impl RoleProvider for FileRoleProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn lookup(&self, role: &str) -> Result<Option<Arc<Role>>, ProviderError> {
        self.current().await.lookup(role).await
    }
}

impl std::fmt::Debug for FileRoleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRoleProvider")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Effective roles from the `users` and `roles` sections of one snapshot.
///
/// Providers in `ahead` take precedence over the file's definitions.
#[derive(Debug)]
pub struct FileRoleSource {
    ahead: RoleResolver,
    file: Arc<FileRoleProvider>,
}

impl FileRoleSource {
    pub fn new(ahead: RoleResolver, file: Arc<FileRoleProvider>) -> Self {
        Self { ahead, file }
    }
}

#[async_trait]
impl PrincipalRoleSource for FileRoleSource {
    async fn effective_role(&self, principal: &str) -> AuthzResult<EffectiveRole> {
        let snapshot = self.file.current().await;
        let names = snapshot.users.get(principal).cloned().unwrap_or_default();
        self.ahead
            .clone()
            .with_provider(snapshot)
            .resolve(names)
            .await
    }
}
