//! privcheck application wiring.
//!
//! # Purpose
//! Builds the privilege registry, role providers and has-privileges evaluator
//! from a [`PrivcheckConfig`].
//!
//! # Notes
//! The reserved provider is registered ahead of the role file so `superuser`
//! cannot be redefined there.
use crate::config::PrivcheckConfig;
use crate::role_file::{FileRoleProvider, FileRoleSource};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use warden_authz::{
    AuthorizationEngine, HasPrivilegesEvaluator, HasPrivilegesRequest, HasPrivilegesResponse,
    PrivilegeRegistry, ReservedRoleProvider, RoleResolver,
};

pub struct AppState {
    pub registry: Arc<PrivilegeRegistry>,
    pub roles: Arc<FileRoleProvider>,
    pub evaluator: HasPrivilegesEvaluator,
}

impl AppState {
    pub async fn from_config(config: &PrivcheckConfig) -> Result<Self> {
        let registry = Arc::new(load_registry(config.privileges_file.as_deref()).await?);
        let reserved =
            ReservedRoleProvider::new(&registry).with_context(|| "build reserved roles")?;
        let roles = Arc::new(FileRoleProvider::load(&config.roles_file, registry.clone()).await?);

        let ahead = RoleResolver::default().with_provider(Arc::new(reserved));
        let evaluator = HasPrivilegesEvaluator::with_source(
            Arc::new(FileRoleSource::new(ahead, roles.clone())),
            AuthorizationEngine::new(registry.clone()),
        )
        .with_timeout(config.resolve_timeout);
        tracing::debug!(?evaluator, "privcheck state built");

        Ok(Self {
            registry,
            roles,
            evaluator,
        })
    }

    pub async fn check(&self, request: &HasPrivilegesRequest) -> Result<HasPrivilegesResponse> {
        self.evaluator
            .evaluate(request)
            .await
            .with_context(|| format!("evaluate privileges for {}", request.principal))
    }
}

/// Builtin registry, or the table in `path` when given.
pub async fn load_registry(path: Option<&Path>) -> Result<PrivilegeRegistry> {
    let Some(path) = path else {
        return Ok(PrivilegeRegistry::builtin());
    };
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read privileges file: {}", path.display()))?;
    PrivilegeRegistry::from_yaml(&contents)
        .with_context(|| format!("parse privileges file: {}", path.display()))
}
