//! Has-privileges request evaluation.
//!
//! # Purpose
//! Answers "which of these privileges does this principal hold?" for a batch
//! of cluster privileges and (index, privilege) pairs, producing an
//! order-stable response.
//!
//! # How it fits
//! The evaluator is the only entry point that performs I/O: it asks a
//! [`PrincipalRoleSource`] for the principal's effective role, then runs pure
//! [`AuthorizationEngine`] checks. [`HasPrivilegesEvaluator::new`] pairs a
//! [`PrincipalDirectory`] with a [`RoleResolver`] for that.
//!
//! # Key invariants
//! - Index names in the request are literal. `log*` is checked as the
//!   name `log*`, it is never expanded.
//! - One response entry per distinct index string, in first-seen order
//!   across all checks; repeated strings merge their privilege results.
//! - `complete_match` is the AND of every reported boolean (true when nothing
//!   was asked).
//! - Evaluation is all-or-nothing: on failure or timeout no partial response
//!   is produced.
//!
//! # Examples
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use warden_authz::{
//!     AuthorizationEngine, HasPrivilegesEvaluator, HasPrivilegesRequest, InMemoryRoleProvider,
//!     IndexPrivilegesCheck, PrincipalDirectory, PrivilegeRegistry, Role, RoleResolver,
//! };
//!
//! let registry = Arc::new(PrivilegeRegistry::builtin());
//! let role = Role::builder("writer")
//!     .add_index(["write"], ["academy"])
//!     .build(&registry)
//!     .expect("role");
//! let resolver = RoleResolver::default()
//!     .with_provider(Arc::new(InMemoryRoleProvider::with_roles("native", [role])));
//! let mut users = HashMap::new();
//! users.insert("alice".to_string(), vec!["writer".to_string()]);
//! let directory: Arc<dyn PrincipalDirectory> = Arc::new(users);
//! let evaluator =
//!     HasPrivilegesEvaluator::new(directory, resolver, AuthorizationEngine::new(registry));
//!
//! let request = HasPrivilegesRequest::new("alice")
//!     .index_privileges(IndexPrivilegesCheck::new(["academy"], ["delete", "index"]));
//! let rt = tokio::runtime::Runtime::new().expect("rt");
//! let response = rt.block_on(evaluator.evaluate(&request)).expect("evaluate");
//! assert!(response.complete_match);
//! ```
use crate::{
    AuthorizationEngine, AuthzError, AuthzResult, DirectoryRoleSource, EffectiveRole,
    PrincipalDirectory, PrincipalRoleSource, RoleResolver,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// One group of index names checked against one group of privileges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPrivilegesCheck {
    pub indices: Vec<String>,
    pub privileges: Vec<String>,
}

impl IndexPrivilegesCheck {
    pub fn new(
        indices: impl IntoIterator<Item = impl Into<String>>,
        privileges: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            indices: indices.into_iter().map(Into::into).collect(),
            privileges: privileges.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasPrivilegesRequest {
    pub principal: String,
    #[serde(default)]
    pub cluster: Vec<String>,
    #[serde(default)]
    pub index: Vec<IndexPrivilegesCheck>,
}

impl HasPrivilegesRequest {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            ..Self::default()
        }
    }

    pub fn cluster_privileges(
        mut self,
        privileges: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.cluster.extend(privileges.into_iter().map(Into::into));
        self
    }

    pub fn index_privileges(mut self, check: IndexPrivilegesCheck) -> Self {
        self.index.push(check);
        self
    }

    /// Reject requests with blank principals, privilege names or indices.
    ///
    /// # Errors
    /// - [`AuthzError::MalformedRequest`] describing the first problem found.
    pub fn validate(&self) -> AuthzResult<()> {
        if self.principal.trim().is_empty() {
            return Err(AuthzError::MalformedRequest(
                "principal must not be empty".to_string(),
            ));
        }
        if self.cluster.iter().any(|name| name.trim().is_empty()) {
            return Err(AuthzError::MalformedRequest(
                "cluster privilege names must not be empty".to_string(),
            ));
        }
        for check in &self.index {
            if check.indices.iter().any(|index| index.trim().is_empty()) {
                return Err(AuthzError::MalformedRequest(
                    "index names must not be empty".to_string(),
                ));
            }
            if check.privileges.iter().any(|name| name.trim().is_empty()) {
                return Err(AuthzError::MalformedRequest(
                    "index privilege names must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeResult {
    pub name: String,
    pub granted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPrivilegesResult {
    pub index: String,
    pub privileges: Vec<PrivilegeResult>,
}

impl IndexPrivilegesResult {
    pub fn get(&self, privilege: &str) -> Option<bool> {
        lookup(&self.privileges, privilege)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasPrivilegesResponse {
    pub principal: String,
    pub cluster_privileges: Vec<PrivilegeResult>,
    pub index_privileges: Vec<IndexPrivilegesResult>,
    pub complete_match: bool,
}

impl HasPrivilegesResponse {
    pub fn cluster(&self, privilege: &str) -> Option<bool> {
        lookup(&self.cluster_privileges, privilege)
    }

    pub fn index(&self, index: &str) -> Option<&IndexPrivilegesResult> {
        self.index_privileges
            .iter()
            .find(|entry| entry.index == index)
    }
}

fn lookup(results: &[PrivilegeResult], name: &str) -> Option<bool> {
    results
        .iter()
        .find(|result| result.name == name)
        .map(|result| result.granted)
}

fn record(results: &mut Vec<PrivilegeResult>, name: &str, check: impl FnOnce() -> bool) {
    if results.iter().any(|result| result.name == name) {
        return;
    }
    results.push(PrivilegeResult {
        name: name.to_string(),
        granted: check(),
    });
}

pub struct HasPrivilegesEvaluator {
    roles: Arc<dyn PrincipalRoleSource>,
    engine: AuthorizationEngine,
    timeout: Option<Duration>,
}

impl HasPrivilegesEvaluator {
    pub fn new(
        directory: Arc<dyn PrincipalDirectory>,
        resolver: RoleResolver,
        engine: AuthorizationEngine,
    ) -> Self {
        Self::with_source(
            Arc::new(DirectoryRoleSource::new(directory, resolver)),
            engine,
        )
    }

    /// Evaluate against a source that resolves principals in one step.
    pub fn with_source(roles: Arc<dyn PrincipalRoleSource>, engine: AuthorizationEngine) -> Self {
        Self {
            roles,
            engine,
            timeout: None,
        }
    }

    /// Bound role resolution for every [`evaluate`](Self::evaluate) call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Evaluate a request, applying the configured resolution timeout if any.
    ///
    /// # Errors
    /// - [`AuthzError::MalformedRequest`] before any resolution work.
    /// - [`AuthzError::PrincipalLookup`] or [`AuthzError::AllProvidersFailed`]
    ///   when roles cannot be resolved.
    /// - [`AuthzError::Timeout`] when the configured deadline elapses.
    pub async fn evaluate(
        &self,
        request: &HasPrivilegesRequest,
    ) -> AuthzResult<HasPrivilegesResponse> {
        match self.timeout {
            Some(timeout) => self.evaluate_with_timeout(request, timeout).await,
            None => self.run(request, None).await,
        }
    }

    /// Evaluate a request, abandoning role resolution after `timeout`.
    pub async fn evaluate_with_timeout(
        &self,
        request: &HasPrivilegesRequest,
        timeout: Duration,
    ) -> AuthzResult<HasPrivilegesResponse> {
        self.run(request, Some(timeout)).await
    }

    /// Resolve the effective role of a principal.
    pub async fn resolve_principal(&self, principal: &str) -> AuthzResult<EffectiveRole> {
        self.roles.effective_role(principal).await
    }

    /// Run every check of `request` against an already resolved role.
    pub fn check_request(
        &self,
        role: &EffectiveRole,
        request: &HasPrivilegesRequest,
    ) -> HasPrivilegesResponse {
        let mut cluster_privileges = Vec::with_capacity(request.cluster.len());
        for privilege in &request.cluster {
            record(&mut cluster_privileges, privilege, || {
                self.engine.check_cluster(role, privilege)
            });
        }

        let mut index_privileges: Vec<IndexPrivilegesResult> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for check in &request.index {
            for index in &check.indices {
                let position = *positions.entry(index.as_str()).or_insert_with(|| {
                    index_privileges.push(IndexPrivilegesResult {
                        index: index.clone(),
                        privileges: Vec::with_capacity(check.privileges.len()),
                    });
                    index_privileges.len() - 1
                });
                let entry = &mut index_privileges[position];
                for privilege in &check.privileges {
                    record(&mut entry.privileges, privilege, || {
                        self.engine.check_index(role, index, privilege)
                    });
                }
            }
        }

        let complete_match = cluster_privileges.iter().all(|result| result.granted)
            && index_privileges
                .iter()
                .flat_map(|entry| entry.privileges.iter())
                .all(|result| result.granted);

        HasPrivilegesResponse {
            principal: request.principal.clone(),
            cluster_privileges,
            index_privileges,
            complete_match,
        }
    }

    #[tracing::instrument(
        name = "has_privileges",
        skip_all,
        fields(principal = %request.principal)
    )]
    async fn run(
        &self,
        request: &HasPrivilegesRequest,
        timeout: Option<Duration>,
    ) -> AuthzResult<HasPrivilegesResponse> {
        let result = self.run_inner(request, timeout).await;
        let outcome = match &result {
            Ok(response) if response.complete_match => "complete",
            Ok(_) => "partial",
            Err(AuthzError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        metrics::counter!("warden_has_privileges_total", "outcome" => outcome).increment(1);
        match &result {
            Ok(response) => tracing::debug!(
                complete_match = response.complete_match,
                cluster = response.cluster_privileges.len(),
                indices = response.index_privileges.len(),
                "has-privileges evaluated"
            ),
            Err(err) => tracing::debug!(error = %err, "has-privileges failed"),
        }
        result
    }

    async fn run_inner(
        &self,
        request: &HasPrivilegesRequest,
        timeout: Option<Duration>,
    ) -> AuthzResult<HasPrivilegesResponse> {
        request.validate()?;
        let role = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.resolve_principal(&request.principal))
                .await
                .map_err(|_| AuthzError::Timeout(limit))??,
            None => self.resolve_principal(&request.principal).await?,
        };
        Ok(self.check_request(&role, request))
    }
}

impl std::fmt::Debug for HasPrivilegesEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HasPrivilegesEvaluator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
