//! Multi-provider role resolution.
//!
//! # Purpose
//! Turns a set of role names into one [`EffectiveRole`] by asking an ordered
//! list of [`RoleProvider`]s.
//!
//! # Key invariants
//! - First match wins: for each name, providers are consulted in
//!   registration order and the first definition found is used. Later
//!   providers are never asked about that name.
//! - A name no provider defines contributes nothing.
//! - A failing provider counts as a miss. Only when every provider fails for
//!   a name does resolution fail, so an outage never looks like "no access".
//! - Output is deterministic: roles are unioned in sorted name order.
//!
//! # Security considerations
//! - Register [`crate::ReservedRoleProvider`] first so reserved names cannot
//!   be shadowed by user-defined roles.
use crate::{AuthzError, AuthzResult, EffectiveRole, PrincipalDirectory, Role, RoleProvider};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct RoleResolver {
    providers: Vec<Arc<dyn RoleProvider>>,
}

impl RoleResolver {
    pub fn new(providers: Vec<Arc<dyn RoleProvider>>) -> Self {
        Self { providers }
    }

    /// Append a provider; it has lower precedence than those already added.
    pub fn with_provider(mut self, provider: Arc<dyn RoleProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Provider names in precedence order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers
            .iter()
            .map(|provider| provider.name())
            .collect()
    }

    /// Resolve and union the named roles.
    ///
    /// Distinct names are looked up concurrently.
    ///
    /// # Errors
    /// - [`AuthzError::AllProvidersFailed`] if every provider errored for one
    ///   of the names.
    pub async fn resolve<I, S>(&self, role_names: I) -> AuthzResult<EffectiveRole>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = role_names
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let resolved = try_join_all(names.iter().map(|name| self.resolve_role(name))).await?;
        let roles: Vec<Arc<Role>> = resolved.into_iter().flatten().collect();
        metrics::counter!("warden_roles_resolved_total").increment(roles.len() as u64);

        let effective = EffectiveRole::from_roles(roles.iter().map(|role| role.as_ref()));
        tracing::debug!(
            requested = names.len(),
            resolved = effective.role_names().len(),
            "roles resolved"
        );
        Ok(effective)
    }

    /// Find the authoritative definition of a single role.
    pub async fn resolve_role(&self, name: &str) -> AuthzResult<Option<Arc<Role>>> {
        let mut failures = 0usize;
        for provider in &self.providers {
            match provider.lookup(name).await {
                Ok(Some(role)) => {
                    tracing::trace!(role = name, provider = provider.name(), "role found");
                    return Ok(Some(role));
                }
                Ok(None) => {}
                Err(err) => {
                    failures += 1;
                    tracing::warn!(
                        role = name,
                        provider = provider.name(),
                        error = %err,
                        "role provider lookup failed"
                    );
                    metrics::counter!(
                        "warden_role_provider_failures_total",
                        "provider" => provider.name().to_string()
                    )
                    .increment(1);
                }
            }
        }

        if !self.providers.is_empty() && failures == self.providers.len() {
            return Err(AuthzError::AllProvidersFailed {
                role: name.to_string(),
            });
        }
        tracing::debug!(role = name, "role not defined by any provider");
        Ok(None)
    }
}

impl std::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleResolver")
            .field("providers", &self.provider_names())
            .finish()
    }
}

/// Produces the effective role of a principal in one step.
///
/// Implementations backed by reloadable data must answer each call from a
/// single view of both the role assignments and the role definitions.
#[async_trait]
pub trait PrincipalRoleSource: Send + Sync {
    async fn effective_role(&self, principal: &str) -> AuthzResult<EffectiveRole>;
}

/// Role names from a [`PrincipalDirectory`], definitions from a
/// [`RoleResolver`].
pub struct DirectoryRoleSource {
    directory: Arc<dyn PrincipalDirectory>,
    resolver: RoleResolver,
}

impl DirectoryRoleSource {
    pub fn new(directory: Arc<dyn PrincipalDirectory>, resolver: RoleResolver) -> Self {
        Self {
            directory,
            resolver,
        }
    }
}

#[async_trait]
impl PrincipalRoleSource for DirectoryRoleSource {
    async fn effective_role(&self, principal: &str) -> AuthzResult<EffectiveRole> {
        let names = self
            .directory
            .role_names(principal)
            .await
            .map_err(AuthzError::PrincipalLookup)?;
        self.resolver.resolve(names).await
    }
}

impl std::fmt::Debug for DirectoryRoleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryRoleSource")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryRoleProvider, PrivilegeRegistry, ProviderError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingProvider;

    #[async_trait]
    impl RoleProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn lookup(&self, _role: &str) -> Result<Option<Arc<Role>>, ProviderError> {
            Err(ProviderError::Unavailable("backend down".to_string()))
        }
    }

    /// Counts lookups so tests can assert precedence short-circuits.
    struct CountingProvider {
        inner: InMemoryRoleProvider,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RoleProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn lookup(&self, role: &str) -> Result<Option<Arc<Role>>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.lookup(role).await
        }
    }

    fn role(name: &str, privilege: &str) -> Role {
        Role::builder(name)
            .add_index([privilege], ["foo"])
            .build(&PrivilegeRegistry::builtin())
            .expect("role")
    }

    #[tokio::test]
    async fn first_provider_wins() {
        let first = Arc::new(InMemoryRoleProvider::with_roles(
            "first",
            [role("role_a", "read")],
        ));
        let second = Arc::new(CountingProvider {
            inner: InMemoryRoleProvider::with_roles(
                "second",
                [role("role_a", "all"), role("role_b", "all")],
            ),
            calls: AtomicUsize::new(0),
        });
        let resolver = RoleResolver::default()
            .with_provider(first)
            .with_provider(second.clone());

        for _ in 0..3 {
            let effective = resolver.resolve(["role_a"]).await.expect("resolve");
            assert_eq!(effective.indices().len(), 1);
            assert!(effective.indices()[0].privileges().contains("read"));
        }
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);

        let effective = resolver.resolve(["role_b"]).await.expect("resolve");
        assert!(effective.indices()[0].privileges().contains("all"));
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_role_contributes_nothing() {
        let resolver = RoleResolver::default().with_provider(Arc::new(
            InMemoryRoleProvider::with_roles("native", [role("role_a", "read")]),
        ));
        let effective = resolver
            .resolve(["unknown", "role_a"])
            .await
            .expect("resolve");
        assert_eq!(effective.role_names(), ["role_a".to_string()]);

        let nothing = resolver.resolve(["unknown"]).await.expect("resolve");
        assert!(nothing.is_empty());
    }

    #[tokio::test]
    async fn failing_provider_is_skipped() {
        let resolver = RoleResolver::default()
            .with_provider(Arc::new(FailingProvider))
            .with_provider(Arc::new(InMemoryRoleProvider::with_roles(
                "native",
                [role("role_a", "write")],
            )));
        let effective = resolver.resolve(["role_a"]).await.expect("resolve");
        assert_eq!(effective.role_names(), ["role_a".to_string()]);
    }

    #[tokio::test]
    async fn all_providers_failing_is_an_error() {
        let providers: Vec<Arc<dyn RoleProvider>> =
            vec![Arc::new(FailingProvider), Arc::new(FailingProvider)];
        let resolver = RoleResolver::new(providers);
        let err = resolver.resolve(["role_a"]).await.expect_err("outage");
        assert!(matches!(err, AuthzError::AllProvidersFailed { ref role } if role == "role_a"));
    }

    #[tokio::test]
    async fn no_providers_resolves_to_empty_role() {
        let resolver = RoleResolver::default();
        let effective = resolver.resolve(["role_a"]).await.expect("resolve");
        assert!(effective.is_empty());
    }

    #[tokio::test]
    async fn names_are_deduplicated_and_sorted() {
        let resolver = RoleResolver::default().with_provider(Arc::new(
            InMemoryRoleProvider::with_roles(
                "native",
                [role("zeta", "read"), role("alpha", "write")],
            ),
        ));
        let effective = resolver
            .resolve(["zeta", "alpha", "zeta", " "])
            .await
            .expect("resolve");
        assert_eq!(
            effective.role_names(),
            ["alpha".to_string(), "zeta".to_string()]
        );
        assert_eq!(resolver.provider_names(), vec!["native"]);
    }
}
