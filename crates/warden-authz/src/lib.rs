//! Warden role-based authorization primitives.
//!
//! # Purpose
//! Decides whether a principal holds named cluster privileges and index
//! privileges on concrete index names, based on the roles assigned to it.
//!
//! # How it fits
//! A [`PrivilegeRegistry`] names privileges and their implication order.
//! [`RoleProvider`]s supply [`Role`] definitions, the [`RoleResolver`] unions
//! them into an [`EffectiveRole`], and the [`AuthorizationEngine`] answers
//! individual checks. [`HasPrivilegesEvaluator`] ties these together into a
//! batch has-privileges query.
//!
//! # Key invariants
//! - Privilege A implies B iff every action B covers is covered by A; every
//!   privilege implies itself and `all` implies everything in its scope.
//! - Index names in a request are literal, never wildcard-expanded.
//! - Role resolution is first-provider-wins and deterministic.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use warden_authz::{AuthorizationEngine, EffectiveRole, PrivilegeRegistry, Role};
//!
//! let registry = Arc::new(PrivilegeRegistry::builtin());
//! let role = Role::builder("ops")
//!     .cluster(["all"])
//!     .build(&registry)
//!     .expect("role");
//! let engine = AuthorizationEngine::new(registry);
//! assert!(engine.check_cluster(&EffectiveRole::from(&role), "monitor"));
//! ```
//!
//! # Common pitfalls
//! - Registering user-defined providers ahead of [`ReservedRoleProvider`] lets
//!   them shadow `superuser`.
//! - Expecting `log*` in a request to match grants on `logs-*`; the request
//!   side is matched as the literal string.

mod engine;
mod errors;
mod has_privileges;
mod matcher;
mod privilege;
mod provider;
mod resolver;
mod role;

pub use engine::AuthorizationEngine;
pub use errors::{AuthzError, AuthzResult, ProviderError};
pub use has_privileges::{
    HasPrivilegesEvaluator, HasPrivilegesRequest, HasPrivilegesResponse, IndexPrivilegesCheck,
    IndexPrivilegesResult, PrivilegeResult,
};
pub use matcher::{ActionPattern, wildcard_match};
pub use privilege::{
    ALL_PRIVILEGE, Privilege, PrivilegeDefinition, PrivilegeRegistry, PrivilegeScope,
    builtin_definitions,
};
pub use provider::{
    InMemoryRoleProvider, PrincipalDirectory, ReservedRoleProvider, RoleProvider, SUPERUSER_ROLE,
};
pub use resolver::{DirectoryRoleSource, PrincipalRoleSource, RoleResolver};
pub use role::{EffectiveRole, IndexGrant, IndicesPrivileges, Role, RoleBuilder, RoleDescriptor};
