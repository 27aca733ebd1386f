//! Privilege catalog and implication table.
//!
//! # Purpose
//! Maps named cluster and index privileges to the action patterns they
//! authorize, and precomputes which privileges imply which.
//!
//! # How it fits
//! Role construction validates grants against the registry; the
//! authorization engine consults [`PrivilegeRegistry::implies`] for every
//! check. The registry is built once at startup and shared behind an `Arc`.
//!
//! # Key invariants
//! - Privilege `A` implies `B` iff the action set of `A` contains the action
//!   set of `B`. The relation is reflexive and transitive.
//! - The reserved privilege [`ALL_PRIVILEGE`] implies every privilege in its
//!   scope, because a table whose `all` does not cover every other entry is
//!   rejected.
//! - Scopes are never compared with each other.
//!
//! # Examples
//! ```rust
//! use warden_authz::{PrivilegeRegistry, PrivilegeScope};
//!
//! let registry = PrivilegeRegistry::builtin();
//! assert!(registry.implies("write", "delete", PrivilegeScope::Index));
//! assert!(!registry.implies("index", "delete", PrivilegeScope::Index));
//! ```
//!
//! # Common pitfalls
//! - Unregistered names are only ever implied by themselves, unless they are
//!   raw action names (`indices:data/read/search`) covered by a granted
//!   privilege's patterns.
use crate::matcher::{ActionPattern, covers_all};
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name of the reserved privilege that implies everything in its scope.
pub const ALL_PRIVILEGE: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeScope {
    Cluster,
    Index,
}

impl PrivilegeScope {
    pub fn as_str(self) -> &'static str {
        match self {
            PrivilegeScope::Cluster => "cluster",
            PrivilegeScope::Index => "index",
        }
    }
}

impl std::fmt::Display for PrivilegeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PrivilegeScope {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cluster" => Ok(PrivilegeScope::Cluster),
            "index" => Ok(PrivilegeScope::Index),
            _ => Err(()),
        }
    }
}

/// One row of the privilege table as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeDefinition {
    pub name: String,
    pub scope: PrivilegeScope,
    pub actions: Vec<String>,
}

impl PrivilegeDefinition {
    pub fn new(
        name: impl Into<String>,
        scope: PrivilegeScope,
        actions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            scope,
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }
}

/// A named privilege and the action patterns it authorizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Privilege {
    pub name: String,
    pub scope: PrivilegeScope,
    pub actions: Vec<ActionPattern>,
}

impl Privilege {
    /// Whether this privilege authorizes the concrete action name.
    pub fn grants_action(&self, action: &str) -> bool {
        self.actions
            .iter()
            .any(|pattern| pattern.matches_action(action))
    }
}

const BUILTIN_CLUSTER: &[(&str, &[&str])] = &[
    (ALL_PRIVILEGE, &["cluster:*", "indices:admin/template/*"]),
    ("monitor", &["cluster:monitor/*"]),
    ("monitor_ml", &["cluster:monitor/xpack/ml/*"]),
    ("monitor_watcher", &["cluster:monitor/xpack/watcher/*"]),
    (
        "manage",
        &[
            "cluster:monitor/*",
            "cluster:admin/*",
            "indices:admin/template/*",
        ],
    ),
    (
        "manage_ml",
        &["cluster:admin/xpack/ml/*", "cluster:monitor/xpack/ml/*"],
    ),
    ("manage_index_templates", &["indices:admin/template/*"]),
    ("manage_pipeline", &["cluster:admin/ingest/pipeline/*"]),
    (
        "transport_client",
        &["cluster:monitor/nodes/liveness", "cluster:monitor/state"],
    ),
];

const BUILTIN_INDEX: &[(&str, &[&str])] = &[
    (ALL_PRIVILEGE, &["indices:*"]),
    ("manage", &["indices:monitor/*", "indices:admin/*"]),
    ("monitor", &["indices:monitor/*"]),
    ("create_index", &["indices:admin/create"]),
    ("delete_index", &["indices:admin/delete"]),
    (
        "view_index_metadata",
        &[
            "indices:admin/get",
            "indices:admin/mappings/get",
            "indices:admin/aliases/get",
            "indices:monitor/settings/get",
        ],
    ),
    ("read", &["indices:data/read/*"]),
    (
        "index",
        &[
            "indices:data/write/index*",
            "indices:data/write/update*",
            "indices:data/write/bulk*",
        ],
    ),
    (
        "create",
        &["indices:data/write/index*", "indices:data/write/bulk*"],
    ),
    (
        "delete",
        &["indices:data/write/delete*", "indices:data/write/bulk*"],
    ),
    ("write", &["indices:data/write/*"]),
];

/// Privileges of one scope plus their implication matrix.
#[derive(Debug, Default)]
struct ScopeTable {
    privileges: Vec<Privilege>,
    positions: HashMap<String, usize>,
    // implies[granted][requested]
    implies: Vec<Vec<bool>>,
}

impl ScopeTable {
    fn insert(&mut self, privilege: Privilege) -> AuthzResult<()> {
        if self.positions.contains_key(&privilege.name) {
            return Err(AuthzError::InvalidRegistry(format!(
                "duplicate {} privilege: {}",
                privilege.scope, privilege.name
            )));
        }
        self.positions
            .insert(privilege.name.clone(), self.privileges.len());
        self.privileges.push(privilege);
        Ok(())
    }

    fn compute_implications(&mut self) {
        let len = self.privileges.len();
        self.implies = (0..len)
            .map(|granted| {
                let outer = &self.privileges[granted];
                (0..len)
                    .map(|requested| {
                        granted == requested
                            || covers_all(&outer.actions, &self.privileges[requested].actions)
                    })
                    .collect()
            })
            .collect();
    }

    // `all` must cover every privilege of its scope.
    fn ensure_all_covers_scope(&self) -> AuthzResult<()> {
        let Some(all) = self.get(ALL_PRIVILEGE) else {
            return Ok(());
        };
        match self
            .privileges
            .iter()
            .find(|privilege| !covers_all(&all.actions, &privilege.actions))
        {
            Some(uncovered) => Err(AuthzError::InvalidRegistry(format!(
                "{} privilege {ALL_PRIVILEGE} does not cover {}",
                uncovered.scope, uncovered.name
            ))),
            None => Ok(()),
        }
    }

    fn get(&self, name: &str) -> Option<&Privilege> {
        self.positions.get(name).map(|idx| &self.privileges[*idx])
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    privileges: Vec<PrivilegeDefinition>,
}

/// Immutable catalog of cluster and index privileges.
#[derive(Debug)]
pub struct PrivilegeRegistry {
    cluster: ScopeTable,
    index: ScopeTable,
}

impl PrivilegeRegistry {
    /// The standard cluster and index privilege catalog.
    pub fn builtin() -> Self {
        Self::from_definitions(builtin_definitions())
            .expect("builtin privilege table must be valid")
    }

    /// Build a registry from a table of privilege definitions.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidRegistry`] for empty names, empty action lists,
    ///   malformed action patterns, duplicate names within a scope, or an
    ///   `all` privilege that does not cover every privilege of its scope.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = PrivilegeDefinition>,
    ) -> AuthzResult<Self> {
        let mut cluster = ScopeTable::default();
        let mut index = ScopeTable::default();

        for definition in definitions {
            let name = definition.name.trim();
            if name.is_empty() {
                return Err(AuthzError::InvalidRegistry(
                    "privilege name must not be empty".to_string(),
                ));
            }
            if definition.actions.is_empty() {
                return Err(AuthzError::InvalidRegistry(format!(
                    "{} privilege {name} has no actions",
                    definition.scope
                )));
            }
            let actions = definition
                .actions
                .iter()
                .map(|raw| ActionPattern::parse(raw))
                .collect::<AuthzResult<Vec<_>>>()?;
            let privilege = Privilege {
                name: name.to_string(),
                scope: definition.scope,
                actions,
            };
            match definition.scope {
                PrivilegeScope::Cluster => cluster.insert(privilege)?,
                PrivilegeScope::Index => index.insert(privilege)?,
            }
        }

        cluster.ensure_all_covers_scope()?;
        index.ensure_all_covers_scope()?;
        cluster.compute_implications();
        index.compute_implications();
        tracing::debug!(
            cluster = cluster.privileges.len(),
            index = index.privileges.len(),
            "privilege registry built"
        );
        Ok(Self { cluster, index })
    }

    /// Parse a YAML document of the form `privileges: [{name, scope, actions}]`.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidRegistry`] if the document does not parse or any
    ///   entry is malformed.
    pub fn from_yaml(contents: &str) -> AuthzResult<Self> {
        let file: RegistryFile = serde_yaml::from_str(contents)
            .map_err(|err| AuthzError::InvalidRegistry(err.to_string()))?;
        Self::from_definitions(file.privileges)
    }

    /// Look up a privilege by name within a scope.
    ///
    /// # Errors
    /// - [`AuthzError::UnknownPrivilege`] if the name is not registered.
    pub fn resolve(&self, name: &str, scope: PrivilegeScope) -> AuthzResult<&Privilege> {
        self.table(scope)
            .get(name)
            .ok_or_else(|| AuthzError::UnknownPrivilege {
                scope,
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str, scope: PrivilegeScope) -> bool {
        self.table(scope).positions.contains_key(name)
    }

    /// Registered privilege names of a scope, in table order.
    pub fn names(&self, scope: PrivilegeScope) -> impl Iterator<Item = &str> {
        self.table(scope)
            .privileges
            .iter()
            .map(|privilege| privilege.name.as_str())
    }

    /// Whether holding `granted` satisfies a check for `requested`.
    pub fn implies(&self, granted: &str, requested: &str, scope: PrivilegeScope) -> bool {
        if granted == requested {
            return true;
        }
        let table = self.table(scope);
        let Some(&granted_idx) = table.positions.get(granted) else {
            return false;
        };
        if let Some(&requested_idx) = table.positions.get(requested) {
            return table.implies[granted_idx][requested_idx];
        }
        // Callers may ask about a raw action instead of a named privilege.
        is_action_name(requested) && table.privileges[granted_idx].grants_action(requested)
    }

    fn table(&self, scope: PrivilegeScope) -> &ScopeTable {
        match scope {
            PrivilegeScope::Cluster => &self.cluster,
            PrivilegeScope::Index => &self.index,
        }
    }
}

impl Default for PrivilegeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Definitions backing [`PrivilegeRegistry::builtin`].
pub fn builtin_definitions() -> Vec<PrivilegeDefinition> {
    let cluster = BUILTIN_CLUSTER.iter().map(|(name, actions)| {
        PrivilegeDefinition::new(*name, PrivilegeScope::Cluster, actions.iter().copied())
    });
    let index = BUILTIN_INDEX.iter().map(|(name, actions)| {
        PrivilegeDefinition::new(*name, PrivilegeScope::Index, actions.iter().copied())
    });
    cluster.chain(index).collect()
}

fn is_action_name(name: &str) -> bool {
    name.contains(':') && !name.contains('*')
}
