use crate::PrivilegeScope;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("unknown {scope} privilege: {name}")]
    UnknownPrivilege { scope: PrivilegeScope, name: String },
    #[error("role {role} grants unknown {scope} privilege: {privilege}")]
    UnknownPrivilegeInGrant {
        role: String,
        scope: PrivilegeScope,
        privilege: String,
    },
    #[error("invalid role definition: {0}")]
    InvalidRole(String),
    #[error("invalid privilege registry: {0}")]
    InvalidRegistry(String),
    #[error("all role providers failed for role {role}")]
    AllProvidersFailed { role: String },
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("role resolution timed out after {0:?}")]
    Timeout(Duration),
    #[error("principal lookup failed: {0}")]
    PrincipalLookup(#[source] ProviderError),
}

pub type AuthzResult<T> = Result<T, AuthzError>;

/// Failure reported by a role provider or principal directory.
///
/// The resolver treats these as absence for the failing provider; they only
/// reach callers wrapped in [`AuthzError`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("provider returned unparseable data: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            AuthzError::UnknownPrivilege {
                scope: PrivilegeScope::Cluster,
                name: "bogus".to_string(),
            },
            AuthzError::UnknownPrivilegeInGrant {
                role: "ops".to_string(),
                scope: PrivilegeScope::Index,
                privilege: "bogus".to_string(),
            },
            AuthzError::InvalidRole("bad".to_string()),
            AuthzError::InvalidRegistry("bad".to_string()),
            AuthzError::AllProvidersFailed {
                role: "ops".to_string(),
            },
            AuthzError::MalformedRequest("empty principal".to_string()),
            AuthzError::Timeout(Duration::from_millis(250)),
            AuthzError::PrincipalLookup(ProviderError::Unavailable("ldap".to_string())),
        ];

        for error in errors {
            let rendered = error.to_string();
            assert!(!rendered.is_empty());
        }
    }

    #[test]
    fn grant_error_names_role_and_scope() {
        let err = AuthzError::UnknownPrivilegeInGrant {
            role: "ops".to_string(),
            scope: PrivilegeScope::Index,
            privilege: "bogus".to_string(),
        };
        assert_eq!(err.to_string(), "role ops grants unknown index privilege: bogus");
    }

    #[test]
    fn provider_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "roles.yml");
        let err: ProviderError = io.into();
        assert!(matches!(err, ProviderError::Io(_)));
    }
}
