//! Resource and action pattern matching.
//!
//! # Purpose
//! Matches stored grant patterns against literal resource names, and decides
//! containment between action patterns when the privilege registry builds its
//! implication table.
//!
//! # Key invariants
//! - Matching is directional: the pattern side may contain `*`, the value side
//!   is always a literal. A `*` in the value is just another character.
//! - Action patterns allow a single trailing `*`; containment between two
//!   such patterns is exact set inclusion.
use crate::{AuthzError, AuthzResult};

/// Glob-match a stored `pattern` against a literal `value`.
///
/// `*` in the pattern matches any (possibly empty) substring. The value is
/// never interpreted as a pattern.
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let (mut p_idx, mut v_idx) = (0usize, 0usize);
    let (mut star_idx, mut match_idx) = (None, 0usize);
    let pattern_bytes = pattern.as_bytes();
    let value_bytes = value.as_bytes();

    while v_idx < value_bytes.len() {
        if p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == b'*' {
            star_idx = Some(p_idx);
            match_idx = v_idx;
            p_idx += 1;
            continue;
        }

        if p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == value_bytes[v_idx] {
            p_idx += 1;
            v_idx += 1;
            continue;
        }

        if let Some(star) = star_idx {
            p_idx = star + 1;
            match_idx += 1;
            v_idx = match_idx;
            continue;
        }

        return false;
    }

    while p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == b'*' {
        p_idx += 1;
    }

    p_idx == pattern_bytes.len()
}

/// A low-level action pattern backing a named privilege.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionPattern {
    /// A single action name, e.g. `indices:admin/create`.
    Exact(String),
    /// Every action starting with the prefix, written `prefix*`.
    Prefix(String),
}

impl ActionPattern {
    /// Parse an action pattern from its registry form.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidRegistry`] for empty patterns or a `*` anywhere
    ///   but the final position.
    pub fn parse(raw: &str) -> AuthzResult<Self> {
        if raw.trim().is_empty() {
            return Err(AuthzError::InvalidRegistry(
                "empty action pattern".to_string(),
            ));
        }
        if let Some(prefix) = raw.strip_suffix('*') {
            if prefix.contains('*') {
                return Err(AuthzError::InvalidRegistry(format!(
                    "wildcard only allowed at the end of action pattern: {raw}"
                )));
            }
            return Ok(ActionPattern::Prefix(prefix.to_string()));
        }
        if raw.contains('*') {
            return Err(AuthzError::InvalidRegistry(format!(
                "wildcard only allowed at the end of action pattern: {raw}"
            )));
        }
        Ok(ActionPattern::Exact(raw.to_string()))
    }

    /// Whether a concrete action name falls under this pattern.
    pub fn matches_action(&self, action: &str) -> bool {
        match self {
            ActionPattern::Exact(name) => name == action,
            ActionPattern::Prefix(prefix) => action.starts_with(prefix.as_str()),
        }
    }

    /// Whether every action matched by `other` is also matched by `self`.
    pub fn contains(&self, other: &ActionPattern) -> bool {
        match (self, other) {
            (ActionPattern::Prefix(outer), ActionPattern::Prefix(inner))
            | (ActionPattern::Prefix(outer), ActionPattern::Exact(inner)) => {
                inner.starts_with(outer.as_str())
            }
            (ActionPattern::Exact(outer), ActionPattern::Exact(inner)) => outer == inner,
            (ActionPattern::Exact(_), ActionPattern::Prefix(_)) => false,
        }
    }
}

impl std::fmt::Display for ActionPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionPattern::Exact(name) => f.write_str(name),
            ActionPattern::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

/// Set inclusion over action-pattern sets: every pattern in `inner` is
/// contained by at least one pattern in `outer`.
pub fn covers_all(outer: &[ActionPattern], inner: &[ActionPattern]) -> bool {
    inner
        .iter()
        .all(|needle| outer.iter().any(|pattern| pattern.contains(needle)))
}
