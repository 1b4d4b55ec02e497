// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fine-grained permission tokens carried in the `scope` claim.
//!
//! Tokens are separated by whitespace and/or commas. `*` grants every
//! capability; a `!` prefix revokes one explicitly.

use std::collections::BTreeSet;

use serde::{Serialize, Serializer};

/// Wildcard token granting every capability.
pub const WILDCARD: &str = "*";

const REVOKE_PREFIX: char = '!';

/// Result of looking a capability up in a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMatch {
    Granted,
    Revoked,
    Absent,
}

/// Parsed scope claim. Keeps the raw string for display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scope {
    raw: String,
    granted: BTreeSet<String>,
    revoked: BTreeSet<String>,
}

impl Scope {
    pub fn parse(raw: &str) -> Self {
        let mut granted = BTreeSet::new();
        let mut revoked = BTreeSet::new();

        for token in raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            match token.strip_prefix(REVOKE_PREFIX) {
                Some(cap) if !cap.is_empty() => {
                    revoked.insert(cap.to_string());
                }
                Some(_) => {}
                None => {
                    granted.insert(token.to_string());
                }
            }
        }

        Self {
            raw: raw.to_string(),
            granted,
            revoked,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.granted.is_empty() && self.revoked.is_empty()
    }

    /// Granted tokens in sorted order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.granted.iter().map(String::as_str)
    }

    /// Revocations win over grants, including the wildcard.
    pub fn lookup(&self, capability: &str) -> ScopeMatch {
        if self.revoked.contains(capability) {
            ScopeMatch::Revoked
        } else if self.granted.contains(capability) || self.granted.contains(WILDCARD) {
            ScopeMatch::Granted
        } else {
            ScopeMatch::Absent
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_space_and_comma_delimited_tokens() {
        let scope = Scope::parse("test:read, orders:write  users:read,,");
        let tokens: Vec<_> = scope.tokens().collect();
        assert_eq!(tokens, vec!["orders:write", "test:read", "users:read"]);
        assert_eq!(scope.as_str(), "test:read, orders:write  users:read,,");
    }

    #[test]
    fn lookup_distinguishes_grant_revocation_and_absence() {
        let scope = Scope::parse("test:read !orders:write");
        assert_eq!(scope.lookup("test:read"), ScopeMatch::Granted);
        assert_eq!(scope.lookup("orders:write"), ScopeMatch::Revoked);
        assert_eq!(scope.lookup("users:read"), ScopeMatch::Absent);
    }

    #[test]
    fn wildcard_grants_everything_except_revoked() {
        let scope = Scope::parse("* !admin:write");
        assert_eq!(scope.lookup("anything"), ScopeMatch::Granted);
        assert_eq!(scope.lookup("admin:write"), ScopeMatch::Revoked);
    }

    #[test]
    fn empty_scope_grants_nothing() {
        let scope = Scope::parse("  ");
        assert!(scope.is_empty());
        assert_eq!(scope.lookup("test:read"), ScopeMatch::Absent);
    }

    #[test]
    fn bare_revoke_prefix_is_ignored() {
        let scope = Scope::parse("!");
        assert!(scope.is_empty());
    }

    #[test]
    fn serializes_as_raw_string() {
        let scope = Scope::parse("a b");
        assert_eq!(serde_json::to_string(&scope).unwrap(), "\"a b\"");
    }
}
