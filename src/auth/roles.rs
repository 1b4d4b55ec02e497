// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role bundles: the coarse permission sets a `role` claim implies.

use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;

use super::scope::WILDCARD;

/// Mapping from role name to the capabilities it implies.
///
/// Role names are matched case-insensitively. Unknown roles imply nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<String, Vec<String>>")]
pub struct RoleBundles {
    bundles: HashMap<String, BTreeSet<String>>,
}

impl From<HashMap<String, Vec<String>>> for RoleBundles {
    fn from(raw: HashMap<String, Vec<String>>) -> Self {
        let mut bundles: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (role, caps) in raw {
            bundles
                .entry(role.to_lowercase())
                .or_default()
                .extend(caps);
        }
        Self { bundles }
    }
}

impl RoleBundles {
    /// Check if the role implies the capability (directly or through `*`).
    pub fn implies(&self, role: &str, capability: &str) -> bool {
        self.bundles
            .get(&role.to_lowercase())
            .map(|caps| caps.contains(capability) || caps.contains(WILDCARD))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}
