// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Site claim triples and the server-side required claim.
//!
//! A claim triple is the string `<Name>|<URL>|<Role1>;<Role2>;…` and asserts
//! that the bearer holds the listed roles on the named site.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Separator between name, URL and role list.
pub const CLAIM_DELIMITER: &str = "|";

/// Separator between roles.
pub const ROLE_DELIMITER: &str = ";";

/// A parsed `name|url|roles` claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClaimTriple {
    pub name: String,
    pub url: String,
    pub roles: Vec<String>,
}

impl ClaimTriple {
    pub fn new(name: impl Into<String>, url: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            roles,
        }
    }

    /// Parse a raw claim. Returns `None` unless it has exactly three parts.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(CLAIM_DELIMITER);
        let (name, url, roles) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            url: url.to_string(),
            roles: split_roles(roles),
        })
    }

    /// True when no part carries any content.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.url.is_empty() && self.roles.is_empty()
    }
}

impl std::fmt::Display for ClaimTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{CLAIM_DELIMITER}{}{CLAIM_DELIMITER}{}",
            self.name,
            self.url,
            self.roles.join(ROLE_DELIMITER)
        )
    }
}

/// Split a `;`-delimited role list, dropping empty entries.
pub fn split_roles(list: &str) -> Vec<String> {
    list.split(ROLE_DELIMITER)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// The claim a request must satisfy to reach protected routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequiredClaim {
    pub name: String,
    pub url: String,
    pub roles: Vec<String>,
}

impl RequiredClaim {
    pub fn new(name: impl Into<String>, url: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }
}
