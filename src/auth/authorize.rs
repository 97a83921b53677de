// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claim-based authorization.
//!
//! A token satisfies a [`RequiredClaim`] when at least one of its triples has
//! the same site name, an equivalent URL and a non-empty role intersection.
//! The effective roles of the user are the union of the roles of every
//! matching triple, never the required roles themselves.

use url::Url;

use super::claims::{ClaimTriple, RequiredClaim};

/// Outcome of a successful authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorization {
    /// Roles of every matching triple, in claim order
    pub roles: Vec<String>,
    /// Every triple carried by the token, matched or not
    pub claims: Vec<ClaimTriple>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    #[error("no claim satisfies the required claim {required}")]
    InsufficientClaims { required: String },
}

/// Evaluate `claims` against `required`.
pub fn authorize(
    required: &RequiredClaim,
    claims: &[String],
) -> Result<Authorization, AuthorizationError> {
    let mut authorization = Authorization::default();

    for raw in claims {
        let triple = ClaimTriple::parse(raw).unwrap_or_default();

        if satisfies(&triple, required) {
            authorization.roles.extend(triple.roles.iter().cloned());
        }
        authorization.claims.push(triple);
    }

    if authorization.roles.is_empty() {
        return Err(AuthorizationError::InsufficientClaims {
            required: format!("{}|{}", required.name, required.url),
        });
    }

    Ok(authorization)
}

/// Test a single triple against the required claim.
pub fn satisfies(triple: &ClaimTriple, required: &RequiredClaim) -> bool {
    triple.name == required.name
        && urls_equivalent(&triple.url, &required.url)
        && triple.roles.iter().any(|r| required.roles.contains(r))
}

/// Scheme, host and port equal as written; paths equal after stripping one
/// trailing `/`. Query, fragment and user-info are ignored. A missing port
/// compares as empty, so `:80` differs from no port. Unparseable URLs never
/// match.
pub fn urls_equivalent(a: &str, b: &str) -> bool {
    match (UrlParts::split(a), UrlParts::split(b)) {
        (Some(a), Some(b)) => {
            a.scheme == b.scheme
                && a.host == b.host
                && a.port == b.port
                && trim_one_slash(a.path) == trim_one_slash(b.path)
        }
        _ => false,
    }
}

/// Raw components of an absolute URL, without case or port normalization.
#[derive(Debug, PartialEq, Eq)]
struct UrlParts<'a> {
    scheme: &'a str,
    host: &'a str,
    port: &'a str,
    path: &'a str,
}

impl<'a> UrlParts<'a> {
    fn split(raw: &'a str) -> Option<Self> {
        Url::parse(raw).ok()?;

        let (scheme, rest) = raw.split_once("://")?;
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (authority, path) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);

        let (host, port) = match host_port.rfind(']') {
            // IPv6 literal: the port, if any, follows the closing bracket
            Some(end) => {
                let (host, tail) = host_port.split_at(end + 1);
                (host, tail.strip_prefix(':').unwrap_or(tail))
            }
            None => host_port.rsplit_once(':').unwrap_or((host_port, "")),
        };
        if host.is_empty() {
            return None;
        }

        Some(Self {
            scheme,
            host,
            port,
            path,
        })
    }
}

fn trim_one_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|c| c.to_string()).collect()
    }

    fn required(roles: &[&str]) -> RequiredClaim {
        RequiredClaim::new("claim", "http://localhost:3000", roles)
    }

    #[test]
    fn matching_claim_yields_its_roles() {
        let result = authorize(&required(&["role"]), &claims(&["claim|http://localhost:3000|role"]))
            .unwrap();
        assert_eq!(result.roles, vec!["role"]);
        assert_eq!(result.claims.len(), 1);
    }

    #[test]
    fn roles_are_the_token_roles_not_the_required_ones() {
        let result = authorize(
            &required(&["role"]),
            &claims(&["claim|http://localhost:3000|role;admin;viewer"]),
        )
        .unwrap();
        assert_eq!(result.roles, vec!["role", "admin", "viewer"]);
    }

    #[test]
    fn roles_accumulate_across_matching_claims() {
        let result = authorize(
            &required(&["role", "admin"]),
            &claims(&[
                "claim|http://localhost:3000|role",
                "other|http://localhost:3000|admin",
                "claim|http://localhost:3000/|admin;audit",
            ]),
        )
        .unwrap();
        assert_eq!(result.roles, vec!["role", "admin", "audit"]);
        assert_eq!(result.claims.len(), 3);
    }

    #[test]
    fn missing_role_is_insufficient() {
        let result = authorize(&required(&["admin"]), &claims(&["claim|http://localhost:3000|role"]));
        assert!(matches!(result, Err(AuthorizationError::InsufficientClaims { .. })));
    }

    #[test]
    fn wrong_name_is_insufficient() {
        let result = authorize(&required(&["role"]), &claims(&["Claim|http://localhost:3000|role"]));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_claims_are_recorded_as_empty_triples() {
        let result = authorize(
            &required(&["role"]),
            &claims(&["garbage", "", "claim|http://localhost:3000|role"]),
        )
        .unwrap();
        assert_eq!(result.claims.len(), 3);
        assert!(result.claims[0].is_empty());
        assert!(result.claims[1].is_empty());
        assert_eq!(result.roles, vec!["role"]);
    }

    #[test]
    fn no_claims_is_insufficient() {
        assert!(authorize(&required(&["role"]), &[]).is_err());
    }

    #[test]
    fn trailing_slash_is_ignored() {
        assert!(urls_equivalent("https://host:8443/p", "https://host:8443/p/"));
        assert!(urls_equivalent("http://A", "http://A/"));
    }

    #[test]
    fn differing_scheme_host_or_port_are_not_equivalent() {
        assert!(!urls_equivalent("http://host:8080/p", "https://host:8080/p"));
        assert!(!urls_equivalent("http://host:8080/p", "http://other:8080/p"));
        assert!(!urls_equivalent("http://host:8080/p", "http://host:8081/p"));
        assert!(!urls_equivalent("http://host:8080/p", "http://host/p"));
    }

    #[test]
    fn query_fragment_and_userinfo_are_ignored() {
        assert!(urls_equivalent(
            "http://user:pw@host/p?x=1#frag",
            "http://host/p"
        ));
    }

    #[test]
    fn only_one_trailing_slash_is_stripped() {
        assert!(!urls_equivalent("http://host/p//", "http://host/p"));
    }

    #[test]
    fn host_comparison_is_case_sensitive() {
        assert!(!urls_equivalent("http://A", "http://a"));
        assert!(!urls_equivalent("https://Host.Example:8443/p", "https://host.example:8443/p"));
        assert!(urls_equivalent("http://A/p", "http://A/p/"));
    }

    #[test]
    fn explicit_default_port_differs_from_missing_port() {
        assert!(!urls_equivalent("http://host:80/p", "http://host/p"));
        assert!(!urls_equivalent("https://host/p", "https://host:443/p"));
        assert!(urls_equivalent("http://host:80/p", "http://host:80/p/"));
    }

    #[test]
    fn ipv6_hosts_keep_their_port() {
        assert!(urls_equivalent("http://[::1]:8080/p", "http://[::1]:8080/p/"));
        assert!(!urls_equivalent("http://[::1]:8080/p", "http://[::1]/p"));
    }

    #[test]
    fn upper_case_host_with_default_port_is_insufficient() {
        let required = RequiredClaim::new("claim", "http://LOCALHOST:80", &["role"]);
        let result = authorize(&required, &claims(&["claim|http://localhost|role"]));
        assert!(matches!(result, Err(AuthorizationError::InsufficientClaims { .. })));
    }

    #[test]
    fn unparseable_url_does_not_match() {
        assert!(!urls_equivalent("not a url", "http://host"));
        let result = authorize(&required(&["role"]), &claims(&["claim|::bad::|role"]));
        assert!(result.is_err());
    }
}
