// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Site grants and login audit records.
//!
//! A site row grants one user a `;`-delimited role list on one logical site.
//! Rows are identified by `(name, user)`; users are matched case-insensitively.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

use crate::auth::claims::{CLAIM_DELIMITER, ROLE_DELIMITER};

/// Persisted grant of a role list on a site to a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteRow {
    /// Logical site name
    pub name: String,
    /// User email
    pub user: String,
    /// Canonical origin + path of the site
    pub url: String,
    /// `;`-delimited role list
    pub perm_list: String,
    pub created_at: DateTime<Utc>,
}

impl SiteRow {
    pub fn new(
        name: impl Into<String>,
        user: impl Into<String>,
        url: impl Into<String>,
        perms: &[String],
    ) -> Self {
        Self {
            name: name.into(),
            user: user.into(),
            url: url.into(),
            perm_list: perms.join(ROLE_DELIMITER),
            created_at: Utc::now(),
        }
    }

    /// Split the stored role list.
    pub fn permissions(&self) -> Vec<String> {
        self.perm_list
            .split(ROLE_DELIMITER)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Render as a `name|url|roles` claim triple.
    pub fn claim(&self) -> String {
        format!(
            "{}{CLAIM_DELIMITER}{}{CLAIM_DELIMITER}{}",
            self.name, self.url, self.perm_list
        )
    }

    /// User-visible form.
    pub fn to_site(&self) -> Site {
        Site {
            name: self.name.clone(),
            url: self.url.clone(),
            perm: self.permissions(),
        }
    }
}

/// Site as shown to users and accepted from admins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Site {
    pub name: String,
    pub url: String,
    pub perm: Vec<String>,
}

/// How a login was initiated. Stored and shown as its discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoginType {
    /// Plain login through `/oidc/start`
    Direct = 0,
    /// Login on behalf of a site with an explicit redirect
    Flow = 1,
}

impl Serialize for LoginType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for LoginType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(LoginType::Direct),
            1 => Ok(LoginType::Flow),
            other => Err(de::Error::invalid_value(
                de::Unexpected::Unsigned(other.into()),
                &"0 (direct) or 1 (flow)",
            )),
        }
    }
}

/// Append-only login audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct LoginRow {
    /// Assigned on append; zero before.
    pub id: u64,
    pub user: String,
    pub created_at: DateTime<Utc>,
    /// 0 = direct, 1 = flow
    #[schema(value_type = u8)]
    pub login_type: LoginType,
}

impl LoginRow {
    pub fn new(user: impl Into<String>, login_type: LoginType) -> Self {
        Self {
            id: 0,
            user: user.into(),
            created_at: Utc::now(),
            login_type,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("nested unit of work is not supported")]
    NestedUnitOfWork,

    #[error("expected {expected} rows to be written, wrote {actual}")]
    RowCountMismatch { expected: usize, actual: usize },

    #[error("invalid site rows: {0}")]
    InvalidRows(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Work executed against a repository handle bound to one transaction.
pub type UnitOfWork<'a> = dyn FnMut(&dyn SiteRepository) -> RepositoryResult<()> + 'a;

/// Persistence contract for site grants and login audit rows.
pub trait SiteRepository {
    /// All rows whose user matches `email` case-insensitively, ordered by name.
    fn sites_for_user(&self, email: &str) -> RepositoryResult<Vec<SiteRow>>;

    /// Distinct users holding a grant on the site `name` (case-insensitive).
    fn users_for_site(&self, name: &str) -> RepositoryResult<Vec<String>>;

    /// Delete every row of `rows[0].user` and insert `rows`, atomically.
    fn replace_sites_for_user(&self, rows: &[SiteRow]) -> RepositoryResult<()>;

    /// Append a login row, returning its assigned id.
    fn append_login(&self, login: &LoginRow) -> RepositoryResult<u64>;

    /// Login rows of `email`, oldest first.
    fn logins_for_user(&self, email: &str) -> RepositoryResult<Vec<LoginRow>>;

    /// Run `work` against a handle sharing a single transaction. The
    /// transaction commits only if `work` succeeds.
    fn in_unit_of_work(&self, work: &mut UnitOfWork<'_>) -> RepositoryResult<()>;

    /// Probe the underlying store.
    fn health_check(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

/// Check that `rows` is non-empty and belongs to a single user; returns the
/// lowercased user.
pub(crate) fn rows_owner(rows: &[SiteRow]) -> RepositoryResult<String> {
    let first = rows
        .first()
        .ok_or_else(|| RepositoryError::InvalidRows("no rows given".to_string()))?;
    let owner = first.user.to_lowercase();
    if owner.is_empty() {
        return Err(RepositoryError::InvalidRows("empty user".to_string()));
    }
    if let Some(other) = rows.iter().find(|r| r.user.to_lowercase() != owner) {
        return Err(RepositoryError::InvalidRows(format!(
            "rows mix users {owner} and {}",
            other.user
        )));
    }
    if rows.iter().any(|r| r.name.is_empty()) {
        return Err(RepositoryError::InvalidRows("empty site name".to_string()));
    }
    Ok(owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn claim_renders_triple() {
        let row = SiteRow::new("A", "userA@example.com", "http://A", &perms(&["read", "write"]));
        assert_eq!(row.claim(), "A|http://A|read;write");
    }

    #[test]
    fn to_site_splits_permissions() {
        let row = SiteRow::new("docs", "u@example.com", "https://docs.example.com", &perms(&["a", "b"]));
        let site = row.to_site();
        assert_eq!(site.name, "docs");
        assert_eq!(site.perm, vec!["a", "b"]);
    }

    #[test]
    fn empty_perm_list_has_no_permissions() {
        let row = SiteRow::new("A", "u@example.com", "http://A", &[]);
        assert!(row.permissions().is_empty());
    }

    #[test]
    fn rows_owner_rejects_mixed_users() {
        let rows = vec![
            SiteRow::new("A", "a@example.com", "http://A", &perms(&["x"])),
            SiteRow::new("B", "b@example.com", "http://B", &perms(&["x"])),
        ];
        assert!(matches!(rows_owner(&rows), Err(RepositoryError::InvalidRows(_))));
    }

    #[test]
    fn rows_owner_lowercases() {
        let rows = vec![
            SiteRow::new("A", "UserA@Example.com", "http://A", &perms(&["x"])),
            SiteRow::new("B", "usera@example.com", "http://B", &perms(&["x"])),
        ];
        assert_eq!(rows_owner(&rows).unwrap(), "usera@example.com");
    }

    #[test]
    fn rows_owner_rejects_empty() {
        assert!(matches!(rows_owner(&[]), Err(RepositoryError::InvalidRows(_))));
    }

    #[test]
    fn login_type_is_stored_as_its_discriminant() {
        let row = LoginRow::new("u@example.com", LoginType::Flow);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["login_type"], 1);
        assert_eq!(serde_json::to_value(LoginType::Direct).unwrap(), 0);

        let back: LoginRow = serde_json::from_value(json).unwrap();
        assert_eq!(back.login_type, LoginType::Flow);
        assert!(serde_json::from_value::<LoginType>(serde_json::json!(2)).is_err());
        assert!(serde_json::from_value::<LoginType>(serde_json::json!("flow")).is_err());
    }
}
