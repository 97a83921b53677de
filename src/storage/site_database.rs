// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded site database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `usersite`: composite key (`lowercase user` NUL `site name`) → serialized SiteRow
//! - `logins`: auto-increment id → serialized LoginRow
//!
//! The user-first key keeps every grant of a user in one contiguous range,
//! which serves both the per-user lookup and the replace-all mutation.

use std::collections::BTreeSet;
use std::path::Path;

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};

use super::sites::{
    rows_owner, LoginRow, RepositoryError, RepositoryResult, SiteRepository, SiteRow, UnitOfWork,
};

// =============================================================================
// Table Definitions
// =============================================================================

/// Grants: `user\0name` → SiteRow (JSON bytes).
const USERSITE: TableDefinition<&str, &[u8]> = TableDefinition::new("usersite");

/// Login audit: id → LoginRow (JSON bytes).
const LOGINS: TableDefinition<u64, &[u8]> = TableDefinition::new("logins");

const KEY_SEPARATOR: char = '\u{0}';
const RANGE_END: char = '\u{1}';

// =============================================================================
// Key Helpers
// =============================================================================

fn site_key(user: &str, name: &str) -> String {
    format!("{}{KEY_SEPARATOR}{name}", user.to_lowercase())
}

/// Half-open key range covering every grant of `user`.
fn user_range(user: &str) -> (String, String) {
    let user = user.to_lowercase();
    (
        format!("{user}{KEY_SEPARATOR}"),
        format!("{user}{RANGE_END}"),
    )
}

// =============================================================================
// Table operations (shared by plain calls and units of work)
// =============================================================================

fn read_sites<T>(table: &T, email: &str) -> RepositoryResult<Vec<SiteRow>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let (start, end) = user_range(email);
    let mut rows = Vec::new();
    for entry in table.range(start.as_str()..end.as_str())? {
        let (_, value) = entry?;
        rows.push(serde_json::from_slice::<SiteRow>(value.value())?);
    }
    Ok(rows)
}

fn read_site_users<T>(table: &T, name: &str) -> RepositoryResult<Vec<String>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let wanted = name.to_lowercase();
    let mut users = BTreeSet::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        let row: SiteRow = serde_json::from_slice(value.value())?;
        if row.name.to_lowercase() == wanted {
            users.insert(row.user.to_lowercase());
        }
    }
    Ok(users.into_iter().collect())
}

fn read_logins<T>(table: &T, email: &str) -> RepositoryResult<Vec<LoginRow>>
where
    T: ReadableTable<u64, &'static [u8]>,
{
    let wanted = email.to_lowercase();
    let mut logins = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        let row: LoginRow = serde_json::from_slice(value.value())?;
        if row.user.to_lowercase() == wanted {
            logins.push(row);
        }
    }
    Ok(logins)
}

fn replace_rows(txn: &WriteTransaction, rows: &[SiteRow]) -> RepositoryResult<()> {
    let owner = rows_owner(rows)?;
    let mut table = txn.open_table(USERSITE)?;

    // Collect first: the range borrows the table.
    let stale: Vec<String> = {
        let (start, end) = user_range(&owner);
        let mut keys = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (key, _) = entry?;
            keys.push(key.value().to_string());
        }
        keys
    };
    for key in &stale {
        table.remove(key.as_str())?;
    }

    let mut written = 0;
    for row in rows {
        let json = serde_json::to_vec(row)?;
        let key = site_key(&row.user, &row.name);
        if table.insert(key.as_str(), json.as_slice())?.is_none() {
            written += 1;
        }
    }

    if written != rows.len() {
        return Err(RepositoryError::RowCountMismatch {
            expected: rows.len(),
            actual: written,
        });
    }

    tracing::debug!(user = %owner, removed = stale.len(), inserted = written, "Replaced site rows");
    Ok(())
}

fn insert_login(txn: &WriteTransaction, login: &LoginRow) -> RepositoryResult<u64> {
    let mut table = txn.open_table(LOGINS)?;
    let id = match table.last()? {
        Some((key, _)) => key.value() + 1,
        None => 1,
    };

    let mut row = login.clone();
    row.id = id;
    let json = serde_json::to_vec(&row)?;
    table.insert(id, json.as_slice())?;
    Ok(id)
}

// =============================================================================
// SiteDatabase
// =============================================================================

/// redb-backed [`SiteRepository`].
pub struct SiteDatabase {
    db: Database,
}

impl SiteDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> RepositoryResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERSITE)?;
            let _ = write_txn.open_table(LOGINS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Run `f` in a write transaction, committing only on success.
    fn write<T>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        let write_txn = self.db.begin_write()?;
        // Dropping an uncommitted transaction aborts it.
        let value = f(&write_txn)?;
        write_txn.commit()?;
        Ok(value)
    }
}

impl SiteRepository for SiteDatabase {
    fn sites_for_user(&self, email: &str) -> RepositoryResult<Vec<SiteRow>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERSITE)?;
        read_sites(&table, email)
    }

    fn users_for_site(&self, name: &str) -> RepositoryResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERSITE)?;
        read_site_users(&table, name)
    }

    fn replace_sites_for_user(&self, rows: &[SiteRow]) -> RepositoryResult<()> {
        self.write(|txn| replace_rows(txn, rows))
    }

    fn append_login(&self, login: &LoginRow) -> RepositoryResult<u64> {
        self.write(|txn| insert_login(txn, login))
    }

    fn logins_for_user(&self, email: &str) -> RepositoryResult<Vec<LoginRow>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LOGINS)?;
        read_logins(&table, email)
    }

    fn in_unit_of_work(&self, work: &mut UnitOfWork<'_>) -> RepositoryResult<()> {
        self.write(|txn| {
            let scope = TransactionScope { txn };
            work(&scope)
        })
    }

    fn health_check(&self) -> RepositoryResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERSITE)?;
        let _ = read_txn.open_table(LOGINS)?;
        Ok(())
    }
}

/// Repository handle bound to an open write transaction.
///
/// Reads observe the transaction's own uncommitted writes.
struct TransactionScope<'t> {
    txn: &'t WriteTransaction,
}

impl SiteRepository for TransactionScope<'_> {
    fn sites_for_user(&self, email: &str) -> RepositoryResult<Vec<SiteRow>> {
        let table = self.txn.open_table(USERSITE)?;
        read_sites(&table, email)
    }

    fn users_for_site(&self, name: &str) -> RepositoryResult<Vec<String>> {
        let table = self.txn.open_table(USERSITE)?;
        read_site_users(&table, name)
    }

    fn replace_sites_for_user(&self, rows: &[SiteRow]) -> RepositoryResult<()> {
        replace_rows(self.txn, rows)
    }

    fn append_login(&self, login: &LoginRow) -> RepositoryResult<u64> {
        insert_login(self.txn, login)
    }

    fn logins_for_user(&self, email: &str) -> RepositoryResult<Vec<LoginRow>> {
        let table = self.txn.open_table(LOGINS)?;
        read_logins(&table, email)
    }

    fn in_unit_of_work(&self, _work: &mut UnitOfWork<'_>) -> RepositoryResult<()> {
        Err(RepositoryError::NestedUnitOfWork)
    }
}
