// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Site Storage Module
//!
//! Persistence for site grants (`usersite`) and the login audit trail
//! (`logins`). Consumers depend on the [`SiteRepository`] contract; the
//! production implementation is the redb-backed [`SiteDatabase`] stored
//! under `DATA_DIR`.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   sites.redb    # usersite + logins tables
//! ```

pub mod site_database;
pub mod sites;

use std::sync::Arc;

pub use site_database::SiteDatabase;
pub use sites::{
    LoginRow, LoginType, RepositoryError, RepositoryResult, Site, SiteRepository, SiteRow,
    UnitOfWork,
};

/// File name of the site database inside the data directory.
pub const DATABASE_FILE: &str = "sites.redb";

/// Repository handle shared across request workers.
pub type SharedSiteRepository = Arc<dyn SiteRepository + Send + Sync>;
