// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification cache.
//!
//! Memoizes `raw token -> User` for a fixed TTL so repeated requests with the
//! same token skip signature verification and claim evaluation. Entries are
//! evicted lazily on read once their expiry instant has passed; there is no
//! background reaper.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lru::LruCache;

use super::user::User;
use crate::clock::SharedClock;

/// TTL used when no duration is configured.
pub const DEFAULT_CACHE_DURATION: &str = "10m";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("invalid cache duration {literal:?}: {source}")]
    InvalidDuration {
        literal: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("cache duration {0:?} is out of range")]
    OutOfRange(String),
}

struct CacheEntry {
    user: User,
    expires_at: DateTime<Utc>,
}

/// Mutex-guarded token cache.
pub struct VerificationCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: chrono::Duration,
    clock: SharedClock,
}

impl VerificationCache {
    pub fn new(ttl: std::time::Duration, clock: SharedClock) -> Result<Self, CacheError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| CacheError::OutOfRange(format!("{ttl:?}")))?;
        Ok(Self {
            entries: Mutex::new(LruCache::unbounded()),
            ttl,
            clock,
        })
    }

    /// Build from a duration literal such as `"10m"` or `"90s"`.
    ///
    /// `None` uses [`DEFAULT_CACHE_DURATION`].
    pub fn from_literal(literal: Option<&str>, clock: SharedClock) -> Result<Self, CacheError> {
        let literal = literal.unwrap_or(DEFAULT_CACHE_DURATION);
        let ttl = humantime::parse_duration(literal).map_err(|source| {
            CacheError::InvalidDuration {
                literal: literal.to_string(),
                source,
            }
        })?;
        Self::new(ttl, clock)
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Look up a token. Expired entries are removed and reported as a miss.
    pub fn get(&self, raw_token: &str) -> Option<User> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().ok()?;

        let expired = match entries.get(raw_token) {
            Some(entry) if now < entry.expires_at => return Some(entry.user.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(raw_token);
        }
        None
    }

    pub fn set(&self, raw_token: &str, user: User) {
        let expires_at = self.clock.now() + self.ttl;
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(raw_token.to_string(), CacheEntry { user, expires_at });
        }
    }

    /// Drop a token, e.g. on logout.
    pub fn remove(&self, raw_token: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.pop(raw_token);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
