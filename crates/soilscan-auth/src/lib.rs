#![warn(missing_docs)]
//! # soilscan-auth
//!
//! ## Purpose
//! Derives the visitor's identity from persisted state and enforces the
//! anonymous analysis ceiling.
//!
//! ## Responsibilities
//! - Read [`Session`] from the two persisted credential fields.
//! - Record and clear credentials on behalf of the external login flow.
//! - Track guest analyses against [`GUEST_SCAN_LIMIT`].
//!
//! ## Data flow
//! Login flow (external) -> [`sign_in`] -> store. Before every submission the
//! orchestrator calls [`current_session`] and [`QuotaTracker::remaining_allowed`];
//! after a successful anonymous analysis it calls
//! [`QuotaTracker::record_anonymous_use`].
//!
//! ## Ownership and lifetimes
//! [`Session`] owns copies of the stored strings so it stays valid after the
//! store is mutated (for example when a 401 invalidates the credential).
//!
//! ## Error model
//! Reading never fails: absent or sentinel values yield [`Session::Guest`].
//! Writes propagate [`StoreError`] through [`AuthError`].
//!
//! ## Security and privacy notes
//! Token values are never logged and are redacted from `Debug` output.
//!
//! ## Example
//! ```rust
//! use soilscan_auth::{Session, current_session};
//! use soilscan_store::{MemoryStore, keys};
//!
//! let store = MemoryStore::with_entries([(keys::TOKEN, "null"), (keys::USERNAME, "ana")]);
//! assert_eq!(current_session(&store), Session::Guest);
//! ```

use std::fmt;
use std::sync::Arc;

use soilscan_store::{KeyValueStore, StoreError, keys};
use thiserror::Error;

/// Maximum number of analyses a guest may run.
pub const GUEST_SCAN_LIMIT: u32 = 5;

/// Values the browser-era login flow wrote in place of "no value".
const SENTINELS: [&str; 3] = ["", "null", "undefined"];

/// Visitor identity derived from persisted state.
#[derive(Clone, PartialEq, Eq)]
pub enum Session {
    /// No usable credential.
    Guest,
    /// Both credential fields are present and usable.
    Authenticated {
        /// Account username.
        username: String,
        /// Bearer token presented to the analysis service.
        token: String,
    },
}

impl Session {
    /// Returns `true` for [`Session::Authenticated`].
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    /// Returns the bearer token, if any.
    pub fn token(&self) -> Option<&str> {
        match self {
            Session::Authenticated { token, .. } => Some(token),
            Session::Guest => None,
        }
    }

    /// Returns the username, if any.
    pub fn username(&self) -> Option<&str> {
        match self {
            Session::Authenticated { username, .. } => Some(username),
            Session::Guest => None,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Guest => f.write_str("Guest"),
            Session::Authenticated { username, .. } => f
                .debug_struct("Authenticated")
                .field("username", username)
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Derives the current session from the persisted credential fields.
///
/// Both fields must be present and not one of `""`, `"null"` or `"undefined"`;
/// otherwise the visitor is a guest.
pub fn current_session(store: &dyn KeyValueStore) -> Session {
    match (
        usable(store.get(keys::USERNAME)),
        usable(store.get(keys::TOKEN)),
    ) {
        (Some(username), Some(token)) => Session::Authenticated { username, token },
        _ => Session::Guest,
    }
}

fn usable(value: Option<String>) -> Option<String> {
    value.filter(|raw| !is_sentinel(raw))
}

fn is_sentinel(raw: &str) -> bool {
    SENTINELS.contains(&raw.trim())
}

/// Persists a credential obtained from the external login flow.
///
/// # Errors
/// Returns [`AuthError::BlankCredential`] when either value would read back as
/// absent, and [`AuthError::Store`] when the write fails.
pub fn sign_in(store: &dyn KeyValueStore, username: &str, token: &str) -> Result<Session, AuthError> {
    if is_sentinel(username) || is_sentinel(token) {
        return Err(AuthError::BlankCredential);
    }

    store.set(keys::USERNAME, username.trim())?;
    store.set(keys::TOKEN, token.trim())?;
    tracing::info!(username = username.trim(), "credential recorded");
    Ok(current_session(store))
}

/// Removes both credential fields, demoting every later read to guest.
///
/// # Errors
/// Returns [`AuthError::Store`] when the store cannot persist the removal.
pub fn invalidate_session(store: &dyn KeyValueStore) -> Result<(), AuthError> {
    store.remove(keys::TOKEN)?;
    store.remove(keys::USERNAME)?;
    Ok(())
}

/// Explicit logout. Same effect as [`invalidate_session`].
///
/// # Errors
/// Returns [`AuthError::Store`] when the store cannot persist the removal.
pub fn sign_out(store: &dyn KeyValueStore) -> Result<(), AuthError> {
    invalidate_session(store)?;
    tracing::info!("signed out");
    Ok(())
}

/// Guest analysis counter with a fixed ceiling.
#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn KeyValueStore>,
}

impl QuotaTracker {
    /// Creates a tracker over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the number of anonymous analyses already performed.
    ///
    /// Only the leading run of digits counts (`"5.0"` and `"5abc"` read as 5);
    /// values without one read as zero. Oversized values saturate.
    pub fn used(&self) -> u32 {
        self.store
            .get(keys::GUEST_SCANS)
            .map(|raw| leading_count(&raw))
            .unwrap_or(0)
    }

    /// Returns guest analyses left, or `None` when `session` is unlimited.
    pub fn remaining(&self, session: &Session) -> Option<u32> {
        match session {
            Session::Authenticated { .. } => None,
            Session::Guest => Some(GUEST_SCAN_LIMIT.saturating_sub(self.used())),
        }
    }

    /// Returns `true` when `session` may submit another analysis.
    pub fn remaining_allowed(&self, session: &Session) -> bool {
        match session {
            Session::Authenticated { .. } => true,
            Session::Guest => self.used() < GUEST_SCAN_LIMIT,
        }
    }

    /// Records one successful anonymous analysis.
    ///
    /// # Errors
    /// Returns [`AuthError::Store`] when the counter cannot be persisted.
    pub fn record_anonymous_use(&self) -> Result<u32, AuthError> {
        let next = self.used().saturating_add(1);
        self.store.set(keys::GUEST_SCANS, &next.to_string())?;
        tracing::debug!(used = next, limit = GUEST_SCAN_LIMIT, "guest analysis recorded");
        Ok(next)
    }
}

fn leading_count(raw: &str) -> u32 {
    let trimmed = raw.trim_start();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    digits
        .chars()
        .map_while(|ch| ch.to_digit(10))
        .fold(0_u32, |count, digit| {
            count.saturating_mul(10).saturating_add(digit)
        })
}

/// Errors produced by credential and quota writes.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or token is blank or a sentinel value.
    #[error("username and token must be non-empty")]
    BlankCredential,
    /// Backing store failure.
    #[error("session store failure: {0}")]
    Store(#[from] StoreError),
}
