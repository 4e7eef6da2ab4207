//! Ban-list store
//!
//! This module holds the in-memory view of the ban lists currently in force:
//! an immutable snapshot of reason -> member-id sets, and a shared handle
//! whose replace operation is an atomic pointer swap. Readers grab the
//! snapshot that is current at their own dispatch instant and never observe
//! a half-replaced store.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serenity::all::UserId;

/// Policy label a member is banned under, derived from a ban-list file's
/// base name with the extension stripped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From)]
pub struct Reason(String);

impl Reason {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Reason {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Immutable view of every ban list at one instant.
#[derive(Debug, Clone)]
pub struct BanListSnapshot {
    lists: BTreeMap<Reason, HashSet<UserId>>,
    loaded_at: DateTime<Utc>,
}

impl Default for BanListSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl BanListSnapshot {
    #[must_use]
    pub fn new(lists: BTreeMap<Reason, HashSet<UserId>>) -> Self {
        Self {
            lists,
            loaded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    /// When this snapshot was built from the ban-list directory.
    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Whether `user_id` is on the list for `reason`.
    #[must_use]
    pub fn contains(&self, reason: &Reason, user_id: UserId) -> bool {
        self.lists
            .get(reason)
            .is_some_and(|members| members.contains(&user_id))
    }

    /// First list (in reason order) that names `user_id`, if any.
    #[must_use]
    pub fn first_match(&self, user_id: UserId) -> Option<&Reason> {
        self.lists
            .iter()
            .find(|(_, members)| members.contains(&user_id))
            .map(|(reason, _)| reason)
    }

    /// Iterate over every (reason, member set) pair.
    pub fn lists(&self) -> impl Iterator<Item = (&Reason, &HashSet<UserId>)> {
        self.lists.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Number of distinct reasons (list files).
    #[must_use]
    pub fn reason_count(&self) -> usize {
        self.lists.len()
    }

    /// Total member entries across all lists.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.lists.values().map(HashSet::len).sum()
    }
}

/// Shared handle to the ban lists currently being enforced.
///
/// Single writer, many readers: `replace` swaps the snapshot pointer under a
/// write lock held only for the swap itself, never across I/O. `current`
/// hands out the `Arc` of whichever snapshot is in force, safe to read for
/// the whole duration of an enforcement pass.
#[derive(Clone)]
pub struct BanListStore {
    inner: Arc<RwLock<Arc<BanListSnapshot>>>,
}

impl Default for BanListStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BanListStore {
    /// Create a store holding an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(BanListSnapshot::empty()))),
        }
    }

    /// The snapshot currently in force.
    #[must_use]
    pub fn current(&self) -> Arc<BanListSnapshot> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically replace the current snapshot, returning the one displaced.
    pub fn replace(&self, next: BanListSnapshot) -> Arc<BanListSnapshot> {
        let next = Arc::new(next);
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Point lookup against the current snapshot.
    #[must_use]
    pub fn lookup(&self, reason: &Reason, user_id: UserId) -> bool {
        self.current().contains(reason, user_id)
    }
}
