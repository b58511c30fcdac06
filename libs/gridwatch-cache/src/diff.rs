//! Identity-keyed change detection between snapshots

use std::collections::HashSet;
use std::hash::Hash;

use crate::snapshot::Snapshot;

/// Items of `current` whose key does not appear in `previous`.
///
/// Set semantics: ordering of `previous` is irrelevant, the result keeps
/// `current`'s relative order. Keys are assumed unique within a snapshot.
///
/// When `previous` is `None` the process has just started and nothing has
/// been observed yet; the answer is an empty set, not "everything is new".
/// Treating the first snapshot as all-new would fire a notification for
/// every pre-existing alarm on every restart.
///
/// ## Example
///
/// ```
/// use gridwatch_cache::{diff, Snapshot};
/// use chrono::Utc;
///
/// let prev = Snapshot::new(vec![1, 2], Utc::now());
/// let curr = Snapshot::new(vec![2, 3, 4], Utc::now());
///
/// let fresh = diff::new_by_key(Some(&prev), &curr, |n| *n);
/// assert_eq!(fresh, vec![3, 4]);
/// ```
pub fn new_by_key<T, K, F>(previous: Option<&Snapshot<T>>, current: &Snapshot<T>, key_of: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let Some(previous) = previous else {
        return Vec::new();
    };

    let known: HashSet<K> = previous.iter().map(&key_of).collect();
    current
        .iter()
        .filter(|item| !known.contains(&key_of(item)))
        .cloned()
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
