//! Wholesale-replace snapshot cells
//!
//! A [`SnapshotCell`] owns the latest known state of one domain. Updates
//! are wholesale: a poll either produces a complete new snapshot or leaves
//! the old one standing. Readers receive cheap `Arc` clones and must never
//! mutate a snapshot in place; the atomic swap is what makes diffing
//! against the previous snapshot safe without locks around the data.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// An immutable collection captured at one poll instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    pub taken_at: DateTime<Utc>,
}

impl<T> Snapshot<T> {
    pub fn new(items: Vec<T>, taken_at: DateTime<Utc>) -> Self {
        Self { items, taken_at }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

#[derive(Debug)]
struct CellState<T> {
    current: Option<Arc<Snapshot<T>>>,
    previous: Option<Arc<Snapshot<T>>>,
}

/// Holder for the current and previous snapshot of one domain.
///
/// Starts empty: `current()` is `None` until the first successful poll,
/// which is what lets the change detector distinguish "process start"
/// from "empty result set".
///
/// ## Example
///
/// ```
/// use gridwatch_cache::SnapshotCell;
/// use chrono::Utc;
///
/// let cell: SnapshotCell<u32> = SnapshotCell::new();
/// assert!(cell.current().is_none());
///
/// cell.replace(vec![1, 2], Utc::now());
/// let old = cell.replace(vec![1, 2, 3], Utc::now());
///
/// assert_eq!(cell.current().unwrap().len(), 3);
/// assert_eq!(old.unwrap().len(), 2);
/// ```
#[derive(Debug)]
pub struct SnapshotCell<T> {
    state: RwLock<CellState<T>>,
}

impl<T> SnapshotCell<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CellState {
                current: None,
                previous: None,
            }),
        }
    }

    /// Atomically install a new snapshot.
    ///
    /// The snapshot being displaced becomes `previous()` and is also
    /// returned, so the caller can diff without a second lock.
    pub fn replace(&self, items: Vec<T>, taken_at: DateTime<Utc>) -> Option<Arc<Snapshot<T>>> {
        let snapshot = Arc::new(Snapshot::new(items, taken_at));
        let mut state = self.state.write();
        let displaced = state.current.take();
        state.previous = displaced.clone();
        state.current = Some(snapshot);
        displaced
    }

    /// Latest snapshot, `None` before the first successful poll.
    pub fn current(&self) -> Option<Arc<Snapshot<T>>> {
        self.state.read().current.clone()
    }

    /// The snapshot displaced by the most recent [`replace`](Self::replace).
    pub fn previous(&self) -> Option<Arc<Snapshot<T>>> {
        self.state.read().previous.clone()
    }

    /// Item count of the current snapshot, 0 when empty or unset.
    pub fn len(&self) -> usize {
        self.state.read().current.as_ref().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capture time of the current snapshot.
    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().current.as_ref().map(|s| s.taken_at)
    }
}

impl<T> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
