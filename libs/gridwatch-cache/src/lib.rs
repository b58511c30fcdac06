//! GridWatch Cache Primitives
//!
//! The three memory structures the sync service is built on:
//!
//! - `snapshot`: wholesale-replace cells holding the latest immutable
//!   snapshot of one domain, with the prior one kept for diffing
//! - `diff`: identity-keyed new-item detection between two snapshots
//! - `ttl`: a keyed cache of derived values with lazy expiry and
//!   explicit invalidation
//!
//! Everything here is synchronous and lock-cheap; async orchestration
//! lives in the service crate.

pub mod diff;
pub mod snapshot;
pub mod ttl;

pub use snapshot::{Snapshot, SnapshotCell};
pub use ttl::{CacheEntry, CacheStats, TtlCache};
