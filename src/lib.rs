//! Integer-scored sorted set ("ZSet").
//!
//! A single-threaded container keeping every member exactly once, ordered by
//! `(score, member)` under caller-supplied orderings:
//! - `ZSet`: hash index (member -> score) paired with a rank-aware skip list
//! - `SkipList`: the ordered index, with span bookkeeping for O(log n) ranks
//! - `ScoreHandler` / `MemberComparator`: the two ordering seams
//! - `ScoreRange`: score intervals with per-bound exclusivity
//! - `ScanCursor`: fail-fast forward cursor with element removal
//! - `dst`: deterministic simulation testing harness

// Clippy configuration: allow some stylistic lints to focus on correctness
#![allow(clippy::collapsible_if)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::new_without_default)]

mod error;
mod member;
mod range;
mod score;
mod skiplist;
mod zset;

pub mod dst;

pub use error::ZSetError;
pub use member::{MemberComparator, NaturalOrder, OrderBy};
pub use range::ScoreRange;
pub use score::{AscendingScores, DescendingScores, ScoreHandler, WrappingScores};
pub use skiplist::SkipList;
pub use zset::{Entry, ScanCursor, ZSet};

/// Sorted set of `String` members under the default orderings.
pub type StringZSet = ZSet<String>;
/// Sorted set of `i64` members under the default orderings.
pub type I64ZSet = ZSet<i64>;
/// Sorted set of `i32` members under the default orderings.
pub type I32ZSet = ZSet<i32>;
