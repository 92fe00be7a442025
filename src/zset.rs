//! Sorted set: hash index + skip list, kept in lockstep.
//!
//! Every mutation classifies the request against the hash index first
//! (create vs update vs no-op), then mirrors the change into the skip
//! list, so the two indexes always agree between public calls. Reads that
//! need a score go to the hash index; reads that need a rank or a range go
//! to the skip list.

use crate::error::ZSetError;
use crate::member::{MemberComparator, NaturalOrder};
use crate::range::{clamp_rank, clamp_rank_range, Normalized, ScoreRange};
use crate::score::{AscendingScores, DescendingScores, ScoreHandler};
use crate::skiplist::SkipList;
use ahash::AHashMap;
use std::cmp::Ordering;
use std::hash::Hash;
use tracing::trace;

/// A (member, score) pair returned from queries and cursors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry<K> {
    pub member: K,
    pub score: i64,
}

/// Sorted set with integer scores.
///
/// Members are unique; each carries one score. Ordering over
/// (score, member) is delegated to a [`ScoreHandler`] and a
/// [`MemberComparator`], which must agree with the member type's
/// `Eq`/`Hash` on identity. Rank arguments are 0-based and may be
/// negative to count from the end.
///
/// Single-threaded: no operation blocks, and concurrent access is out of
/// scope by design.
#[derive(Clone, Debug)]
pub struct ZSet<K, S = AscendingScores, C = NaturalOrder> {
    /// Member -> score, O(1) existence and score lookup
    members: AHashMap<K, i64>,
    /// (score, member) order, rank and range queries
    list: SkipList<K, S, C>,
    scores: S,
    /// Bumped on every state-changing mutation; cursors snapshot it
    epoch: u64,
}

impl<K> ZSet<K>
where
    K: Hash + Eq + Clone + Ord,
{
    /// Natural score order, natural member order.
    pub fn new() -> Self {
        ZSet::with_ordering(AscendingScores, NaturalOrder)
    }
}

impl<K> ZSet<K, DescendingScores>
where
    K: Hash + Eq + Clone + Ord,
{
    /// Reversed score order, natural member order.
    pub fn descending() -> Self {
        ZSet::with_ordering(DescendingScores, NaturalOrder)
    }
}

impl<K, S, C> Default for ZSet<K, S, C>
where
    K: Hash + Eq + Clone,
    S: ScoreHandler + Default,
    C: MemberComparator<K> + Default,
{
    fn default() -> Self {
        ZSet::with_ordering(S::default(), C::default())
    }
}

impl<K, S, C> PartialEq for ZSet<K, S, C>
where
    K: Hash + Eq,
{
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl<K, S, C> ZSet<K, S, C>
where
    K: Hash + Eq + Clone,
    S: ScoreHandler,
    C: MemberComparator<K>,
{
    /// Caller-supplied orderings.
    pub fn with_ordering(scores: S, members: C) -> Self {
        ZSet {
            members: AHashMap::new(),
            list: SkipList::new(scores.clone(), members),
            scores,
            epoch: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add a member, or move it to a new score if already present. A
    /// handler-equal score is a no-op.
    pub fn add(&mut self, score: i64, member: K) {
        use std::collections::hash_map::Entry;
        match self.members.entry(member) {
            Entry::Occupied(mut entry) => {
                let old_score = *entry.get();
                if self.scores.compare(old_score, score) == Ordering::Equal {
                    return;
                }
                entry.insert(score);
                // Reposition: delete at the old score, insert at the new
                let member = entry.key().clone();
                self.list.delete(old_score, &member);
                self.list.insert(member, score);
                self.epoch += 1;
            }
            Entry::Vacant(entry) => {
                let member = entry.key().clone();
                entry.insert(score);
                self.list.insert(member, score);
                self.epoch += 1;
            }
        }
        debug_assert_eq!(self.members.len(), self.list.len());
    }

    /// Add only if the member is absent. Returns whether it was inserted.
    pub fn add_if_absent(&mut self, score: i64, member: K) -> bool {
        use std::collections::hash_map::Entry;
        match self.members.entry(member) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                let member = entry.key().clone();
                entry.insert(score);
                self.list.insert(member, score);
                self.epoch += 1;
                true
            }
        }
    }

    /// Add `delta` to the member's score through the handler's `sum`; an
    /// absent member starts at the delta itself. Returns the resulting
    /// score.
    pub fn incr_by(&mut self, delta: i64, member: K) -> i64 {
        let new_score = match self.members.get(&member) {
            Some(&old_score) => self.scores.sum(old_score, delta),
            None => delta,
        };
        self.add(new_score, member);
        new_score
    }

    /// Remove a member. Returns its prior score.
    pub fn remove(&mut self, member: &K) -> Option<i64> {
        let score = self.members.remove(member)?;
        let removed = self.list.delete(score, member);
        debug_assert!(removed, "hash index and ordered index out of sync");
        self.epoch += 1;
        Some(score)
    }

    /// Score of a member. O(1)
    pub fn score(&self, member: &K) -> Option<i64> {
        self.members.get(member).copied()
    }

    /// 0-based rank of a member in list order. O(log n)
    pub fn rank(&self, member: &K) -> Option<usize> {
        let score = *self.members.get(member)?;
        self.list.rank(score, member)
    }

    /// 0-based rank counted from the end of the list.
    pub fn rev_rank(&self, member: &K) -> Option<usize> {
        self.rank(member).map(|r| self.len() - 1 - r)
    }

    /// Entry at a 0-based rank; negative counts from the end.
    pub fn entry_by_rank(&self, rank: isize) -> Option<Entry<K>> {
        let rank = clamp_rank(rank, self.len())?;
        self.list.get_by_rank(rank).map(|(member, score)| Entry {
            member: member.clone(),
            score,
        })
    }

    /// Entry at a 0-based rank from the end; negative counts from the
    /// front.
    pub fn rev_entry_by_rank(&self, rank: isize) -> Option<Entry<K>> {
        let rank = clamp_rank(rank, self.len())?;
        self.entry_by_rank((self.len() - 1 - rank) as isize)
    }

    /// Entries at 0-based ranks `[start, end]`, inclusive; negative ranks
    /// count from the end. O(log n + k)
    pub fn range_by_rank(&self, start: isize, end: isize) -> Vec<Entry<K>> {
        let (start, end) = match clamp_rank_range(start, end, self.len()) {
            Some(window) => window,
            None => return Vec::new(),
        };

        let mut out = Vec::with_capacity(end - start + 1);
        let mut current = self.list.node_by_rank1(start + 1);
        for _ in start..=end {
            match current {
                Some(idx) => {
                    let (member, score) = self.list.entry_at(idx);
                    out.push(Entry {
                        member: member.clone(),
                        score,
                    });
                    current = self.list.next_idx(idx);
                }
                None => break,
            }
        }
        out
    }

    /// `range_by_rank` counted from the end, yielding entries in reverse
    /// list order.
    pub fn rev_range_by_rank(&self, start: isize, end: isize) -> Vec<Entry<K>> {
        let len = self.len();
        let (start, end) = match clamp_rank_range(start, end, len) {
            Some(window) => window,
            None => return Vec::new(),
        };

        let mut out =
            self.range_by_rank((len - 1 - end) as isize, (len - 1 - start) as isize);
        out.reverse();
        out
    }

    /// Entries with score inside `range`, in list order. O(log n + k)
    pub fn range_by_score(&self, range: ScoreRange) -> Vec<Entry<K>> {
        self.collect_by_score(&Normalized::new(range, &self.scores), 0, -1, false)
    }

    /// Entries with score inside `range`, in reverse list order.
    pub fn rev_range_by_score(&self, range: ScoreRange) -> Vec<Entry<K>> {
        self.collect_by_score(&Normalized::new(range, &self.scores), 0, -1, true)
    }

    /// Entries with score inside `range` after skipping `offset` of them,
    /// at most `limit` (negative means unlimited), in list order or
    /// reversed.
    pub fn range_by_score_with_options(
        &self,
        range: ScoreRange,
        offset: isize,
        limit: isize,
        reverse: bool,
    ) -> Result<Vec<Entry<K>>, ZSetError> {
        if offset < 0 {
            return Err(ZSetError::InvalidOffset(offset));
        }
        let normalized = Normalized::new(range, &self.scores);
        Ok(self.collect_by_score(&normalized, offset as usize, limit, reverse))
    }

    fn collect_by_score(
        &self,
        range: &Normalized,
        offset: usize,
        limit: isize,
        reverse: bool,
    ) -> Vec<Entry<K>> {
        let mut current = if reverse {
            self.list.last_in_range(range)
        } else {
            self.list.first_in_range(range)
        };

        let mut out = Vec::new();
        let mut to_skip = offset;
        while let Some(idx) = current {
            let (member, score) = self.list.entry_at(idx);
            let in_range = if reverse {
                range.gte_min(score, &self.scores)
            } else {
                range.lte_max(score, &self.scores)
            };
            if !in_range {
                break;
            }
            if to_skip > 0 {
                to_skip -= 1;
            } else {
                if limit >= 0 && out.len() == limit as usize {
                    break;
                }
                out.push(Entry {
                    member: member.clone(),
                    score,
                });
            }
            current = if reverse {
                self.list.prev_idx(idx)
            } else {
                self.list.next_idx(idx)
            };
        }
        out
    }

    /// Number of entries with score inside `range`. O(log n)
    pub fn count(&self, range: ScoreRange) -> usize {
        self.list
            .count_in_range(&Normalized::new(range, &self.scores))
    }

    /// Remove every entry with score inside `range`. Returns the count.
    pub fn remove_range_by_score(&mut self, range: ScoreRange) -> usize {
        let normalized = Normalized::new(range, &self.scores);
        let members = &mut self.members;
        let removed = self
            .list
            .delete_range_by_score(&normalized, |member, _| {
                members.remove(member);
            });
        if removed > 0 {
            self.epoch += 1;
            trace!(removed, "range delete by score");
        }
        removed
    }

    /// Remove the entry at a 0-based rank; negative counts from the end.
    pub fn remove_by_rank(&mut self, rank: isize) -> Option<Entry<K>> {
        let rank = clamp_rank(rank, self.len())?;
        let idx = self.list.node_by_rank1(rank + 1)?;
        let (member, score) = self.list.entry_at(idx);
        let entry = Entry {
            member: member.clone(),
            score,
        };
        self.members.remove(&entry.member);
        self.list.delete(entry.score, &entry.member);
        self.epoch += 1;
        Some(entry)
    }

    /// Remove the first entry in list order.
    pub fn pop_first(&mut self) -> Option<Entry<K>> {
        self.remove_by_rank(0)
    }

    /// Remove the last entry in list order.
    pub fn pop_last(&mut self) -> Option<Entry<K>> {
        self.remove_by_rank(-1)
    }

    /// Remove entries at 0-based ranks `[start, end]`, inclusive; negative
    /// ranks count from the end. Returns the count.
    pub fn remove_range_by_rank(&mut self, start: isize, end: isize) -> usize {
        let (start, end) = match clamp_rank_range(start, end, self.len()) {
            Some(window) => window,
            None => return 0,
        };

        let members = &mut self.members;
        let removed = self
            .list
            .delete_range_by_rank1(start + 1, end + 1, |member, _| {
                members.remove(member);
            });
        if removed > 0 {
            self.epoch += 1;
            trace!(removed, "range delete by rank");
        }
        removed
    }

    /// Trim to the first `n` entries in list order. Returns the count
    /// removed.
    pub fn limit(&mut self, n: usize) -> usize {
        let len = self.len();
        if len <= n {
            return 0;
        }
        self.remove_range_by_rank(n as isize, (len - 1) as isize)
    }

    /// Trim to the last `n` entries in list order. Returns the count
    /// removed.
    pub fn rev_limit(&mut self, n: usize) -> usize {
        let len = self.len();
        if len <= n {
            return 0;
        }
        self.remove_range_by_rank(0, (len - n - 1) as isize)
    }

    /// Iterate over entries in list order. The borrow forbids mutation for
    /// the iterator's lifetime; use [`ZSet::scan`] to interleave removal.
    pub fn iter(&self) -> impl Iterator<Item = (&K, i64)> {
        self.list.iter()
    }

    /// Forward cursor over all entries starting at a 0-based offset.
    ///
    /// The cursor is detached: it borrows nothing and is handed the set on
    /// every call. It snapshots the modification epoch; any mutation not
    /// performed through [`ScanCursor::remove`] makes subsequent cursor
    /// calls fail with [`ZSetError::ConcurrentModification`]. A cursor is
    /// only meaningful against the set that created it.
    pub fn scan(&self, offset: usize) -> ScanCursor {
        let next = if offset < self.len() {
            self.list.node_by_rank1(offset + 1)
        } else {
            None
        };
        ScanCursor {
            next,
            last: None,
            epoch: self.epoch,
        }
    }

    /// Cross-index sanity check: structural validity of the skip list plus
    /// index coupling (same members, same scores). O(n log n); meant for
    /// tests and the DST harness.
    pub fn validate(&self) -> Result<(), String> {
        self.list.validate()?;

        if self.members.len() != self.list.len() {
            return Err(format!(
                "index length mismatch: hash {}, list {}",
                self.members.len(),
                self.list.len()
            ));
        }
        for (member, score) in self.list.iter() {
            match self.members.get(member) {
                Some(&indexed) if self.scores.compare(indexed, score) == Ordering::Equal => {}
                Some(&indexed) => {
                    return Err(format!(
                        "score mismatch between indexes: list {}, hash {}",
                        score, indexed
                    ));
                }
                None => return Err("list entry missing from hash index".to_string()),
            }
        }
        Ok(())
    }
}

/// Detached fail-fast cursor created by [`ZSet::scan`].
///
/// Holds an arena handle into the ordered index plus an epoch snapshot;
/// owns no borrow of the set, so the set can be mutated between calls and
/// the cursor will detect it.
#[derive(Clone, Debug)]
pub struct ScanCursor {
    next: Option<usize>,
    last: Option<usize>,
    epoch: u64,
}

impl ScanCursor {
    /// Whether `next` would yield another entry, as of the cursor's last
    /// observation of the set.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    fn check_epoch<K, S, C>(&self, set: &ZSet<K, S, C>) -> Result<(), ZSetError> {
        if self.epoch != set.epoch {
            return Err(ZSetError::ConcurrentModification {
                expected: self.epoch,
                actual: set.epoch,
            });
        }
        Ok(())
    }

    /// Yield the next entry in list order.
    pub fn next<K, S, C>(&mut self, set: &ZSet<K, S, C>) -> Result<Entry<K>, ZSetError>
    where
        K: Hash + Eq + Clone,
        S: ScoreHandler,
        C: MemberComparator<K>,
    {
        self.check_epoch(set)?;
        let idx = self.next.ok_or(ZSetError::IteratorExhausted)?;
        let (member, score) = set.list.entry_at(idx);
        let entry = Entry {
            member: member.clone(),
            score,
        };
        self.last = Some(idx);
        self.next = set.list.next_idx(idx);
        Ok(entry)
    }

    /// Remove the entry last yielded by `next`. Keeps this cursor valid;
    /// fails if `next` has not been called since the last removal.
    pub fn remove<K, S, C>(&mut self, set: &mut ZSet<K, S, C>) -> Result<(), ZSetError>
    where
        K: Hash + Eq + Clone,
        S: ScoreHandler,
        C: MemberComparator<K>,
    {
        self.check_epoch(set)?;
        let idx = self.last.take().ok_or(ZSetError::RemoveWithoutNext)?;
        let member = set.list.entry_at(idx).0.clone();
        set.remove(&member);
        self.epoch = set.epoch;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_set() -> ZSet<String> {
        let mut zset = ZSet::new();
        zset.add(100, "alice".to_string());
        zset.add(200, "bob".to_string());
        zset.add(150, "charlie".to_string());
        zset.add(50, "dave".to_string());
        zset
    }

    fn member_order(zset: &ZSet<String>) -> Vec<String> {
        zset.iter().map(|(m, _)| m.clone()).collect()
    }

    #[test]
    fn ordering_by_score() {
        let zset = create_test_set();
        assert_eq!(member_order(&zset), vec!["dave", "alice", "charlie", "bob"]);
        zset.validate().unwrap();
    }

    #[test]
    fn add_updates_existing_member() {
        let mut zset = create_test_set();
        zset.add(1, "bob".to_string());
        assert_eq!(zset.len(), 4);
        assert_eq!(zset.score(&"bob".to_string()), Some(1));
        assert_eq!(member_order(&zset), vec!["bob", "dave", "alice", "charlie"]);
        zset.validate().unwrap();
    }

    #[test]
    fn add_same_score_is_noop() {
        let mut zset = create_test_set();
        let epoch_before = zset.epoch;
        zset.add(100, "alice".to_string());
        assert_eq!(zset.epoch, epoch_before);
        assert_eq!(zset.len(), 4);
    }

    #[test]
    fn add_if_absent_respects_existing() {
        let mut zset = create_test_set();
        assert!(!zset.add_if_absent(999, "alice".to_string()));
        assert_eq!(zset.score(&"alice".to_string()), Some(100));
        assert!(zset.add_if_absent(999, "eve".to_string()));
        assert_eq!(zset.len(), 5);
    }

    #[test]
    fn remove_returns_prior_score() {
        let mut zset = create_test_set();
        assert_eq!(zset.remove(&"charlie".to_string()), Some(150));
        assert_eq!(zset.remove(&"charlie".to_string()), None);
        assert_eq!(zset.len(), 3);
        zset.validate().unwrap();
    }

    #[test]
    fn rank_and_rev_rank() {
        let zset = create_test_set();
        assert_eq!(zset.rank(&"dave".to_string()), Some(0));
        assert_eq!(zset.rank(&"bob".to_string()), Some(3));
        assert_eq!(zset.rev_rank(&"bob".to_string()), Some(0));
        assert_eq!(zset.rev_rank(&"dave".to_string()), Some(3));
        assert_eq!(zset.rank(&"nobody".to_string()), None);
        assert_eq!(zset.rev_rank(&"nobody".to_string()), None);
    }

    #[test]
    fn entry_by_rank_negative_indices() {
        let zset = create_test_set();
        assert_eq!(zset.entry_by_rank(0).unwrap().member, "dave");
        assert_eq!(zset.entry_by_rank(-1).unwrap().member, "bob");
        assert_eq!(zset.rev_entry_by_rank(0).unwrap().member, "bob");
        assert_eq!(zset.rev_entry_by_rank(-1).unwrap().member, "dave");
        assert_eq!(zset.entry_by_rank(4), None);
        assert_eq!(zset.entry_by_rank(-5), None);
    }

    #[test]
    fn range_by_rank_windows() {
        let zset = create_test_set();
        let all: Vec<String> = zset
            .range_by_rank(0, -1)
            .into_iter()
            .map(|e| e.member)
            .collect();
        assert_eq!(all, vec!["dave", "alice", "charlie", "bob"]);

        let tail: Vec<String> = zset
            .range_by_rank(-2, -1)
            .into_iter()
            .map(|e| e.member)
            .collect();
        assert_eq!(tail, vec!["charlie", "bob"]);

        let rev: Vec<String> = zset
            .rev_range_by_rank(0, 1)
            .into_iter()
            .map(|e| e.member)
            .collect();
        assert_eq!(rev, vec!["bob", "charlie"]);

        assert!(zset.range_by_rank(3, 1).is_empty());
        assert!(zset.range_by_rank(10, 20).is_empty());
    }

    #[test]
    fn pop_both_ends() {
        let mut zset = create_test_set();
        assert_eq!(zset.pop_first().unwrap().member, "dave");
        assert_eq!(zset.pop_last().unwrap().member, "bob");
        assert_eq!(zset.len(), 2);
        zset.validate().unwrap();

        let mut empty: ZSet<String> = ZSet::new();
        assert_eq!(empty.pop_first(), None);
        assert_eq!(empty.pop_last(), None);
    }

    #[test]
    fn equality_ignores_ordering_internals() {
        let a = create_test_set();
        let mut b = ZSet::new();
        // Same content, different insertion order
        b.add(50, "dave".to_string());
        b.add(200, "bob".to_string());
        b.add(100, "alice".to_string());
        b.add(150, "charlie".to_string());
        assert_eq!(a, b);

        b.add(151, "charlie".to_string());
        assert_ne!(a, b);
    }
}
