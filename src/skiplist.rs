//! Skip list ordered by (score, member).
//!
//! A probabilistic data structure providing O(log n) insert, delete, rank
//! and range queries. Each forward pointer carries a span (the number of
//! level-0 steps it covers), which is what makes rank queries logarithmic.
//!
//! Nodes live in a slot arena (`Vec<Option<Node>>`) and link by index; slot
//! 0 is a sentinel header with the full level vector. Ordering is delegated
//! to a [`ScoreHandler`] and a [`MemberComparator`], so the same structure
//! serves ascending and descending score orders.

use crate::member::MemberComparator;
use crate::range::Normalized;
use crate::score::ScoreHandler;
use std::cmp::Ordering;

pub(crate) const SKIPLIST_MAXLEVEL: usize = 32;
const SKIPLIST_P: f64 = 0.25; // Probability for level promotion

/// Arena slot of the sentinel header.
const HEADER: usize = 0;

/// Forward pointer and span at one level
#[derive(Clone, Debug)]
struct SkipListLevel {
    forward: Option<usize>, // Index of next node at this level
    span: usize,            // Level-0 steps covered by `forward`
}

/// A node in the skip list
#[derive(Clone, Debug)]
struct SkipListNode<K> {
    /// `None` only for the header
    member: Option<K>,
    score: i64,
    /// One entry per level this node participates in
    levels: Vec<SkipListLevel>,
    /// Backward pointer for reverse traversal, level 0 only
    backward: Option<usize>,
}

impl<K> SkipListNode<K> {
    fn member(&self) -> &K {
        self.member.as_ref().expect("header node has no member")
    }
}

/// Skip list keyed by (score, member) under caller-supplied orderings.
#[derive(Clone, Debug)]
pub struct SkipList<K, S, C> {
    /// All nodes stored in a Vec (index 0 is the header)
    nodes: Vec<Option<SkipListNode<K>>>,
    /// Free list for reusing slots
    free_slots: Vec<usize>,
    /// Index of tail node
    tail: Option<usize>,
    /// Current max level in use
    level: usize,
    /// Number of elements
    length: usize,
    /// RNG state for level generation (xorshift)
    rng_state: u64,
    scores: S,
    members: C,
}

fn empty_levels(count: usize) -> Vec<SkipListLevel> {
    (0..count)
        .map(|_| SkipListLevel {
            forward: None,
            span: 0,
        })
        .collect()
}

impl<K, S, C> SkipList<K, S, C>
where
    S: ScoreHandler,
    C: MemberComparator<K>,
{
    pub fn new(scores: S, members: C) -> Self {
        let header = SkipListNode {
            member: None,
            score: 0,
            levels: empty_levels(SKIPLIST_MAXLEVEL),
            backward: None,
        };

        SkipList {
            nodes: vec![Some(header)],
            free_slots: Vec::new(),
            tail: None,
            level: 1,
            length: 0,
            rng_state: 0x9e3779b97f4a7c15, // Initial seed
            scores,
            members,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    fn node(&self, idx: usize) -> &SkipListNode<K> {
        self.nodes[idx]
            .as_ref()
            .expect("node must exist at valid index")
    }

    fn node_mut(&mut self, idx: usize) -> &mut SkipListNode<K> {
        self.nodes[idx]
            .as_mut()
            .expect("node must exist at valid index")
    }

    /// (member, score) stored at an arena slot.
    pub(crate) fn entry_at(&self, idx: usize) -> (&K, i64) {
        let node = self.node(idx);
        (node.member(), node.score)
    }

    /// Level-0 successor of a slot.
    pub(crate) fn next_idx(&self, idx: usize) -> Option<usize> {
        self.node(idx).levels[0].forward
    }

    /// Level-0 predecessor of a slot (`None` at the first entry).
    pub(crate) fn prev_idx(&self, idx: usize) -> Option<usize> {
        self.node(idx).backward
    }

    /// Generate random level using geometric distribution
    fn random_level(&mut self) -> usize {
        let mut level = 1;
        // Xorshift64 for fast random numbers
        let mut x = self.rng_state;
        while level < SKIPLIST_MAXLEVEL {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.rng_state = x;
            // Check if random < SKIPLIST_P (using fixed point)
            if (x & 0xFFFF) as f64 / 65536.0 >= SKIPLIST_P {
                break;
            }
            level += 1;
        }
        level
    }

    /// Allocate a new node slot
    fn alloc_node(&mut self, member: K, score: i64, level: usize) -> usize {
        let node = SkipListNode {
            member: Some(member),
            score,
            levels: empty_levels(level),
            backward: None,
        };

        if let Some(idx) = self.free_slots.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(Some(node));
            idx
        }
    }

    /// Free a node slot
    fn free_node(&mut self, idx: usize) {
        self.nodes[idx] = None;
        self.free_slots.push(idx);
    }

    /// Compare (score, member) composite keys: score first, member breaks
    /// ties.
    fn compare_key(&self, score1: i64, member1: &K, score2: i64, member2: &K) -> Ordering {
        self.scores
            .compare(score1, score2)
            .then_with(|| self.members.compare(member1, member2))
    }

    /// Insert a new element.
    ///
    /// The member must not already be present; the caller (the hash index)
    /// guarantees it.
    pub fn insert(&mut self, member: K, score: i64) {
        let mut update = [0usize; SKIPLIST_MAXLEVEL];
        let mut rank = [0usize; SKIPLIST_MAXLEVEL];

        // Find the insertion point at each level, tracking the level-0
        // distance walked so spans can be split below.
        let mut x = HEADER;
        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };

            loop {
                let node = self.node(x);
                if let Some(fwd) = node.levels[i].forward {
                    let span = node.levels[i].span;
                    let fwd_node = self.node(fwd);
                    if self.compare_key(fwd_node.score, fwd_node.member(), score, &member)
                        == Ordering::Less
                    {
                        rank[i] += span;
                        x = fwd;
                        continue;
                    }
                }
                break;
            }
            update[i] = x;
        }

        debug_assert!(
            self.node(x).levels[0]
                .forward
                .map_or(true, |fwd| self
                    .members
                    .compare(self.node(fwd).member(), &member)
                    != Ordering::Equal),
            "insert precondition violated: member already present"
        );

        let level = self.random_level();
        let new_idx = self.alloc_node(member, score, level);

        // Initialize update/rank for levels above the current list level;
        // the header pointer there covers the whole list until split.
        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = HEADER;
                self.node_mut(HEADER).levels[i].span = self.length;
            }
            self.level = level;
        }

        // Splice in at each of the node's levels
        for i in 0..level {
            // Read values first to avoid borrow conflicts
            let old_forward = self.node(update[i]).levels[i].forward;
            let old_span = self.node(update[i]).levels[i].span;

            let new_node = self.node_mut(new_idx);
            new_node.levels[i].forward = old_forward;
            new_node.levels[i].span = old_span - (rank[0] - rank[i]);

            let update_node = self.node_mut(update[i]);
            update_node.levels[i].forward = Some(new_idx);
            update_node.levels[i].span = (rank[0] - rank[i]) + 1;
        }

        // Untouched higher levels now jump over one more node
        for i in level..self.level {
            self.node_mut(update[i]).levels[i].span += 1;
        }

        let backward = if update[0] == HEADER {
            None
        } else {
            Some(update[0])
        };
        self.node_mut(new_idx).backward = backward;

        let new_fwd = self.node(new_idx).levels[0].forward;
        if let Some(fwd) = new_fwd {
            self.node_mut(fwd).backward = Some(new_idx);
        } else {
            self.tail = Some(new_idx);
        }

        self.length += 1;
    }

    /// Unlink and free `idx`, repairing spans through the update vector.
    fn delete_node(&mut self, idx: usize, update: &[usize; SKIPLIST_MAXLEVEL]) {
        for i in 0..self.level {
            let update_fwd = self.node(update[i]).levels[i].forward;
            if update_fwd == Some(idx) {
                let idx_span = self.node(idx).levels[i].span;
                let idx_fwd = self.node(idx).levels[i].forward;

                let update_node = self.node_mut(update[i]);
                // Add before subtracting: span - 1 can underflow when the
                // removed pointer covered zero trailing steps
                update_node.levels[i].span = update_node.levels[i].span + idx_span - 1;
                update_node.levels[i].forward = idx_fwd;
            } else {
                self.node_mut(update[i]).levels[i].span -= 1;
            }
        }

        let fwd = self.node(idx).levels[0].forward;
        if let Some(fwd_idx) = fwd {
            let backward = self.node(idx).backward;
            self.node_mut(fwd_idx).backward = backward;
        } else {
            self.tail = self.node(idx).backward;
        }

        while self.level > 1 {
            if self.node(HEADER).levels[self.level - 1].forward.is_some() {
                break;
            }
            self.level -= 1;
        }

        self.free_node(idx);
        self.length -= 1;
    }

    /// Remove the element with this exact (score, member). Returns whether
    /// it was found.
    pub fn delete(&mut self, score: i64, member: &K) -> bool {
        let mut update = [0usize; SKIPLIST_MAXLEVEL];

        let mut x = HEADER;
        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                if let Some(fwd) = node.levels[i].forward {
                    let fwd_node = self.node(fwd);
                    if self.compare_key(fwd_node.score, fwd_node.member(), score, member)
                        == Ordering::Less
                    {
                        x = fwd;
                        continue;
                    }
                }
                break;
            }
            update[i] = x;
        }

        let target = self.node(x).levels[0].forward;
        if let Some(idx) = target {
            let node = self.node(idx);
            if self.scores.compare(node.score, score) == Ordering::Equal
                && self.members.compare(node.member(), member) == Ordering::Equal
            {
                self.delete_node(idx, &update);
                return true;
            }
        }

        false
    }

    /// 1-based rank of an exact (score, member); the header occupies
    /// virtual rank 0. Returns `None` when absent.
    pub(crate) fn rank1(&self, score: i64, member: &K) -> Option<usize> {
        let mut rank = 0;
        let mut x = HEADER;

        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                if let Some(fwd) = node.levels[i].forward {
                    let span = node.levels[i].span;
                    let fwd_node = self.node(fwd);
                    // Walk through the target itself so `rank` counts it
                    if self.compare_key(fwd_node.score, fwd_node.member(), score, member)
                        != Ordering::Greater
                    {
                        rank += span;
                        x = fwd;
                        continue;
                    }
                }
                break;
            }

            if x != HEADER && self.members.compare(self.node(x).member(), member) == Ordering::Equal
            {
                return Some(rank);
            }
        }

        None
    }

    /// 0-based rank of an exact (score, member).
    pub fn rank(&self, score: i64, member: &K) -> Option<usize> {
        self.rank1(score, member).map(|r| r - 1)
    }

    /// Arena slot of the node at a 1-based rank.
    pub(crate) fn node_by_rank1(&self, rank: usize) -> Option<usize> {
        if rank == 0 || rank > self.length {
            return None;
        }

        let mut traversed = 0;
        let mut x = HEADER;

        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                if let Some(fwd) = node.levels[i].forward {
                    let span = node.levels[i].span;
                    if traversed + span <= rank {
                        traversed += span;
                        x = fwd;
                        continue;
                    }
                }
                break;
            }
            if x != HEADER && traversed == rank {
                return Some(x);
            }
        }

        None
    }

    /// Get element by rank (0-indexed)
    pub fn get_by_rank(&self, rank: usize) -> Option<(&K, i64)> {
        self.node_by_rank1(rank + 1).map(|idx| self.entry_at(idx))
    }

    /// Whether any element falls inside `range`.
    fn is_in_range(&self, range: &Normalized) -> bool {
        if range.is_empty(&self.scores) {
            return false;
        }
        match self.tail {
            Some(t) if range.gte_min(self.node(t).score, &self.scores) => {}
            _ => return false,
        }
        match self.node(HEADER).levels[0].forward {
            Some(f) if range.lte_max(self.node(f).score, &self.scores) => {}
            _ => return false,
        }
        true
    }

    /// Slot of the first node with score inside `range`.
    pub(crate) fn first_in_range(&self, range: &Normalized) -> Option<usize> {
        if !self.is_in_range(range) {
            return None;
        }

        let mut x = HEADER;
        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                if let Some(fwd) = node.levels[i].forward {
                    if !range.gte_min(self.node(fwd).score, &self.scores) {
                        x = fwd;
                        continue;
                    }
                }
                break;
            }
        }

        // is_in_range guarantees a successor here
        let idx = self.node(x).levels[0].forward?;
        if !range.lte_max(self.node(idx).score, &self.scores) {
            return None;
        }
        Some(idx)
    }

    /// Slot of the last node with score inside `range`.
    pub(crate) fn last_in_range(&self, range: &Normalized) -> Option<usize> {
        if !self.is_in_range(range) {
            return None;
        }

        let mut x = HEADER;
        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                if let Some(fwd) = node.levels[i].forward {
                    if range.lte_max(self.node(fwd).score, &self.scores) {
                        x = fwd;
                        continue;
                    }
                }
                break;
            }
        }

        if x == HEADER || !range.gte_min(self.node(x).score, &self.scores) {
            return None;
        }
        Some(x)
    }

    /// Number of elements with score inside `range`, via the rank delta of
    /// its boundary nodes.
    pub(crate) fn count_in_range(&self, range: &Normalized) -> usize {
        let first = match self.first_in_range(range) {
            Some(idx) => idx,
            None => return 0,
        };
        let last = match self.last_in_range(range) {
            Some(idx) => idx,
            None => return 0,
        };
        let (first_member, first_score) = self.entry_at(first);
        let (last_member, last_score) = self.entry_at(last);
        let first_rank = self
            .rank1(first_score, first_member)
            .expect("node in range must have a rank");
        let last_rank = self
            .rank1(last_score, last_member)
            .expect("node in range must have a rank");
        last_rank - first_rank + 1
    }

    /// Delete every element with score inside `range`, invoking
    /// `on_removed` with each before it is unlinked. Returns the count.
    ///
    /// Deletions proceed left to right through the retained update vector;
    /// each step performs the full cross-level span fixup for one node, so
    /// the vector stays correct for the next.
    pub(crate) fn delete_range_by_score<F>(&mut self, range: &Normalized, mut on_removed: F) -> usize
    where
        F: FnMut(&K, i64),
    {
        let mut update = [0usize; SKIPLIST_MAXLEVEL];

        let mut x = HEADER;
        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                if let Some(fwd) = node.levels[i].forward {
                    if !range.gte_min(self.node(fwd).score, &self.scores) {
                        x = fwd;
                        continue;
                    }
                }
                break;
            }
            update[i] = x;
        }

        let mut current = self.node(x).levels[0].forward;
        let mut removed = 0;
        while let Some(idx) = current {
            let node = self.node(idx);
            if !range.lte_max(node.score, &self.scores) {
                break;
            }
            let next = node.levels[0].forward;
            on_removed(node.member(), node.score);
            self.delete_node(idx, &update);
            removed += 1;
            current = next;
        }
        removed
    }

    /// Delete elements at 1-based ranks `[start, end]`, inclusive,
    /// invoking `on_removed` with each. Returns the count.
    pub(crate) fn delete_range_by_rank1<F>(
        &mut self,
        start: usize,
        end: usize,
        mut on_removed: F,
    ) -> usize
    where
        F: FnMut(&K, i64),
    {
        let mut update = [0usize; SKIPLIST_MAXLEVEL];
        let mut traversed = 0;

        let mut x = HEADER;
        for i in (0..self.level).rev() {
            loop {
                let node = self.node(x);
                if let Some(fwd) = node.levels[i].forward {
                    let span = node.levels[i].span;
                    if traversed + span < start {
                        traversed += span;
                        x = fwd;
                        continue;
                    }
                }
                break;
            }
            update[i] = x;
        }

        traversed += 1;
        let mut current = self.node(x).levels[0].forward;
        let mut removed = 0;
        while let Some(idx) = current {
            if traversed > end {
                break;
            }
            let node = self.node(idx);
            let next = node.levels[0].forward;
            on_removed(node.member(), node.score);
            self.delete_node(idx, &update);
            removed += 1;
            traversed += 1;
            current = next;
        }
        removed
    }

    /// Iterate over all elements in order
    pub fn iter(&self) -> SkipListIter<'_, K, S, C> {
        SkipListIter {
            list: self,
            current: self.node(HEADER).levels[0].forward,
        }
    }

    /// Structural sanity check: composite ordering on level 0, span
    /// bookkeeping against level-0 distances, the backward chain, tail and
    /// length. O(n * level); meant for tests and the DST harness.
    pub fn validate(&self) -> Result<(), String> {
        // Level-0 walk: order, backward chain, positions
        let mut positions = vec![0usize; self.nodes.len()];
        let mut prev: Option<usize> = None;
        let mut count = 0;
        let mut current = self.node(HEADER).levels[0].forward;
        while let Some(idx) = current {
            let node = self.node(idx);
            match prev {
                Some(p) => {
                    let prev_node = self.node(p);
                    if self.compare_key(
                        prev_node.score,
                        prev_node.member(),
                        node.score,
                        node.member(),
                    ) != Ordering::Less
                    {
                        return Err(format!("composite order violated at position {}", count + 1));
                    }
                    if node.backward != Some(p) {
                        return Err(format!("backward pointer wrong at position {}", count + 1));
                    }
                }
                None => {
                    if node.backward.is_some() {
                        return Err("first node has a backward pointer".to_string());
                    }
                }
            }
            count += 1;
            positions[idx] = count;
            prev = current;
            current = node.levels[0].forward;
        }

        if count != self.length {
            return Err(format!(
                "length mismatch: stored {}, level-0 walk found {}",
                self.length, count
            ));
        }
        if self.tail != prev {
            return Err(format!("tail is {:?}, expected {:?}", self.tail, prev));
        }

        // List level
        if self.level < 1 || self.level > SKIPLIST_MAXLEVEL {
            return Err(format!("list level {} out of bounds", self.level));
        }
        if self.length == 0 && self.level != 1 {
            return Err(format!("empty list has level {}", self.level));
        }
        if self.level > 1 && self.node(HEADER).levels[self.level - 1].forward.is_none() {
            return Err(format!("no node reaches list level {}", self.level));
        }

        // Spans: each forward pointer must cover exactly the level-0
        // distance to its target; trailing pointers cover the distance to
        // the end of the list.
        for lvl in 0..self.level {
            let mut at = HEADER;
            let mut pos = 0;
            loop {
                let node = self.node(at);
                if lvl >= node.levels.len() {
                    return Err(format!(
                        "reached node below level {} during level walk",
                        lvl
                    ));
                }
                let span = node.levels[lvl].span;
                match node.levels[lvl].forward {
                    Some(fwd) => {
                        let fwd_pos = positions[fwd];
                        if fwd_pos == 0 {
                            return Err(format!("level {} points at a node missing from level 0", lvl));
                        }
                        if span != fwd_pos - pos {
                            return Err(format!(
                                "span {} at level {} position {}, expected {}",
                                span,
                                lvl,
                                pos,
                                fwd_pos - pos
                            ));
                        }
                        at = fwd;
                        pos = fwd_pos;
                    }
                    None => {
                        if span != self.length - pos {
                            return Err(format!(
                                "trailing span {} at level {} position {}, expected {}",
                                span,
                                lvl,
                                pos,
                                self.length - pos
                            ));
                        }
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

pub struct SkipListIter<'a, K, S, C> {
    list: &'a SkipList<K, S, C>,
    current: Option<usize>,
}

impl<'a, K, S, C> Iterator for SkipListIter<'a, K, S, C>
where
    S: ScoreHandler,
    C: MemberComparator<K>,
{
    type Item = (&'a K, i64);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.current?;
        let node = self.list.node(idx);
        self.current = node.levels[0].forward;
        Some((node.member(), node.score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::NaturalOrder;
    use crate::range::ScoreRange;
    use crate::score::{AscendingScores, DescendingScores};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn ascending() -> SkipList<String, AscendingScores, NaturalOrder> {
        SkipList::new(AscendingScores, NaturalOrder)
    }

    fn normalized(range: ScoreRange) -> Normalized {
        Normalized::new(range, &AscendingScores)
    }

    fn collect(list: &SkipList<String, AscendingScores, NaturalOrder>) -> Vec<(String, i64)> {
        list.iter().map(|(m, s)| (m.clone(), s)).collect()
    }

    #[test]
    fn insert_orders_by_score_then_member() {
        let mut list = ascending();
        list.insert("b".to_string(), 2);
        list.insert("a".to_string(), 2);
        list.insert("c".to_string(), 1);

        assert_eq!(
            collect(&list),
            vec![
                ("c".to_string(), 1),
                ("a".to_string(), 2),
                ("b".to_string(), 2)
            ]
        );
        list.validate().unwrap();
    }

    #[test]
    fn delete_requires_exact_pair() {
        let mut list = ascending();
        list.insert("a".to_string(), 1);
        list.insert("b".to_string(), 2);

        assert!(!list.delete(2, &"a".to_string()));
        assert_eq!(list.len(), 2);
        assert!(list.delete(1, &"a".to_string()));
        assert_eq!(list.len(), 1);
        list.validate().unwrap();
    }

    #[test]
    fn rank_and_get_by_rank_agree() {
        let mut list = ascending();
        for (m, s) in [("a", 5), ("b", 3), ("c", 9), ("d", 3)] {
            list.insert(m.to_string(), s);
        }
        // Order: b(3), d(3), a(5), c(9)
        assert_eq!(list.rank(3, &"b".to_string()), Some(0));
        assert_eq!(list.rank(3, &"d".to_string()), Some(1));
        assert_eq!(list.rank(5, &"a".to_string()), Some(2));
        assert_eq!(list.rank(9, &"c".to_string()), Some(3));
        assert_eq!(list.rank(4, &"a".to_string()), None);

        for rank in 0..list.len() {
            let (member, score) = list.get_by_rank(rank).unwrap();
            assert_eq!(list.rank(score, member), Some(rank));
        }
        assert_eq!(list.get_by_rank(4), None);
    }

    #[test]
    fn first_and_last_in_range() {
        let mut list = ascending();
        for (m, s) in [("a", 1), ("b", 3), ("c", 3), ("d", 7)] {
            list.insert(m.to_string(), s);
        }

        let r = normalized(ScoreRange::inclusive(2, 7));
        assert_eq!(list.entry_at(list.first_in_range(&r).unwrap()).0, "b");
        assert_eq!(list.entry_at(list.last_in_range(&r).unwrap()).0, "d");

        let r = normalized(ScoreRange::new(3, true, 7, true));
        assert_eq!(list.first_in_range(&r), None);
        assert_eq!(list.last_in_range(&r), None);

        let r = normalized(ScoreRange::inclusive(8, 9));
        assert_eq!(list.first_in_range(&r), None);

        let r = normalized(ScoreRange::exclusive(3, 3));
        assert_eq!(list.first_in_range(&r), None);
    }

    #[test]
    fn count_in_range_matches_walk() {
        let mut list = ascending();
        for (m, s) in [("a", 1), ("b", 3), ("c", 3), ("d", 7), ("e", 9)] {
            list.insert(m.to_string(), s);
        }

        assert_eq!(list.count_in_range(&normalized(ScoreRange::inclusive(3, 7))), 3);
        assert_eq!(list.count_in_range(&normalized(ScoreRange::new(3, true, 9, false))), 2);
        assert_eq!(list.count_in_range(&normalized(ScoreRange::inclusive(100, 200))), 0);
        assert_eq!(
            list.count_in_range(&normalized(ScoreRange::inclusive(i64::MIN, i64::MAX))),
            5
        );
    }

    #[test]
    fn delete_range_by_score_unlinks_and_reports() {
        let mut list = ascending();
        for (m, s) in [("a", 1), ("b", 3), ("c", 3), ("d", 7), ("e", 9)] {
            list.insert(m.to_string(), s);
        }

        let mut removed = Vec::new();
        let n = list.delete_range_by_score(&normalized(ScoreRange::inclusive(3, 7)), |m, s| {
            removed.push((m.clone(), s))
        });
        assert_eq!(n, 3);
        assert_eq!(
            removed,
            vec![
                ("b".to_string(), 3),
                ("c".to_string(), 3),
                ("d".to_string(), 7)
            ]
        );
        assert_eq!(collect(&list), vec![("a".to_string(), 1), ("e".to_string(), 9)]);
        list.validate().unwrap();
    }

    #[test]
    fn delete_range_by_rank_walks_inclusive_window() {
        let mut list = ascending();
        for (m, s) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            list.insert(m.to_string(), s);
        }

        let mut removed = Vec::new();
        let n = list.delete_range_by_rank1(2, 3, |m, _| removed.push(m.clone()));
        assert_eq!(n, 2);
        assert_eq!(removed, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(collect(&list), vec![("a".to_string(), 1), ("d".to_string(), 4)]);
        list.validate().unwrap();
    }

    #[test]
    fn descending_handler_reverses_score_order() {
        let mut list: SkipList<String, DescendingScores, NaturalOrder> =
            SkipList::new(DescendingScores, NaturalOrder);
        for (m, s) in [("x", 1), ("y", 2), ("z", 2), ("w", 3)] {
            list.insert(m.to_string(), s);
        }

        let order: Vec<String> = list.iter().map(|(m, _)| m.clone()).collect();
        assert_eq!(order, vec!["w", "y", "z", "x"]);
        assert_eq!(list.rank(3, &"w".to_string()), Some(0));
        assert_eq!(list.rank(1, &"x".to_string()), Some(3));
        list.validate().unwrap();
    }

    #[test]
    fn randomized_ops_keep_structure_valid() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut list = ascending();
        let mut model: Vec<(i64, String)> = Vec::new();

        for step in 0..600 {
            let member = format!("m{}", rng.gen_range(0..80));
            let present = model.iter().position(|(_, m)| *m == member);
            if rng.gen_bool(0.3) {
                if let Some(pos) = present {
                    let (score, _) = model.remove(pos);
                    assert!(list.delete(score, &member));
                }
            } else if present.is_none() {
                let score = rng.gen_range(-50..50);
                list.insert(member.clone(), score);
                model.push((score, member));
            }

            if step % 25 == 0 {
                list.validate().unwrap();
            }
        }

        list.validate().unwrap();
        model.sort();
        let got: Vec<(i64, String)> = list.iter().map(|(m, s)| (s, m.clone())).collect();
        assert_eq!(got, model);

        // Rank round-trip over the surviving entries
        for (rank, (score, member)) in model.iter().enumerate() {
            assert_eq!(list.rank(*score, member), Some(rank));
        }
    }
}
