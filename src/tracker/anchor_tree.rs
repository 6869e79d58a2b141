//! Arena treap of tracked ranges with lazy offset propagation.
//!
//! Ranges are kept in a treap ordered by start offset and augmented with the
//! maximum end offset of every subtree. Each node also carries a pending
//! `lazy` delta that still has to be added to its descendants (the node's own
//! offsets already include it).
//!
//! Applying a change splits the treap at the end of the replaced text: the
//! right part only moves, so it receives one lazy delta in O(1). The left part
//! is searched for ranges reaching past the edit offset, pruned by the max-end
//! augmentation; only those are taken out, moved with [`apply_change`] and
//! reinserted. An edit touching `k` of `n` ranges costs O((k + 1) log n).
//!
//! Nodes live in a `Vec` arena and are addressed by index; freed slots are
//! recycled with a bumped generation so stale [`AnchorSlot`]s are detected.

use text_size::{TextRange, TextSize};

use crate::base::{AnchorState, ChangeEvent, apply_change};

/// Handle to one tracked range inside an [`AnchorTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorSlot {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Node {
    start: i64,
    end: i64,
    max_end: i64,
    lazy: i64,
    state: AnchorState,
    priority: u64,
    parent: Option<u32>,
    left: Option<u32>,
    right: Option<u32>,
    generation: u32,
    live: bool,
}

#[derive(Debug, Clone)]
pub struct AnchorTree {
    nodes: Vec<Node>,
    free: Vec<u32>,
    root: Option<u32>,
    len: usize,
    seed: u64,
}

impl Default for AnchorTree {
    fn default() -> Self {
        Self::new()
    }
}

fn to_offset(value: i64) -> TextSize {
    TextSize::new(value.clamp(0, i64::from(u32::MAX)) as u32)
}

fn from_offset(offset: TextSize) -> i64 {
    i64::from(u32::from(offset))
}

impl AnchorTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
            seed: 0x9E37_79B9_7F4A_7C15,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Start tracking `range`.
    pub fn insert(&mut self, range: TextRange, state: AnchorState) -> AnchorSlot {
        let index = self.alloc(range, state);
        self.link(index);
        self.len += 1;
        AnchorSlot {
            index,
            generation: self.nodes[index as usize].generation,
        }
    }

    /// Stop tracking the range behind `slot`. Returns `false` for stale slots.
    pub fn remove(&mut self, slot: AnchorSlot) -> bool {
        let Some(index) = self.live_index(slot) else {
            return false;
        };
        self.unlink(index);
        let node = &mut self.nodes[index as usize];
        node.live = false;
        node.generation = node.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        true
    }

    pub fn get(&self, slot: AnchorSlot) -> Option<(TextRange, AnchorState)> {
        let index = self.live_index(slot)?;
        let (start, end) = self.true_offsets(index);
        Some((
            TextRange::new(to_offset(start), to_offset(end)),
            self.nodes[index as usize].state,
        ))
    }

    /// Overwrite the tracked range, e.g. after it was re-resolved.
    pub fn reset(&mut self, slot: AnchorSlot, range: TextRange, state: AnchorState) -> bool {
        let Some(index) = self.live_index(slot) else {
            return false;
        };
        self.unlink(index);
        let node = &mut self.nodes[index as usize];
        node.start = from_offset(range.start());
        node.end = from_offset(range.end());
        node.max_end = node.end;
        node.lazy = 0;
        node.state = state;
        self.link(index);
        true
    }

    /// Move every tracked range through `event`.
    pub fn apply(&mut self, event: &ChangeEvent) {
        if self.root.is_none() {
            return;
        }
        let offset = from_offset(event.offset);
        let old_end = from_offset(event.old_end());
        let delta = event.delta();

        let (left, right) = self.split(self.root, old_end + 1);
        if let Some(right) = right {
            self.add_delta(right, delta);
        }

        let mut touched = Vec::new();
        self.collect_reaching(left, offset, &mut touched);

        self.root = left;
        for &index in &touched {
            self.unlink(index);
        }
        self.root = self.merge(self.root, right);

        for index in touched {
            let node = &self.nodes[index as usize];
            let range = TextRange::new(to_offset(node.start), to_offset(node.end));
            let (moved, state) = apply_change(range, node.state, event);
            let node = &mut self.nodes[index as usize];
            node.start = from_offset(moved.start());
            node.end = from_offset(moved.end());
            node.max_end = node.end;
            node.state = state;
            self.link(index);
        }
    }

    /// All live ranges in document order.
    pub fn ranges(&self) -> Vec<(AnchorSlot, TextRange, AnchorState)> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: Vec<(u32, i64)> = Vec::new();
        let mut current = self.root.map(|root| (root, 0));
        loop {
            while let Some((index, pending)) = current {
                stack.push((index, pending));
                let node = &self.nodes[index as usize];
                current = node.left.map(|left| (left, pending + node.lazy));
            }
            let Some((index, pending)) = stack.pop() else {
                break;
            };
            let node = &self.nodes[index as usize];
            out.push((
                AnchorSlot {
                    index,
                    generation: node.generation,
                },
                TextRange::new(to_offset(node.start + pending), to_offset(node.end + pending)),
                node.state,
            ));
            current = node.right.map(|right| (right, pending + node.lazy));
        }
        out
    }

    // =========================================================================
    // Arena
    // =========================================================================

    fn next_priority(&mut self) -> u64 {
        // xorshift64
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.seed = x;
        x
    }

    fn alloc(&mut self, range: TextRange, state: AnchorState) -> u32 {
        let priority = self.next_priority();
        let mut node = Node {
            start: from_offset(range.start()),
            end: from_offset(range.end()),
            max_end: from_offset(range.end()),
            lazy: 0,
            state,
            priority,
            parent: None,
            left: None,
            right: None,
            generation: 0,
            live: true,
        };
        match self.free.pop() {
            Some(index) => {
                node.generation = self.nodes[index as usize].generation;
                self.nodes[index as usize] = node;
                index
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    fn live_index(&self, slot: AnchorSlot) -> Option<u32> {
        let node = self.nodes.get(slot.index as usize)?;
        (node.live && node.generation == slot.generation).then_some(slot.index)
    }

    fn true_offsets(&self, index: u32) -> (i64, i64) {
        let mut pending = 0;
        let mut parent = self.nodes[index as usize].parent;
        while let Some(p) = parent {
            pending += self.nodes[p as usize].lazy;
            parent = self.nodes[p as usize].parent;
        }
        let node = &self.nodes[index as usize];
        (node.start + pending, node.end + pending)
    }

    // =========================================================================
    // Treap primitives
    // =========================================================================

    fn add_delta(&mut self, index: u32, delta: i64) {
        let node = &mut self.nodes[index as usize];
        node.start += delta;
        node.end += delta;
        node.max_end += delta;
        node.lazy += delta;
    }

    fn push(&mut self, index: u32) {
        let node = &self.nodes[index as usize];
        let lazy = node.lazy;
        if lazy == 0 {
            return;
        }
        let (left, right) = (node.left, node.right);
        for child in [left, right].into_iter().flatten() {
            self.add_delta(child, lazy);
        }
        self.nodes[index as usize].lazy = 0;
    }

    fn pull(&mut self, index: u32) {
        let node = &self.nodes[index as usize];
        let (left, right) = (node.left, node.right);
        let mut max_end = node.end;
        for child in [left, right].into_iter().flatten() {
            max_end = max_end.max(self.nodes[child as usize].max_end);
            self.nodes[child as usize].parent = Some(index);
        }
        self.nodes[index as usize].max_end = max_end;
    }

    fn orphan(&mut self, tree: Option<u32>) -> Option<u32> {
        if let Some(index) = tree {
            self.nodes[index as usize].parent = None;
        }
        tree
    }

    /// Split into (`start < key`, `start >= key`).
    fn split(&mut self, tree: Option<u32>, key: i64) -> (Option<u32>, Option<u32>) {
        let Some(index) = tree else {
            return (None, None);
        };
        self.push(index);
        if self.nodes[index as usize].start < key {
            let (left, right) = self.split(self.nodes[index as usize].right, key);
            self.nodes[index as usize].right = left;
            self.pull(index);
            (self.orphan(Some(index)), self.orphan(right))
        } else {
            let (left, right) = self.split(self.nodes[index as usize].left, key);
            self.nodes[index as usize].left = right;
            self.pull(index);
            (self.orphan(left), self.orphan(Some(index)))
        }
    }

    /// Merge two treaps where every start in `a` is <= every start in `b`.
    fn merge(&mut self, a: Option<u32>, b: Option<u32>) -> Option<u32> {
        match (a, b) {
            (None, tree) | (tree, None) => self.orphan(tree),
            (Some(a), Some(b)) => {
                if self.nodes[a as usize].priority > self.nodes[b as usize].priority {
                    self.push(a);
                    let merged = self.merge(self.nodes[a as usize].right, Some(b));
                    self.nodes[a as usize].right = merged;
                    self.pull(a);
                    self.orphan(Some(a))
                } else {
                    self.push(b);
                    let merged = self.merge(Some(a), self.nodes[b as usize].left);
                    self.nodes[b as usize].left = merged;
                    self.pull(b);
                    self.orphan(Some(b))
                }
            }
        }
    }

    /// Insert a detached node by its start offset.
    fn link(&mut self, index: u32) {
        let node = &mut self.nodes[index as usize];
        node.parent = None;
        node.left = None;
        node.right = None;
        node.lazy = 0;
        node.max_end = node.end;
        let start = node.start;

        let (left, right) = self.split(self.root, start);
        let left = self.merge(left, Some(index));
        self.root = self.merge(left, right);
    }

    /// Detach a node from the treap, keeping its true offsets.
    fn unlink(&mut self, index: u32) {
        let mut path = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            path.push(i);
            current = self.nodes[i as usize].parent;
        }
        for &i in path.iter().rev() {
            self.push(i);
        }

        let node = &self.nodes[index as usize];
        let (left, right, parent) = (node.left, node.right, node.parent);
        let merged = self.merge(left, right);
        match parent {
            None => self.root = merged,
            Some(parent) => {
                let parent_node = &mut self.nodes[parent as usize];
                if parent_node.left == Some(index) {
                    parent_node.left = merged;
                } else {
                    parent_node.right = merged;
                }
                let mut current = Some(parent);
                while let Some(i) = current {
                    self.pull(i);
                    current = self.nodes[i as usize].parent;
                }
            }
        }

        let node = &mut self.nodes[index as usize];
        node.parent = None;
        node.left = None;
        node.right = None;
    }

    /// Collect every node of `tree` whose end lies past `offset`.
    fn collect_reaching(&mut self, tree: Option<u32>, offset: i64, out: &mut Vec<u32>) {
        let mut stack: Vec<u32> = tree.into_iter().collect();
        while let Some(index) = stack.pop() {
            if self.nodes[index as usize].max_end <= offset {
                continue;
            }
            self.push(index);
            let node = &self.nodes[index as usize];
            if node.end > offset {
                out.push(index);
            }
            stack.extend([node.left, node.right].into_iter().flatten());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u32, end: u32) -> TextRange {
        TextRange::new(start.into(), end.into())
    }

    fn event(offset: u32, before: u32, after: u32) -> ChangeEvent {
        ChangeEvent::new(offset.into(), before.into(), after.into())
    }

    struct Rng(u64);

    impl Rng {
        fn next(&mut self, bound: u32) -> u32 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            (self.0 % u64::from(bound.max(1))) as u32
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut tree = AnchorTree::new();
        let a = tree.insert(range(10, 20), AnchorState::Intact);
        let b = tree.insert(range(0, 5), AnchorState::Intact);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(a), Some((range(10, 20), AnchorState::Intact)));
        assert_eq!(tree.get(b), Some((range(0, 5), AnchorState::Intact)));
    }

    #[test]
    fn test_shift_after_insertion() {
        let mut tree = AnchorTree::new();
        let a = tree.insert(range(10, 20), AnchorState::Intact);
        let b = tree.insert(range(30, 40), AnchorState::Intact);
        tree.apply(&event(0, 0, 5));
        assert_eq!(tree.get(a).map(|(r, _)| r), Some(range(15, 25)));
        assert_eq!(tree.get(b).map(|(r, _)| r), Some(range(35, 45)));

        tree.apply(&event(15, 0, 3));
        assert_eq!(tree.get(a).map(|(r, _)| r), Some(range(15, 28)));
        assert_eq!(tree.get(b).map(|(r, _)| r), Some(range(38, 48)));
    }

    #[test]
    fn test_remove_and_stale_slot() {
        let mut tree = AnchorTree::new();
        let a = tree.insert(range(1, 2), AnchorState::Intact);
        assert!(tree.remove(a));
        assert!(!tree.remove(a));
        assert_eq!(tree.get(a), None);

        let b = tree.insert(range(3, 4), AnchorState::Intact);
        assert_ne!(a, b);
        assert_eq!(tree.get(a), None);
        assert_eq!(tree.get(b).map(|(r, _)| r), Some(range(3, 4)));
        assert!(!tree.is_empty());
    }

    #[test]
    fn test_reset_moves_range() {
        let mut tree = AnchorTree::new();
        let a = tree.insert(range(0, 0), AnchorState::Replaced);
        let b = tree.insert(range(5, 9), AnchorState::Intact);
        assert!(tree.reset(a, range(20, 30), AnchorState::Intact));
        tree.apply(&event(10, 0, 2));
        assert_eq!(tree.get(a), Some((range(22, 32), AnchorState::Intact)));
        assert_eq!(tree.get(b), Some((range(5, 9), AnchorState::Intact)));
        let order: Vec<_> = tree.ranges().into_iter().map(|(_, r, _)| r).collect();
        assert_eq!(order, vec![range(5, 9), range(22, 32)]);
    }

    #[test]
    fn test_converging_ranges() {
        let mut tree = AnchorTree::new();
        let a = tree.insert(range(0, 2), AnchorState::Intact);
        let b = tree.insert(range(1, 3), AnchorState::Intact);
        tree.apply(&event(0, 1, 0));
        tree.apply(&event(1, 1, 0));
        assert_eq!(tree.get(a).map(|(r, _)| r), Some(range(0, 1)));
        assert_eq!(tree.get(b).map(|(r, _)| r), Some(range(0, 1)));
        tree.apply(&event(0, 0, 1));
        assert_eq!(tree.get(a).map(|(r, _)| r), Some(range(1, 2)));
        assert_eq!(tree.get(b).map(|(r, _)| r), Some(range(1, 2)));
    }

    #[test]
    fn test_matches_naive_model_on_random_edits() {
        let mut rng = Rng(0x2545_F491_4F6C_DD1D);
        for _ in 0..40 {
            let mut doc_len = 200u32;
            let mut tree = AnchorTree::new();
            let mut model: Vec<(AnchorSlot, TextRange, AnchorState)> = Vec::new();

            for _ in 0..60 {
                let start = rng.next(doc_len);
                let end = start + rng.next(doc_len - start + 1);
                let r = range(start, end);
                model.push((tree.insert(r, AnchorState::Intact), r, AnchorState::Intact));
            }

            for step in 0..200 {
                if step % 17 == 0 && !model.is_empty() {
                    let victim = rng.next(model.len() as u32) as usize;
                    let (slot, _, _) = model.swap_remove(victim);
                    assert!(tree.remove(slot));
                }
                let offset = rng.next(doc_len + 1);
                let before = rng.next((doc_len - offset).min(20) + 1);
                let after = rng.next(20);
                let edit = event(offset, before, after);
                tree.apply(&edit);
                for entry in &mut model {
                    let (moved, state) = apply_change(entry.1, entry.2, &edit);
                    entry.1 = moved;
                    entry.2 = state;
                }
                doc_len = doc_len - before + after;

                for (slot, expected, state) in &model {
                    assert_eq!(tree.get(*slot), Some((*expected, *state)));
                }
            }
            assert_eq!(tree.len(), model.len());
        }
    }

    #[test]
    fn test_many_point_edits_over_many_anchors() {
        let mut tree = AnchorTree::new();
        let slots: Vec<_> = (0..20_000u32)
            .map(|i| tree.insert(range(i * 10, i * 10 + 5), AnchorState::Intact))
            .collect();
        for i in 0..20_000u32 {
            tree.apply(&event(i * 11, 0, 1));
        }
        let (first, _) = tree.get(slots[0]).unwrap();
        assert_eq!(first, range(1, 6));
        let ranges = tree.ranges();
        assert_eq!(ranges.len(), 20_000);
        assert!(ranges.windows(2).all(|w| w[0].1.start() <= w[1].1.start()));
    }
}
