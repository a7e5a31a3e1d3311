//! The lock-free skiplist priority queue
//!
//! Implements the Lindén & Jonsson design: `locate_preds` (the locator),
//! `insert` (bottom-up CAS splicing), `delete_min` (batched pointer-marking
//! with amortized `restructure`), and `to_array` (single-threaded snapshot).

use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use std::sync::atomic::{fence, Ordering};

use crate::config::PQueueConfig;
use crate::level::{GeometricLevelGenerator, LevelGenerator, NUM_LEVELS};
use crate::node::{self, is_marked, mark, unmark, Node};

/// A lock-free, skiplist-based concurrent priority queue.
///
/// `G` is the level-generation collaborator; it defaults to
/// [`GeometricLevelGenerator`] (p=½, matching Lindén & Jonsson) and can be
/// overridden with [`PQueue::with_level_generator`].
pub struct PQueue<K, V, G = GeometricLevelGenerator> {
    head: Atomic<Node<K, V>>,
    tail: Atomic<Node<K, V>>,
    max_offset: usize,
    level_gen: G,
}

impl<K: Ord, V> PQueue<K, V, GeometricLevelGenerator> {
    /// Creates a queue that attempts a `restructure` pass roughly every
    /// `max_offset` `delete_min` calls.
    pub fn new(max_offset: usize) -> Self {
        Self::with_config(PQueueConfig { max_offset })
    }

    /// Creates a queue from an explicit [`PQueueConfig`].
    pub fn with_config(config: PQueueConfig) -> Self {
        Self::with_level_generator(config, GeometricLevelGenerator::new())
    }
}

impl<K: Ord, V, G: LevelGenerator> PQueue<K, V, G> {
    /// Creates a queue with a custom [`LevelGenerator`] collaborator.
    pub fn with_level_generator(config: PQueueConfig, level_gen: G) -> Self {
        let guard = &epoch::pin();

        let tail: Shared<'_, Node<K, V>> = Owned::new(Node::sentinel(NUM_LEVELS)).into_shared(guard);
        let head_node = Node::<K, V>::sentinel(NUM_LEVELS);
        for slot in head_node.next.iter() {
            slot.store(tail, Ordering::Relaxed);
        }

        Self {
            head: Atomic::new(head_node),
            tail: Atomic::from(tail),
            max_offset: config.max_offset,
            level_gen,
        }
    }

    fn clamp_level(&self, level: usize) -> usize {
        if level < 1 || level > NUM_LEVELS {
            log::warn!(
                "LevelGenerator returned out-of-range level {level}; clamping to [1, {NUM_LEVELS}]"
            );
            level.clamp(1, NUM_LEVELS)
        } else {
            level
        }
    }

    /// Top-down skiplist traversal: fills `preds`/`succs` with the
    /// predecessor/successor at each level for `key`, and returns the last
    /// bottom-level node seen that was itself deleted but whose
    /// predecessor's mark had not yet been set (the paper's "skew" guard).
    fn locate_preds<'g>(
        &self,
        key: &K,
        preds: &mut [Shared<'g, Node<K, V>>; NUM_LEVELS],
        succs: &mut [Shared<'g, Node<K, V>>; NUM_LEVELS],
        guard: &'g Guard,
    ) -> Option<Shared<'g, Node<K, V>>> {
        let tail = self.tail.load(Ordering::Relaxed, guard);
        let mut pred = self.head.load(Ordering::Acquire, guard);
        let mut d = is_marked(unsafe { pred.deref() }.next[0].load(Ordering::Acquire, guard));
        let mut del = None;

        for level in (0..NUM_LEVELS).rev() {
            let mut cur = unmark(unsafe { pred.deref() }.next[level].load(Ordering::Acquire, guard));

            loop {
                if cur == tail {
                    break;
                }
                let cur_ref = unsafe { cur.deref() };
                let cur_next0 = cur_ref.next[0].load(Ordering::Acquire, guard);
                let cur_deleted = is_marked(cur_next0);

                let keep = cur_deleted || cur_ref.key() < key || (level == 0 && d);
                if !keep {
                    break;
                }

                if level == 0 && d && cur_deleted {
                    del = Some(cur);
                }

                pred = cur;
                d = cur_deleted;
                cur = unmark(cur_next0);
            }

            preds[level] = pred;
            succs[level] = cur;
        }

        del
    }

    /// Bottom-up CAS splicing: links a new node carrying `key`/`value` into
    /// the list, or, on a live duplicate key, overwrites the existing
    /// node's value and discards the new node.
    pub fn insert(&self, key: K, value: V)
    where
        K: Clone,
        V: Clone,
    {
        let guard = &epoch::pin();
        let tail = self.tail.load(Ordering::Relaxed, guard);
        let level = self.clamp_level(self.level_gen.next_level());

        let mut preds = [Shared::null(); NUM_LEVELS];
        let mut succs = [Shared::null(); NUM_LEVELS];

        loop {
            let del = self.locate_preds(&key, &mut preds, &mut succs, guard);
            let succ0 = succs[0];

            if succ0 != tail && unsafe { succ0.deref() }.key() == &key {
                let pred0 = unsafe { preds[0].deref() };
                let pred0_next0 = pred0.next[0].load(Ordering::Acquire, guard);
                if !is_marked(pred0_next0) && pred0_next0 == succ0 {
                    let succ0_ref = unsafe { succ0.deref() };
                    let boxed = Owned::new(value).into_shared(guard);
                    let old = succ0_ref.value.swap(boxed, Ordering::AcqRel, guard);
                    if !old.is_null() {
                        unsafe { guard.defer_destroy(old) };
                    }
                    return;
                }
                // Stale snapshot: preds/succs no longer adjacent. Retry.
                continue;
            }

            let new_node = node::new_owned(key.clone(), value.clone(), level, tail);
            new_node.next[0].store(succ0, Ordering::Relaxed);

            let pred0 = unsafe { preds[0].deref() };
            match pred0.next[0].compare_exchange(
                succ0,
                new_node,
                Ordering::Release,
                Ordering::Acquire,
                guard,
            ) {
                Ok(new_shared) => {
                    self.splice_upper_levels(new_shared, level, &key, &mut preds, &mut succs, del, guard);
                    unsafe { new_shared.deref() }.clear_inserting();
                    return;
                }
                Err(_) => continue,
            }
        }
    }

    /// Best-effort splicing at levels `1..level`. Any failure (the new
    /// node already deleted, its target successor already deleted, or the
    /// skew guard `del == succs[i]`) is abandoned without retry: the
    /// upper-level invariant is restored lazily by later deletions, not
    /// re-attempted within this `insert`.
    fn splice_upper_levels<'g>(
        &self,
        new_node: Shared<'g, Node<K, V>>,
        level: usize,
        key: &K,
        preds: &mut [Shared<'g, Node<K, V>>; NUM_LEVELS],
        succs: &mut [Shared<'g, Node<K, V>>; NUM_LEVELS],
        mut del: Option<Shared<'g, Node<K, V>>>,
        guard: &'g Guard,
    ) {
        let new_ref = unsafe { new_node.deref() };
        let tail = self.tail.load(Ordering::Relaxed, guard);

        for i in 1..level {
            loop {
                if is_marked(new_ref.next[0].load(Ordering::Acquire, guard)) {
                    return;
                }

                let succ_i = succs[i];
                let succ_i_deleted = succ_i != tail
                    && is_marked(unsafe { succ_i.deref() }.next[0].load(Ordering::Acquire, guard));
                if succ_i_deleted || del == Some(succ_i) {
                    return;
                }

                new_ref.next[i].store(succ_i, Ordering::Relaxed);
                let pred_i = unsafe { preds[i].deref() };

                match pred_i.next[i].compare_exchange(
                    succ_i,
                    new_node,
                    Ordering::Release,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(_) => break,
                    Err(_) => {
                        del = self.locate_preds(key, preds, succs, guard);
                        if succs[0] != new_node {
                            return;
                        }
                        continue;
                    }
                }
            }
        }
    }

    /// Removes and returns the node with the smallest key, or `None` if the
    /// queue is empty. Every `max_offset` calls, attempts a head swing
    /// followed by [`Self::restructure`].
    pub fn delete_min(&self) -> Option<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let guard = &epoch::pin();
        let tail = self.tail.load(Ordering::Relaxed, guard);
        let head = self.head.load(Ordering::Acquire, guard);
        let obs_head = unsafe { head.deref() }.next[0].load(Ordering::Acquire, guard);

        let mut x = head;
        let mut offset = 0usize;
        let mut newhead: Option<Shared<'_, Node<K, V>>> = None;

        loop {
            let x_ref = unsafe { x.deref() };
            let nxt = x_ref.next[0].load(Ordering::Acquire, guard);

            if unmark(nxt) == tail {
                return None;
            }

            offset += 1;

            if newhead.is_none() && x_ref.is_inserting() {
                newhead = Some(x);
            }

            if is_marked(nxt) {
                x = unmark(nxt);
                continue;
            }

            let pre = node::mark_slot(&x_ref.next[0], guard);
            x = unmark(pre);
            if is_marked(pre) {
                continue;
            }
            break;
        }

        let x_ref = unsafe { x.deref() };
        let value = unsafe { x_ref.value.load(Ordering::Acquire, guard).deref() }.clone();
        let result = (x_ref.key().clone(), value);

        if offset <= self.max_offset {
            return Some(result);
        }

        let head_ref = unsafe { head.deref() };
        if head_ref.next[0].load(Ordering::Acquire, guard) != obs_head {
            return Some(result);
        }

        let newhead = newhead.unwrap_or(x);

        if head_ref
            .next[0]
            .compare_exchange(
                obs_head,
                mark(newhead),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            )
            .is_ok()
        {
            log::debug!("delete_min: head swing advanced past {offset} nodes");
            self.restructure(guard);
            self.reclaim_range(unmark(obs_head), newhead, guard);
        }

        Some(result)
    }

    /// Advances `head.next[i]` for `i = NUM_LEVELS-1` down to `1` past runs
    /// of marked (logically deleted) nodes. Level 0 is swung by
    /// `delete_min` itself, never here.
    fn restructure<'g>(&self, guard: &'g Guard) {
        let head = self.head.load(Ordering::Acquire, guard);
        let head_ref = unsafe { head.deref() };
        let tail = self.tail.load(Ordering::Relaxed, guard);

        for i in (1..NUM_LEVELS).rev() {
            loop {
                let h = head_ref.next[i].load(Ordering::Acquire, guard);
                // Full fence (the paper's CMB) between reading head.next[i]
                // and reading pred.next[i] below.
                fence(Ordering::SeqCst);

                let mut pred = head;
                let mut cur = unsafe { pred.deref() }.next[i].load(Ordering::Acquire, guard);

                if !is_marked(unsafe { h.deref() }.next[0].load(Ordering::Acquire, guard)) {
                    break;
                }

                while is_marked(unsafe { cur.deref() }.next[0].load(Ordering::Acquire, guard)) {
                    pred = cur;
                    cur = unsafe { pred.deref() }.next[i].load(Ordering::Acquire, guard);
                }
                debug_assert!(cur == tail || !is_marked(unsafe { cur.deref() }.next[0].load(Ordering::Acquire, guard)));

                match head_ref.next[i].compare_exchange(
                    h,
                    cur,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(_) => {
                        log::trace!("restructure: advanced level {i}");
                        break;
                    }
                    Err(_) => continue,
                }
            }
        }
    }

    /// Hands every node strictly between `from` and `to` to the reclaimer
    /// (crossbeam-epoch's `defer_destroy`, the safe-reclamation hook nodes
    /// are retired through after a successful head swing).
    fn reclaim_range<'g>(&self, from: Shared<'g, Node<K, V>>, to: Shared<'g, Node<K, V>>, guard: &'g Guard) {
        let mut cur = from;
        while cur != to {
            let cur_ref = unsafe { cur.deref() };
            let next = unmark(cur_ref.next[0].load(Ordering::Acquire, guard));
            unsafe { guard.defer_destroy(cur) };
            cur = next;
        }
    }

    /// Single-threaded snapshot read: walks level 0 from `head`, skipping
    /// any node reached through a marked edge. No guarantee under
    /// concurrent mutation.
    pub fn to_array(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let guard = &epoch::pin();
        let tail = self.tail.load(Ordering::Relaxed, guard);
        let head = self.head.load(Ordering::Acquire, guard);

        let mut result = Vec::new();
        let mut pred = head;
        let mut run_deleted = is_marked(unsafe { pred.deref() }.next[0].load(Ordering::Acquire, guard));

        loop {
            let cur = unmark(unsafe { pred.deref() }.next[0].load(Ordering::Acquire, guard));
            if cur == tail {
                break;
            }

            let cur_ref = unsafe { cur.deref() };
            let cur_next0 = cur_ref.next[0].load(Ordering::Acquire, guard);
            let cur_deleted = is_marked(cur_next0);

            if !run_deleted && !cur_deleted {
                let value = unsafe { cur_ref.value.load(Ordering::Acquire, guard).deref() }.clone();
                result.push((cur_ref.key().clone(), value));
            }

            pred = cur;
            run_deleted = cur_deleted;
        }

        result
    }
}

impl<K, V, G> Drop for PQueue<K, V, G> {
    fn drop(&mut self) {
        // Safe: `&mut self` means no other thread can hold a reference to
        // this queue, so every node reachable from `head` can be retired
        // unconditionally.
        let guard = &epoch::pin();
        let tail = self.tail.load(Ordering::Relaxed, guard);
        let mut cur = self.head.load(Ordering::Acquire, guard);

        loop {
            let cur_ref = unsafe { cur.deref() };
            let next = unmark(cur_ref.next[0].load(Ordering::Acquire, guard));
            let is_tail = cur == tail;
            unsafe { guard.defer_destroy(cur) };
            if is_tail {
                break;
            }
            cur = next;
        }
    }
}

// Send/Sync follow automatically from `Atomic<Node<K, V>>`'s own
// `Send + Sync where K: Send + Sync, V: Send + Sync` impls, plus `G`'s.
