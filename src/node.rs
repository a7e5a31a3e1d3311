//! Skiplist node and tagged-pointer primitives
//!
//! A tagged pointer is a `next[i]` slot whose low bit (crossbeam-epoch's
//! native `Shared::tag`) records whether the node owning that slot has had
//! its outgoing edge logically claimed by a deletion. Nodes are heap
//! allocated (8-byte aligned at minimum), so this bit is always free, and
//! `Atomic<T>`'s CAS already compares the full tagged word.

use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use std::sync::atomic::{AtomicBool, Ordering};

/// A node in the skiplist.
///
/// `key` is `None` only for the `head`/`tail` sentinels; every traversal
/// checks pointer identity against `tail` (and never treats `head` as a
/// successor) before dereferencing `.key`, so the sentinel arm is never hit
/// from key-comparison code.
pub(crate) struct Node<K, V> {
    pub(crate) key: Option<K>,
    /// Boxed and epoch-reclaimed so that a duplicate-key `insert` can swap
    /// it in a single atomic step: a plain, possibly-torn store of an
    /// arbitrary `V` has no safe Rust equivalent.
    pub(crate) value: Atomic<V>,
    pub(crate) level: usize,
    /// Set at construction, cleared (once) after all of this node's CAS
    /// splicing completes. Read with `Acquire`, cleared with `Release`;
    /// never needs a CAS of its own.
    pub(crate) inserting: AtomicBool,
    pub(crate) next: Box<[Atomic<Node<K, V>>]>,
}

impl<K, V> Node<K, V> {
    /// Creates a `head` or `tail` sentinel with `levels` next-pointer slots.
    pub(crate) fn sentinel(levels: usize) -> Self {
        Self {
            key: None,
            value: Atomic::null(),
            level: levels,
            inserting: AtomicBool::new(false),
            next: (0..levels).map(|_| Atomic::null()).collect(),
        }
    }

    /// Creates a live node for `key`/`value`, with `level` next-pointer
    /// slots all initialized to `tail` (unmarked).
    pub(crate) fn new<'g>(key: K, value: V, level: usize, tail: Shared<'g, Node<K, V>>) -> Self {
        Self {
            key: Some(key),
            value: Atomic::new(value),
            level,
            inserting: AtomicBool::new(true),
            next: (0..level).map(|_| Atomic::from(tail)).collect(),
        }
    }

    /// The node's key. Must only be called on a node already known (by
    /// pointer identity) to not be `tail`, and never on `head`.
    pub(crate) fn key(&self) -> &K {
        self.key
            .as_ref()
            .expect("key() called on a sentinel node")
    }

    pub(crate) fn is_inserting(&self) -> bool {
        self.inserting.load(Ordering::Acquire)
    }

    pub(crate) fn clear_inserting(&self) {
        self.inserting.store(false, Ordering::Release);
    }
}

impl<K, V> Drop for Node<K, V> {
    fn drop(&mut self) {
        // `Atomic<T>` never frees its pointee on its own; by the time a
        // node's own `Drop` runs (via a deferred destroy or an un-published
        // `Owned` falling out of scope), no thread can still be
        // dereferencing it, so its boxed value can be reclaimed directly.
        let value = self
            .value
            .swap(Shared::null(), Ordering::Relaxed, unsafe { epoch::unprotected() });
        if !value.is_null() {
            unsafe { drop(value.into_owned()) };
        }
    }
}

/// `true` if the tagged pointer's mark bit is set: the node owning this
/// slot has had its outgoing edge logically claimed by a deletion.
#[inline]
pub(crate) fn is_marked<T>(p: Shared<'_, T>) -> bool {
    p.tag() == 1
}

/// Returns `p` with the mark bit cleared.
#[inline]
pub(crate) fn unmark<'g, T>(p: Shared<'g, T>) -> Shared<'g, T> {
    p.with_tag(0)
}

/// Returns `p` with the mark bit set.
#[inline]
pub(crate) fn mark<'g, T>(p: Shared<'g, T>) -> Shared<'g, T> {
    p.with_tag(1)
}

/// Atomically sets the mark bit on `slot` via a CAS retry loop (the
/// crossbeam-epoch equivalent of a `fetch_or` on the tag bit: `Atomic<T>`
/// exposes no raw fetch-or, so the same effect, "set the bit, tell me
/// whether I was the one who set it," is achieved by retrying the load
/// whenever a concurrent racer gets there first).
///
/// Returns the pre-mark value of `slot`, exactly as `fetch_or` would.
pub(crate) fn mark_slot<'g, T>(
    slot: &Atomic<T>,
    guard: &'g Guard,
) -> Shared<'g, T> {
    loop {
        let current = slot.load(Ordering::Acquire, guard);
        if is_marked(current) {
            return current;
        }
        let marked = mark(current);
        match slot.compare_exchange(
            current,
            marked,
            Ordering::AcqRel,
            Ordering::Acquire,
            guard,
        ) {
            Ok(_) => return current,
            Err(_) => continue,
        }
    }
}

/// Allocates a new live node and leaves it unshared (not yet linked into
/// any list): cheap to drop and retry if a CAS at level 0 fails before the
/// node is published.
pub(crate) fn new_owned<'g, K, V>(
    key: K,
    value: V,
    level: usize,
    tail: Shared<'g, Node<K, V>>,
) -> Owned<Node<K, V>> {
    Owned::new(Node::new(key, value, level, tail))
}
