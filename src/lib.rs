//! A lock-free, skiplist-based concurrent priority queue
//!
//! This crate implements the Lindén & Jonsson design ("A Skiplist-Based
//! Concurrent Priority Queue with Minimal Memory Contention"): a skiplist
//! keyed by an orderable `K` with values `V`, where deletions are batched
//! as pointer-marking on the bottom list level and the head is lazily
//! advanced past runs of logically deleted nodes to amortize pointer
//! surgery on the hot "min" end.
//!
//! - **Lock-free `insert`/`delete_min`**: every public operation is a
//!   bounded-retry CAS loop; no thread ever blocks another.
//! - **Epoch-based reclamation**: nodes are never freed while a concurrent
//!   reader might still hold a reference to them.
//! - **Batched deletion**: `delete_min` marks a node's outgoing pointer
//!   rather than physically unlinking it; physical unlinking is amortized
//!   across `max_offset` deletions by [`queue::PQueue`]'s `restructure` step.
//!
//! # Example
//!
//! ```
//! use concurrent_pqueue::PQueue;
//!
//! let q: PQueue<i32, &str> = PQueue::new(16);
//! q.insert(3, "three");
//! q.insert(1, "one");
//! q.insert(2, "two");
//!
//! assert_eq!(q.delete_min(), Some((1, "one")));
//! assert_eq!(q.to_array(), vec![(2, "two"), (3, "three")]);
//! ```

mod config;
mod level;
mod node;
mod queue;

pub use config::PQueueConfig;
pub use level::{GeometricLevelGenerator, LevelGenerator, NUM_LEVELS};
pub use queue::PQueue;
