//! Random level generation for new skiplist nodes
//!
//! spec treats level generation as an external collaborator rather than
//! part of the hard-engineering core, so it is expressed here as a trait a
//! [`PQueue`](crate::PQueue) is generic over, with [`GeometricLevelGenerator`]
//! as the default (geometric, p=½, matching the paper).

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Maximum height of the skiplist.
///
/// Every node carries `NUM_LEVELS` next-pointer slots in the worst case;
/// `head` and `tail` always use all of them.
pub const NUM_LEVELS: usize = 32;

/// Draws the height of a newly inserted node.
///
/// Implementations must return a value in `1..=NUM_LEVELS`. A value outside
/// that range is a collaborator contract violation: the queue clamps it
/// (logging a warning) rather than treating it as fatal, consistent with
/// the rest of the crate never surfacing an `Err` for a misbehaving
/// external collaborator.
pub trait LevelGenerator {
    /// Returns a new node height in `1..=NUM_LEVELS`.
    fn next_level(&self) -> usize;
}

/// Geometric level generator with p=½, per Lindén & Jonsson.
///
/// Draws `1`, then keeps incrementing while a fair coin flip keeps coming up
/// heads, capping at [`NUM_LEVELS`]. This gives the expected `O(log n)`
/// level distribution the skiplist's complexity bounds rely on.
pub struct GeometricLevelGenerator {
    rng: Mutex<StdRng>,
}

impl GeometricLevelGenerator {
    /// Creates a generator seeded from the system entropy source.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl Default for GeometricLevelGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelGenerator for GeometricLevelGenerator {
    fn next_level(&self) -> usize {
        let mut level = 1;
        let mut rng = self.rng.lock();

        while level < NUM_LEVELS && rng.gen_ratio(1, 2) {
            level += 1;
        }

        level
    }
}
