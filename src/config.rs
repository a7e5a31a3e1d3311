//! Configuration for the priority queue

/// Configuration options for a [`PQueue`](crate::PQueue)
///
/// # Example
///
/// ```
/// use concurrent_pqueue::PQueueConfig;
///
/// let config = PQueueConfig {
///     max_offset: 128,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PQueueConfig {
    /// Number of `delete_min` calls between `restructure` attempts.
    ///
    /// This is the number of deletions *between* head-advancement attempts,
    /// not a hard bound: concurrent deleters may each independently reach
    /// the threshold and each trigger a `restructure` pass. A smaller value
    /// reclaims memory sooner at the cost of more contention on `head`; a
    /// larger value amortizes that surgery further but lets more
    /// logically-deleted nodes pile up between the real head and the list.
    pub max_offset: usize,
}

impl Default for PQueueConfig {
    fn default() -> Self {
        Self { max_offset: 64 }
    }
}
