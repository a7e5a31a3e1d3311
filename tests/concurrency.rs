//! Multithreaded scenarios and a lock-freedom smoke test, using plain OS
//! threads: the model this queue is built against.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use concurrent_pqueue::PQueue;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn single_threaded_8000_then_7200_drains() {
    init_logging();
    let q: PQueue<i64, i64> = PQueue::new(64);
    for i in 1..8000 {
        q.insert(i, i);
    }
    for i in 1..7200 {
        assert_eq!(q.delete_min(), Some((i, i)));
    }

    let remaining = q.to_array();
    assert_eq!(remaining.len(), 800);
    let expected: Vec<(i64, i64)> = (7200..8000).map(|i| (i, i)).collect();
    assert_eq!(remaining, expected);
}

#[test]
fn eight_threads_disjoint_inserts_yield_sorted_8000() {
    let q = Arc::new(PQueue::<i64, i64>::new(64));

    thread::scope(|scope| {
        for t in 0..8i64 {
            let q = Arc::clone(&q);
            scope.spawn(move || {
                for k in (t * 1000 + 1)..=(t * 1000 + 1000) {
                    q.insert(k, k);
                }
            });
        }
    });

    let snapshot = q.to_array();
    assert_eq!(snapshot.len(), 8000);
    let expected: Vec<(i64, i64)> = (1..=8000).map(|i| (i, i)).collect();
    assert_eq!(snapshot, expected);
}

#[test]
fn eight_threads_delete_min_partition_the_prefix() {
    let q = Arc::new(PQueue::<i64, i64>::new(64));
    for i in 1..8000 {
        q.insert(i, i);
    }

    let results: Vec<Vec<(i64, i64)>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let q = Arc::clone(&q);
                scope.spawn(move || {
                    let mut mine = Vec::with_capacity(900);
                    for _ in 0..900 {
                        if let Some(pair) = q.delete_min() {
                            mine.push(pair);
                        }
                    }
                    mine
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // 8 threads x 900 delete_mins = 7200 attempts against a 7999-element
    // queue (keys 1..8000 exclusive), so every attempt succeeds.
    let mut all: Vec<(i64, i64)> = results.into_iter().flatten().collect();
    assert_eq!(all.len(), 7200);

    let unique: HashSet<i64> = all.iter().map(|(k, _)| *k).collect();
    assert_eq!(unique.len(), all.len());
    assert!(all.iter().all(|(k, _)| (1..=7200).contains(k)));

    all.sort_unstable();
    for (k, v) in &all {
        assert_eq!(k, v);
    }

    let remaining = q.to_array();
    let expected_remaining: Vec<(i64, i64)> = (7201..8000).map(|i| (i, i)).collect();
    assert_eq!(remaining, expected_remaining);
}

#[test]
fn mixed_insert_delete_workload_conserves_the_multiset() {
    let q = Arc::new(PQueue::<i64, i64>::new(64));

    let deleted: Arc<std::sync::Mutex<Vec<(i64, i64)>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

    thread::scope(|scope| {
        for t in 0..8i64 {
            let q = Arc::clone(&q);
            scope.spawn(move || {
                for k in (t * 1000 + 1)..=(t * 1000 + 1000) {
                    q.insert(k, k);
                }
            });
        }

        for _ in 0..8 {
            let q = Arc::clone(&q);
            let deleted = Arc::clone(&deleted);
            scope.spawn(move || {
                let mut mine = Vec::with_capacity(100);
                for _ in 0..100 {
                    if let Some(pair) = q.delete_min() {
                        mine.push(pair);
                    }
                }
                deleted.lock().unwrap().extend(mine);
            });
        }
    });

    let deleted = deleted.lock().unwrap();
    let mut seen: HashSet<i64> = deleted.iter().map(|(k, _)| *k).collect();
    let remaining = q.to_array();
    seen.extend(remaining.iter().map(|(k, _)| *k));

    assert_eq!(seen.len(), deleted.len() + remaining.len());
    assert_eq!(seen, (1..=8000).collect::<HashSet<_>>());
}

/// Lock-freedom smoke test (invariant 6): N threads each attempting M ops
/// complete all of them within a generous bound. A livelocked or deadlocked
/// implementation would time out here.
#[test]
fn bounded_contention_completes_all_ops() {
    const THREADS: usize = 16;
    const OPS_PER_THREAD: usize = 2000;

    let q = Arc::new(PQueue::<i64, i64>::new(64));
    let completed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..THREADS as i64 {
            let q = Arc::clone(&q);
            let completed = Arc::clone(&completed);
            scope.spawn(move || {
                for i in 0..OPS_PER_THREAD as i64 {
                    if i % 2 == 0 {
                        q.insert(t * OPS_PER_THREAD as i64 + i, i);
                    } else {
                        q.delete_min();
                    }
                    completed.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    assert_eq!(completed.load(Ordering::Relaxed), THREADS * OPS_PER_THREAD);
    assert!(start.elapsed() < Duration::from_secs(30));
}
