//! Concurrent writer / reader behaviour of the journal

use journal::{Journal, JournalConfig, RetentionPolicy};
use ml_core::{ChangeRecord, Dtype, LostChangesReason, SmallChange};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Record path encodes `batch/index/len` so readers can check batch integrity
fn batch(batch: usize, len: usize) -> Vec<ChangeRecord> {
    (0..len)
        .map(|i| ChangeRecord::modified(Dtype::Regular, format!("{}/{}/{}", batch, i, len).as_str()))
        .collect()
}

fn decode(change: &ChangeRecord) -> (usize, usize, usize) {
    let path = match change.as_small() {
        Some(SmallChange::Modified { path, .. }) => path.to_string_lossy(),
        other => panic!("unexpected change {:?}", other),
    };
    let parts: Vec<usize> = path.split('/').map(|p| p.parse().unwrap()).collect();
    (parts[0], parts[1], parts[2])
}

#[test]
fn readers_never_see_partial_batches() {
    let journal = Arc::new(Journal::with_config(JournalConfig {
        retention: RetentionPolicy::unlimited(),
        ..JournalConfig::default()
    }));
    let start = journal.current_position().unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let journal = Arc::clone(&journal);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut rng = ChaCha8Rng::seed_from_u64(7);
            for n in 0..500 {
                let len = rng.gen_range(1..=6);
                journal.append(batch(n, len)).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let journal = Arc::clone(&journal);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut last_seen = start;
                loop {
                    let finished = done.load(Ordering::SeqCst);
                    let result = journal.changes_since_result(&start).unwrap();

                    // position never runs ahead of visible entries
                    assert_eq!(
                        result.to_position.sequence() as usize,
                        result.changes.len()
                    );
                    assert!(result.to_position >= last_seen);
                    last_seen = result.to_position;

                    let mut expected_batch = 0;
                    let mut i = 0;
                    while i < result.changes.len() {
                        let (b, idx, len) = decode(&result.changes[i]);
                        assert_eq!(b, expected_batch);
                        assert_eq!(idx, 0);
                        for k in 0..len {
                            let (b2, idx2, _) = decode(&result.changes[i + k]);
                            assert_eq!((b2, idx2), (b, k));
                        }
                        i += len;
                        expected_batch += 1;
                    }

                    if finished {
                        assert_eq!(expected_batch, 500);
                        break;
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn concurrent_writers_are_totally_ordered() {
    let journal = Arc::new(Journal::new());
    let start = journal.current_position().unwrap();

    let writers: Vec<_> = (0..8)
        .map(|w| {
            let journal = Arc::clone(&journal);
            thread::spawn(move || {
                let mut positions = Vec::new();
                for n in 0..100 {
                    positions.push(journal.append(batch(w * 1000 + n, 2)).unwrap());
                }
                positions
            })
        })
        .collect();

    let mut all_positions = Vec::new();
    for writer in writers {
        let positions = writer.join().unwrap();
        // each writer observes its own appends in increasing order
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        all_positions.extend(positions);
    }

    // every batch got a distinct end position
    all_positions.sort();
    all_positions.dedup();
    assert_eq!(all_positions.len(), 800);

    let changes = journal.changes_since(&start).unwrap();
    assert_eq!(changes.len(), 1600);
    for pair in changes.chunks(2) {
        let (b0, i0, _) = decode(&pair[0]);
        let (b1, i1, _) = decode(&pair[1]);
        assert_eq!((b0, i0), (b1, 0));
        assert_eq!(i1, 1);
    }
}

#[test]
fn query_racing_remount_sees_one_generation() {
    let journal = Arc::new(Journal::new());
    let start = journal.current_position().unwrap();
    journal.append(batch(0, 3)).unwrap();

    let remounter = {
        let journal = Arc::clone(&journal);
        thread::spawn(move || {
            for _ in 0..50 {
                journal.remount().unwrap();
                journal.append(batch(1, 2)).unwrap();
            }
        })
    };

    for _ in 0..200 {
        let result = journal.changes_since_result(&start).unwrap();
        if result.to_position.generation() == start.generation() {
            assert_eq!(result.changes.len(), 3);
        } else {
            assert_eq!(
                result.changes,
                vec![ChangeRecord::lost(LostChangesReason::Remounted)]
            );
        }
    }

    remounter.join().unwrap();
}

#[test]
fn position_is_monotonic_under_random_load() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let journal = Journal::with_config(JournalConfig {
        retention: RetentionPolicy::entries(16),
        ..JournalConfig::default()
    });
    let mut last = journal.current_position().unwrap();

    for n in 0..1_000 {
        let len = rng.gen_range(0..4);
        journal.append(batch(n, len)).unwrap();
        let now = journal.current_position().unwrap();
        assert!(now >= last);
        last = now;

        let stats = journal.stats().unwrap();
        assert!(stats.entry_count <= 16);
        assert!(stats.entry_count >= 1 || now.sequence() == 0);
    }
}
