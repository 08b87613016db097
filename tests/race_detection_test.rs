// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Race Detection Tests for mindguard
//!
//! These tests hammer the shared pieces from many threads and tasks at once.
//! They are most useful under ThreadSanitizer:
//!
//! ```bash
//! RUSTFLAGS="-Z sanitizer=thread" cargo +nightly test --target x86_64-unknown-linux-gnu --test race_detection_test
//! ```

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mindguard::companion::{Classifier, Conversation, ReplyDelays};
use mindguard::storage::{read_json, write_json, FileStorage, MemoryStorage, Storage};
use tokio::time::timeout;

// Test configuration
const CONCURRENCY_LEVEL: usize = 16;
const ITERATIONS_PER_TASK: usize = 25;
const TEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// FILE STORAGE
// =============================================================================

#[test]
fn test_file_storage_concurrent_writers_never_tear() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStorage::open(dir.path()).unwrap());

    let handles: Vec<_> = (0..CONCURRENCY_LEVEL)
        .map(|writer| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..ITERATIONS_PER_TASK {
                    let value = vec![writer; 64 + i];
                    write_json(&*store, "shared", &value).unwrap();
                    let read: Vec<usize> = read_json(&*store, "shared").unwrap().unwrap();
                    // Whole values only: every element comes from the same writer.
                    assert!(read.windows(2).all(|w| w[0] == w[1]));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_separate_handles_share_the_lock() {
    let dir = tempfile::tempdir().unwrap();

    let handles: Vec<_> = (0..CONCURRENCY_LEVEL)
        .map(|writer| {
            let path = dir.path().to_path_buf();
            thread::spawn(move || {
                let store = FileStorage::open(path).unwrap();
                for _ in 0..ITERATIONS_PER_TASK {
                    store.set_item("k", &format!("\"{}\"", writer)).unwrap();
                    let raw = store.get_item("k").unwrap().unwrap();
                    assert!(raw.starts_with('"') && raw.ends_with('"'));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

#[test]
fn test_memory_storage_concurrent_access() {
    let store = Arc::new(MemoryStorage::new());

    let handles: Vec<_> = (0..CONCURRENCY_LEVEL)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..ITERATIONS_PER_TASK {
                    let key = format!("k{}-{}", t, i);
                    store.set_item(&key, "v").unwrap();
                    assert_eq!(store.get_item(&key).unwrap().as_deref(), Some("v"));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.len(), CONCURRENCY_LEVEL * ITERATIONS_PER_TASK);
}

// =============================================================================
// CONVERSATION
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_all_land() {
    let delays = ReplyDelays {
        greeting: Duration::ZERO,
        min: Duration::from_millis(1),
        max: Duration::from_millis(5),
    };
    let convo = Arc::new(Conversation::new(Arc::new(Classifier::new()), delays));

    let result = timeout(Duration::from_secs(TEST_TIMEOUT_SECS), async {
        let mut handles = Vec::new();
        for i in 0..CONCURRENCY_LEVEL * 4 {
            handles.push(convo.send(&format!("message {}", i)).unwrap());
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
    })
    .await;

    assert!(result.is_ok(), "replies did not arrive in time");
    assert_eq!(convo.messages().len(), CONCURRENCY_LEVEL * 8);
    assert!(!convo.is_composing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_races_pending_replies() {
    let delays = ReplyDelays {
        greeting: Duration::ZERO,
        min: Duration::from_millis(20),
        max: Duration::from_millis(40),
    };
    let convo = Conversation::new(Arc::new(Classifier::new()), delays);

    let handles: Vec<_> = (0..CONCURRENCY_LEVEL)
        .filter_map(|i| convo.send(&format!("hi {}", i)))
        .collect();
    convo.close();

    for handle in handles {
        assert!(handle.await.unwrap().is_none());
    }
    assert_eq!(convo.messages().len(), CONCURRENCY_LEVEL);
    assert!(!convo.is_composing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_nothing_lands_after_close_returns() {
    for _ in 0..ITERATIONS_PER_TASK {
        let convo = Conversation::new(Arc::new(Classifier::new()), ReplyDelays::immediate());
        let handles: Vec<_> = (0..CONCURRENCY_LEVEL)
            .filter_map(|i| convo.send(&format!("hi {}", i)))
            .collect();
        tokio::task::yield_now().await;

        convo.close();
        let at_close = convo.messages().len();

        let mut delivered = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                delivered += 1;
            }
        }
        assert_eq!(convo.messages().len(), at_close);
        assert_eq!(at_close, CONCURRENCY_LEVEL + delivered);
    }
}
