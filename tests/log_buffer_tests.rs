//! Log buffer behavior under concurrency and arbitrary input.
//!
//! # Tested Invariants
//!
//! - The buffer never holds more lines than its capacity
//! - The cursor never points past the last line
//! - Plain lines come back exactly, newest `capacity` of them, in order
//! - Concurrent writers never lose or tear lines

use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use nodpi_supervisor::log_buffer::{LogBuffer, strip_ansi};

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_writers_keep_every_line() {
    let logs = LogBuffer::with_capacity(2000);
    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|tag| {
            let logs = logs.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    logs.append_raw(&format!("{tag}-{i}\n"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let lines = logs.lines();
    assert_eq!(lines.len(), 1000);
    for tag in ["a", "b"] {
        let ours: Vec<&String> = lines.iter().filter(|l| l.starts_with(tag)).collect();
        assert_eq!(ours.len(), 500);
        for (i, line) in ours.iter().enumerate() {
            assert_eq!(**line, format!("{tag}-{i}"));
        }
    }
}

#[test]
fn test_subscriber_sees_every_change_from_all_threads() {
    let logs = LogBuffer::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    logs.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let logs = logs.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    logs.append(&format!("[info] thread {t} line {i}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 200);
}

#[test]
fn test_subscriber_can_read_buffer() {
    let logs = LogBuffer::new();
    let reader = logs.clone();
    let seen = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&seen);

    // Called outside the buffer lock, so reading back must not deadlock
    logs.subscribe(move |snapshot| {
        assert_eq!(reader.get(), snapshot);
        sink.fetch_add(1, Ordering::SeqCst);
    });
    logs.append("[info] started");

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Eviction
// =============================================================================

#[test]
fn test_default_capacity_keeps_newest_200_lines() {
    let logs = LogBuffer::new();
    for i in 0..450 {
        logs.append_raw(&format!("line {i}\n"));
    }

    let lines = logs.lines();
    assert_eq!(logs.len(), 200);
    assert_eq!(lines.first().unwrap(), "line 250");
    assert_eq!(lines.last().unwrap(), "line 449");
    assert_eq!(logs.cursor(), 200);
}

// =============================================================================
// Property Tests
// =============================================================================

/// Output chunks mixing text, cursor movement and screen control.
fn chunk() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z ]{0,12}\n",
        "[a-z]{1,8}",
        r"\x1b\[[0-9]{1,3}A",
        Just("\x1b[2J".to_string()),
        Just("\x1b[H".to_string()),
        Just("\x1b[32mok\x1b[0m\r\n".to_string()),
        Just("\n".to_string()),
    ]
}

proptest! {
    #[test]
    fn prop_capacity_and_cursor_bounds(
        capacity in 1usize..20,
        chunks in prop::collection::vec(chunk(), 0..60),
    ) {
        let logs = LogBuffer::with_capacity(capacity);
        for chunk in &chunks {
            logs.append_raw(chunk);
            prop_assert!(logs.len() <= capacity);
            prop_assert!(logs.cursor() <= logs.len());
        }
    }

    #[test]
    fn prop_plain_lines_round_trip(
        capacity in 1usize..30,
        lines in prop::collection::vec("[a-zA-Z0-9][a-zA-Z0-9 .:]{0,20}", 0..60),
    ) {
        let logs = LogBuffer::with_capacity(capacity);
        for line in &lines {
            logs.append_raw(&format!("{line}\n"));
        }

        let expected: Vec<String> = lines
            .iter()
            .skip(lines.len().saturating_sub(capacity))
            .cloned()
            .collect();
        prop_assert_eq!(logs.lines(), expected);
    }

    #[test]
    fn prop_snapshots_contain_no_escapes(chunks in prop::collection::vec(chunk(), 0..40)) {
        let logs = LogBuffer::new();
        for chunk in &chunks {
            logs.append_raw(chunk);
        }
        let text = logs.get();
        prop_assert!(!text.contains('\x1b'));
        prop_assert_eq!(strip_ansi(&text), text.as_str());
    }
}
