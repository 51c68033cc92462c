//! Loom-based concurrency tests for the log screen.
//!
//! Explores every interleaving of concurrent writers sharing one [`Screen`]
//! behind a mutex, the same way [`LogBuffer`](super::LogBuffer) shares it.
//!
//! # Running Tests
//!
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test --release loom_tests
//! ```

#[cfg(loom)]
mod tests {
    use loom::sync::{Arc, Mutex};
    use loom::thread;

    use super::super::screen::Screen;

    /// Two producers feeding complete lines never lose or tear a line.
    #[test]
    fn concurrent_feeds_keep_whole_lines() {
        loom::model(|| {
            let screen = Arc::new(Mutex::new(Screen::new(8)));

            let s1 = screen.clone();
            let t1 = thread::spawn(move || {
                s1.lock().unwrap().feed("out-1\n");
            });
            let s2 = screen.clone();
            let t2 = thread::spawn(move || {
                s2.lock().unwrap().feed("err-1\n");
            });

            t1.join().unwrap();
            t2.join().unwrap();

            let screen = screen.lock().unwrap();
            let mut lines = screen.lines();
            lines.sort();
            assert_eq!(lines, vec!["err-1", "out-1"]);
            assert_eq!(screen.cursor(), 2);
        });
    }

    /// A cursor-up from one writer racing an append from another keeps the
    /// cursor within bounds and the length within capacity.
    #[test]
    fn cursor_up_races_append() {
        loom::model(|| {
            let screen = Arc::new(Mutex::new(Screen::new(3)));
            screen.lock().unwrap().feed("a\nb\n");

            let s1 = screen.clone();
            let t1 = thread::spawn(move || {
                s1.lock().unwrap().feed("\u{1b}[2A\nX\n");
            });
            let s2 = screen.clone();
            let t2 = thread::spawn(move || {
                s2.lock().unwrap().push_line("[info] pid: 42");
            });

            t1.join().unwrap();
            t2.join().unwrap();

            let screen = screen.lock().unwrap();
            assert_eq!(screen.len(), 3);
            assert!(screen.cursor() <= screen.len());
            assert!(screen.lines().iter().any(|l| l == "X"));
        });
    }
}
