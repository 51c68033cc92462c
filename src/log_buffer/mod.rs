//! Terminal-aware log buffer shared by producers and viewers.
//!
//! [`LogBuffer`] is a cheap-to-clone handle. One buffer is created at startup
//! and handed to the supervisor (which feeds it child output) and to every
//! viewer (which reads snapshots or subscribes to changes).
//!
//! ## Concurrency
//!
//! All mutations go through one mutex held only for the read-modify-write of
//! lines and cursor. Subscribers are called after that lock is released, on
//! the thread that made the change. A panicking subscriber is logged and
//! skipped; it neither poisons the buffer nor stops later notifications.
//!
//! ## Module Structure
//!
//! - [`screen`]: line storage and ANSI cursor interpretation
//! - `loom_tests`: model checks of concurrent writers (`--cfg loom`)

mod loom_tests;
mod screen;

pub use screen::strip_ansi;

use parking_lot::{Mutex, RwLock};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use screen::Screen;

/// Default number of retained lines.
pub const DEFAULT_CAPACITY: usize = 200;

/// Callback receiving the full buffer text after each change.
pub type Subscriber = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`LogBuffer::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Inner {
    screen: Mutex<Screen>,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

/// Bounded, ANSI-aware line buffer with change notification.
#[derive(Clone)]
pub struct LogBuffer {
    inner: Arc<Inner>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let screen = self.inner.screen.lock();
        f.debug_struct("LogBuffer")
            .field("len", &screen.len())
            .field("cursor", &screen.cursor())
            .field("capacity", &screen.capacity())
            .field("subscribers", &self.inner.subscribers.read().len())
            .finish()
    }
}

impl LogBuffer {
    /// Buffer retaining [`DEFAULT_CAPACITY`] lines.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Buffer retaining at most `capacity` lines (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                screen: Mutex::new(Screen::new(capacity)),
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Append one line verbatim, after the last row.
    ///
    /// No escape sequences are interpreted. Used for the supervisor's own
    /// `[info]`/`[warn]` messages.
    pub fn append(&self, line: &str) {
        self.mutate(|screen| screen.push_line(line));
    }

    /// Feed raw child output, honoring cursor-up, clear-screen and home.
    pub fn append_raw(&self, raw: &str) {
        self.mutate(|screen| screen.feed(raw));
    }

    /// Drop all lines and reset the cursor.
    pub fn clear(&self) {
        self.mutate(Screen::clear);
    }

    /// Lines joined with `\n`, as of one point in time.
    pub fn get(&self) -> String {
        self.inner.screen.lock().snapshot()
    }

    /// Current lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.inner.screen.lock().lines()
    }

    pub fn len(&self) -> usize {
        self.inner.screen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row the next raw line will be written to.
    pub fn cursor(&self) -> usize {
        self.inner.screen.lock().cursor()
    }

    pub fn capacity(&self) -> usize {
        self.inner.screen.lock().capacity()
    }

    /// Register a callback for every subsequent change.
    ///
    /// Callbacks run on the writing thread after the buffer lock is
    /// released. With concurrent writers, snapshots may arrive out of order;
    /// a subscriber that must show the latest state should read it back
    /// with [`lines`](Self::lines) or [`get`](Self::get).
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .subscribers
            .write()
            .push((id, Arc::new(subscriber)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    fn mutate(&self, f: impl FnOnce(&mut Screen)) {
        let snapshot = {
            let mut screen = self.inner.screen.lock();
            f(&mut screen);
            screen.snapshot()
        };
        self.notify(&snapshot);
    }

    fn notify(&self, snapshot: &str) {
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();

        for subscriber in subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(snapshot))).is_err() {
                warn!("Log subscriber panicked; continuing with remaining subscribers");
            }
        }
    }
}
