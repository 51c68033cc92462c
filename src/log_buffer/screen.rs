//! Line model with a terminal-style write cursor.
//!
//! A [`Screen`] holds at most `capacity` rendered lines and a cursor naming
//! the next row to write. A small subset of ANSI CSI sequences moves that
//! cursor, which lets progress-bar output overwrite its own rows:
//!
//! | Sequence     | Effect                                  |
//! |--------------|-----------------------------------------|
//! | `ESC [ N A`  | cursor up `N` rows (floored at 0)       |
//! | `ESC [ 2 J`  | drop every line, cursor to 0            |
//! | `ESC [ H`    | cursor to 0, content kept               |
//!
//! Every other CSI sequence is stripped.

use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

/// Matches `ESC [ N A` and captures `N`.
static CURSOR_UP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[(\d+)A").expect("cursor-up pattern is valid"));

/// Matches any CSI sequence: parameter bytes, intermediate bytes, final letter.
static CSI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-?]*[ -/]*[A-Za-z]").expect("CSI pattern is valid"));

const CLEAR_SCREEN: &str = "\x1b[2J";
const CURSOR_HOME: &str = "\x1b[H";

/// Bounded lines plus write cursor.
///
/// Invariants: `lines.len() <= capacity` and `cursor <= lines.len()`.
#[derive(Debug, Clone)]
pub(crate) struct Screen {
    lines: VecDeque<String>,
    cursor: usize,
    capacity: usize,
}

impl Screen {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            cursor: 0,
            capacity,
        }
    }

    /// Append a fully formed line after the last row.
    pub(crate) fn push_line(&mut self, line: &str) {
        self.cursor = self.lines.len();
        self.write_line(line.to_string());
    }

    /// Interpret a chunk of raw child output, fragment by fragment.
    pub(crate) fn feed(&mut self, raw: &str) {
        for fragment in raw.split('\n') {
            self.apply_controls(fragment);
            let text = strip_ansi(fragment);
            let text = text.trim_end_matches('\r');
            if !text.trim().is_empty() {
                self.write_line(text.to_string());
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.lines.clear();
        self.cursor = 0;
    }

    pub(crate) fn snapshot(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    fn apply_controls(&mut self, fragment: &str) {
        if !fragment.contains('\x1b') {
            return;
        }

        for caps in CURSOR_UP.captures_iter(fragment) {
            // Counts too large for usize move the cursor all the way up.
            let rows = caps[1].parse::<usize>().unwrap_or(usize::MAX);
            self.cursor = self.cursor.saturating_sub(rows);
        }
        if fragment.contains(CLEAR_SCREEN) {
            self.clear();
        }
        if fragment.contains(CURSOR_HOME) {
            self.cursor = 0;
        }
    }

    fn write_line(&mut self, line: String) {
        if self.cursor < self.lines.len() {
            self.lines[self.cursor] = line;
            self.cursor += 1;
        } else {
            self.lines.push_back(line);
            self.cursor = self.lines.len();
        }

        if self.lines.len() > self.capacity {
            let overflow = self.lines.len() - self.capacity;
            self.lines.drain(..overflow);
            self.cursor = self.cursor.saturating_sub(overflow);
        }
    }
}

/// Remove every CSI escape sequence from `text`.
pub fn strip_ansi(text: &str) -> std::borrow::Cow<'_, str> {
    CSI.replace_all(text, "")
}
