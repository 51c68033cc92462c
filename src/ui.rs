//! Terminal output: error boxes and the live log view.

use crossterm::{cursor, queue, terminal};
use std::io::{self, IsTerminal, Write};

/// Width of error box separators.
const ERROR_BOX_WIDTH: usize = 60;

/// Print an error box with a title and optional detail text.
///
/// Outputs:
/// ```text
/// ============================================================
/// Start failed
/// ============================================================
///
/// <detail>
/// ```
pub fn print_error_box(title: &str, detail: Option<&str>) {
    eprintln!("\n{}", "=".repeat(ERROR_BOX_WIDTH));
    eprintln!("{title}");
    eprintln!("{}", "=".repeat(ERROR_BOX_WIDTH));

    if let Some(detail) = detail
        && !detail.is_empty()
    {
        eprintln!("\n{detail}");
    }
}

/// The last `limit` log lines, a separator, then the status lines.
pub fn compose_frame(lines: &[String], limit: usize, status: &[String]) -> Vec<String> {
    let start = lines.len().saturating_sub(limit);
    let mut frame = Vec::with_capacity(limit.min(lines.len()) + status.len() + 1);
    frame.extend(lines[start..].iter().cloned());
    if !status.is_empty() {
        frame.push("-".repeat(ERROR_BOX_WIDTH));
        frame.extend(status.iter().cloned());
    }
    frame
}

/// Redraws the log tail and status in place.
///
/// On a terminal each frame replaces the previous one. Otherwise frames are
/// appended, and only when they differ from the last one written.
pub struct LiveView<W: Write> {
    out: W,
    limit: usize,
    interactive: bool,
    last_frame: Vec<String>,
}

impl LiveView<io::Stdout> {
    /// View on stdout, redrawing in place if stdout is a terminal.
    pub fn stdout(limit: usize) -> Self {
        let out = io::stdout();
        let interactive = out.is_terminal();
        Self::new(out, limit, interactive)
    }
}

impl<W: Write> LiveView<W> {
    pub fn new(out: W, limit: usize, interactive: bool) -> Self {
        Self {
            out,
            limit: limit.max(1),
            interactive,
            last_frame: Vec::new(),
        }
    }

    /// Draw one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the output fails.
    pub fn render(&mut self, lines: &[String], status: &[String]) -> io::Result<()> {
        let frame = compose_frame(lines, self.visible_lines(status.len()), status);
        if frame == self.last_frame {
            return Ok(());
        }

        if self.interactive {
            queue!(
                self.out,
                cursor::MoveTo(0, 0),
                terminal::Clear(terminal::ClearType::All)
            )?;
            for line in &frame {
                queue!(self.out, terminal::Clear(terminal::ClearType::CurrentLine))?;
                write!(self.out, "{line}\r\n")?;
            }
        } else {
            for line in &frame {
                writeln!(self.out, "{line}")?;
            }
            writeln!(self.out)?;
        }
        self.out.flush()?;
        self.last_frame = frame;
        Ok(())
    }

    /// Lines of log that fit above the status block.
    fn visible_lines(&self, status_len: usize) -> usize {
        if !self.interactive {
            return self.limit;
        }
        match terminal::size() {
            Ok((_, rows)) => {
                let reserved = status_len + 2;
                self.limit.min(usize::from(rows).saturating_sub(reserved).max(1))
            },
            Err(_) => self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_compose_frame_keeps_tail() {
        let frame = compose_frame(&lines(&["a", "b", "c"]), 2, &lines(&["Status: Stopped"]));
        assert_eq!(frame[0], "b");
        assert_eq!(frame[1], "c");
        assert_eq!(frame.last().unwrap(), "Status: Stopped");
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn test_compose_frame_without_status() {
        let frame = compose_frame(&lines(&["a"]), 10, &[]);
        assert_eq!(frame, lines(&["a"]));
    }

    #[test]
    fn test_plain_output_skips_identical_frames() {
        let mut view = LiveView::new(Vec::new(), 5, false);
        let status = lines(&["Status: Stopped"]);

        view.render(&lines(&["one"]), &status).unwrap();
        view.render(&lines(&["one"]), &status).unwrap();
        view.render(&lines(&["one", "two"]), &status).unwrap();

        let out = String::from_utf8(view.out).unwrap();
        assert_eq!(out.matches("one").count(), 2);
        assert_eq!(out.matches("two").count(), 1);
    }

    #[test]
    fn test_interactive_output_clears_screen() {
        let mut view = LiveView::new(Vec::new(), 5, true);
        view.render(&lines(&["one"]), &lines(&["Status: Stopped"])).unwrap();

        let out = String::from_utf8(view.out).unwrap();
        assert!(out.contains("\x1b[2J"));
        assert!(out.contains("one\r\n"));
    }
}
