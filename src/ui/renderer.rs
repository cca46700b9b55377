//! Incremental line renderer
//!
//! Emits the minimal byte diff that transforms the previously rendered
//! frame into the new one, instead of clearing and reprinting. Works on
//! dumb terminals too: when ANSI is unavailable every motion degrades to
//! backspaces and re-echoed characters. The correctness contract is that
//! replaying the emitted bytes into a standards-compliant terminal
//! reproduces the tracked line content and cursor column after every
//! single update.

use std::io::{self, Write};

use unicode_width::UnicodeWidthChar;

use super::autocomplete::{MenuMode, Overlay, Suggestion};

/// Column width of a char slice.
fn cols(chars: &[char]) -> usize {
    chars.iter().map(|c| c.width().unwrap_or(0)).sum()
}

fn push_backspaces(bytes: &mut String, n: usize) {
    for _ in 0..n {
        bytes.push('\u{8}');
    }
}

/// Truncate a display line to `width` columns.
fn fit_width(line: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// Renders one input line plus an optional autocomplete overlay beneath it.
///
/// The renderer owns the output sink for the duration of a read call and
/// tracks the last frame it emitted (`frame`, `frame_cursor`). Every write
/// is built as one string and flushed atomically, so cancellation never
/// leaves a partial escape sequence on the wire.
pub struct LineRenderer<'a> {
    out: &'a mut dyn Write,
    ansi: bool,
    width: u16,
    prompt: String,
    frame: Vec<char>,
    frame_cursor: usize,
    overlay_rows: usize,
}

impl<'a> LineRenderer<'a> {
    pub fn new(out: &'a mut dyn Write, ansi: bool, width: u16, prompt: &str) -> Self {
        Self {
            out,
            ansi,
            width,
            prompt: prompt.to_string(),
            frame: Vec::new(),
            frame_cursor: 0,
            overlay_rows: 0,
        }
    }

    pub fn ansi(&self) -> bool {
        self.ansi
    }

    /// Adopt a new render width after a resize report.
    pub fn set_width(&mut self, width: u16) {
        if width > 0 {
            self.width = width;
        }
    }

    /// Print the prompt. Call once before the first `sync`.
    pub fn begin(&mut self) -> io::Result<()> {
        self.out.write_all(self.prompt.as_bytes())?;
        self.out.flush()
    }

    /// Bring the terminal in line with `(text, cursor)`.
    ///
    /// Finds the first index where the old and new frames diverge, moves
    /// the terminal cursor there, writes the changed tail, blanks any
    /// leftover columns from the old frame, then backspaces to the logical
    /// cursor. A pure cursor move (same text) skips the rewrite entirely.
    pub fn sync(&mut self, text: &[char], cursor: usize) -> io::Result<()> {
        let cursor = cursor.min(text.len());
        let mut bytes = String::new();

        if text == self.frame.as_slice() {
            if cursor > self.frame_cursor {
                self.emit_forward(&mut bytes, &text[self.frame_cursor..cursor]);
            } else {
                push_backspaces(&mut bytes, cols(&self.frame[cursor..self.frame_cursor]));
            }
        } else {
            let mut d = 0;
            while d < self.frame.len() && d < text.len() && self.frame[d] == text[d] {
                d += 1;
            }

            if self.frame_cursor > d {
                push_backspaces(&mut bytes, cols(&self.frame[d..self.frame_cursor]));
            } else if self.frame_cursor < d {
                self.emit_forward(&mut bytes, &text[self.frame_cursor..d]);
            }

            bytes.extend(text[d..].iter());

            let old_cols = cols(&self.frame);
            let new_cols = cols(text);
            if old_cols > new_cols {
                let extra = old_cols - new_cols;
                for _ in 0..extra {
                    bytes.push(' ');
                }
                push_backspaces(&mut bytes, extra);
            }

            push_backspaces(&mut bytes, cols(&text[cursor..]));
        }

        self.frame = text.to_vec();
        self.frame_cursor = cursor;

        if bytes.is_empty() {
            return Ok(());
        }
        self.out.write_all(bytes.as_bytes())?;
        self.out.flush()
    }

    /// End the read: drop any overlay and move to column 0 of the next row.
    pub fn finish(&mut self) -> io::Result<()> {
        self.clear_overlay()?;
        self.out.write_all(b"\r\n")?;
        self.out.flush()?;
        self.frame.clear();
        self.frame_cursor = 0;
        Ok(())
    }

    /// Show a single guidance line beneath the input (rich mode only).
    pub fn render_hint(&mut self, hint: &str) -> io::Result<()> {
        self.render_rows(&[fit_width(hint, self.width as usize)])
    }

    /// Show the candidate menu for an open overlay.
    pub fn render_menu(&mut self, overlay: &Overlay) -> io::Result<()> {
        match overlay.mode {
            MenuMode::Rich => {
                let mut rows = Vec::new();
                if let Some(hint) = &overlay.hint_line {
                    rows.push(fit_width(hint, self.width as usize));
                }
                for (i, suggestion) in overlay.suggestions.iter().enumerate() {
                    let line = fit_width(&menu_line(suggestion), self.width as usize);
                    if i == overlay.selected {
                        rows.push(format!("\x1b[7m{line}\x1b[0m"));
                    } else {
                        rows.push(line);
                    }
                }
                self.render_rows(&rows)
            }
            MenuMode::Basic => self.render_menu_basic(&overlay.suggestions),
        }
    }

    /// Erase all overlay rows and restore the cursor (no-op when closed).
    pub fn clear_overlay(&mut self) -> io::Result<()> {
        if self.overlay_rows == 0 {
            return Ok(());
        }
        let rows = self.overlay_rows;
        let mut bytes = String::new();
        for _ in 0..rows {
            bytes.push_str("\r\n\x1b[2K");
        }
        bytes.push_str(&format!("\x1b[{rows}A\r"));
        let col = self.cursor_col();
        if col > 0 {
            bytes.push_str(&format!("\x1b[{col}C"));
        }
        self.overlay_rows = 0;
        self.out.write_all(bytes.as_bytes())?;
        self.out.flush()
    }

    /// Column the logical cursor occupies, prompt included.
    fn cursor_col(&self) -> usize {
        self.prompt.chars().map(|c| c.width().unwrap_or(0)).sum::<usize>()
            + cols(&self.frame[..self.frame_cursor])
    }

    /// Write `rows` beneath the input line and return the cursor. Each row
    /// is cleared before being rewritten, so a shrinking menu leaves no
    /// stale text; rows beyond a previous taller overlay are wiped by
    /// `clear_overlay` composition in the editor.
    fn render_rows(&mut self, rows: &[String]) -> io::Result<()> {
        let stale = self.overlay_rows.saturating_sub(rows.len());
        let mut bytes = String::new();
        for row in rows {
            bytes.push_str("\r\n\x1b[2K");
            bytes.push_str(row);
        }
        for _ in 0..stale {
            bytes.push_str("\r\n\x1b[2K");
        }
        let total = rows.len() + stale;
        if total > 0 {
            bytes.push_str(&format!("\x1b[{total}A\r"));
        } else {
            bytes.push('\r');
        }
        let col = self.cursor_col();
        if col > 0 {
            bytes.push_str(&format!("\x1b[{col}C"));
        }
        self.overlay_rows = rows.len();
        self.out.write_all(bytes.as_bytes())?;
        self.out.flush()
    }

    /// Basic mode: scroll the candidate list out as plain lines, then
    /// reprint the prompt and the current line beneath it.
    fn render_menu_basic(&mut self, suggestions: &[Suggestion]) -> io::Result<()> {
        let mut bytes = String::from("\r\n");
        for suggestion in suggestions {
            bytes.push_str(&menu_line(suggestion));
            bytes.push_str("\r\n");
        }
        bytes.push_str(&self.prompt);
        bytes.extend(self.frame.iter());
        push_backspaces(&mut bytes, cols(&self.frame[self.frame_cursor..]));
        self.out.write_all(bytes.as_bytes())?;
        self.out.flush()
    }

    /// Move right over `chars`, by CSI cursor-forward when ANSI is
    /// available, otherwise by re-echoing the unchanged characters.
    fn emit_forward(&self, bytes: &mut String, chars: &[char]) {
        if chars.is_empty() {
            return;
        }
        if self.ansi {
            bytes.push_str(&format!("\x1b[{}C", cols(chars)));
        } else {
            bytes.extend(chars.iter());
        }
    }
}

fn menu_line(suggestion: &Suggestion) -> String {
    match &suggestion.description {
        Some(description) => format!("{}  {}", suggestion.value, description),
        None => suggestion.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal single-row terminal model: enough VT handling to replay the
    /// renderer's line output and check content plus cursor column.
    struct TermRow {
        cells: Vec<char>,
        col: usize,
    }

    impl TermRow {
        fn new() -> Self {
            Self {
                cells: Vec::new(),
                col: 0,
            }
        }

        fn feed(&mut self, bytes: &str) {
            let chars: Vec<char> = bytes.chars().collect();
            let mut i = 0;
            while i < chars.len() {
                match chars[i] {
                    '\u{8}' => self.col = self.col.saturating_sub(1),
                    '\r' => self.col = 0,
                    '\n' => {}
                    '\x1b' if chars.get(i + 1) == Some(&'[') => {
                        let mut j = i + 2;
                        let mut param = 0usize;
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            param = param * 10 + chars[j] as usize - '0' as usize;
                            j += 1;
                        }
                        match chars.get(j) {
                            Some('C') => self.col += param.max(1),
                            Some('K') if param == 2 => self.cells.clear(),
                            _ => {}
                        }
                        i = j;
                    }
                    c => {
                        while self.cells.len() <= self.col {
                            self.cells.push(' ');
                        }
                        self.cells[self.col] = c;
                        self.col += 1;
                    }
                }
                i += 1;
            }
        }

        fn text(&self) -> String {
            self.cells.iter().collect::<String>().trim_end().to_string()
        }
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_insert_mid_line_round_trip() {
        let mut out: Vec<u8> = Vec::new();
        let mut renderer = LineRenderer::new(&mut out, false, 80, "> ");
        renderer.begin().unwrap();

        // Type "hello", Left, Left, insert 'X'.
        for i in 1..=5 {
            renderer.sync(&chars(&"hello"[..i]), i).unwrap();
        }
        renderer.sync(&chars("hello"), 4).unwrap();
        renderer.sync(&chars("hello"), 3).unwrap();
        renderer.sync(&chars("helXlo"), 4).unwrap();

        let mut term = TermRow::new();
        term.feed(std::str::from_utf8(&out).unwrap());
        assert_eq!(term.text(), "> helXlo");
        assert_eq!(term.col, 2 + 4);
    }

    #[test]
    fn test_backspace_erases_trailing_cell() {
        let mut out: Vec<u8> = Vec::new();
        let mut renderer = LineRenderer::new(&mut out, false, 80, "> ");
        renderer.begin().unwrap();
        renderer.sync(&chars("hello"), 5).unwrap();
        renderer.sync(&chars("hell"), 4).unwrap();

        let mut term = TermRow::new();
        term.feed(std::str::from_utf8(&out).unwrap());
        assert_eq!(term.text(), "> hell");
        assert_eq!(term.col, 2 + 4);
    }

    #[test]
    fn test_delete_shifts_suffix_left() {
        let mut out: Vec<u8> = Vec::new();
        let mut renderer = LineRenderer::new(&mut out, false, 80, "");
        renderer.begin().unwrap();
        renderer.sync(&chars("hello"), 2).unwrap();
        renderer.sync(&chars("helo"), 2).unwrap(); // delete at cursor 2

        let mut term = TermRow::new();
        term.feed(std::str::from_utf8(&out).unwrap());
        assert_eq!(term.text(), "helo");
        assert_eq!(term.col, 2);
    }

    #[test]
    fn test_history_swap_erases_longer_old_line() {
        let mut out: Vec<u8> = Vec::new();
        let mut renderer = LineRenderer::new(&mut out, false, 80, "$ ");
        renderer.begin().unwrap();
        renderer.sync(&chars("second command"), 14).unwrap();
        renderer.sync(&chars("first"), 5).unwrap();

        let mut term = TermRow::new();
        term.feed(std::str::from_utf8(&out).unwrap());
        assert_eq!(term.text(), "$ first");
        assert_eq!(term.col, 2 + 5);
    }

    #[test]
    fn test_pure_cursor_move_uses_csi_forward_with_ansi() {
        let mut out: Vec<u8> = Vec::new();
        let mut renderer = LineRenderer::new(&mut out, true, 80, "");
        renderer.begin().unwrap();
        renderer.sync(&chars("hello"), 0).unwrap();
        renderer.sync(&chars("hello"), 5).unwrap(); // End
        drop(renderer);

        let written = String::from_utf8(out).unwrap();
        assert!(written.ends_with("\x1b[5C"));
    }

    #[test]
    fn test_pure_cursor_move_reechoes_without_ansi() {
        let mut out: Vec<u8> = Vec::new();
        let mut renderer = LineRenderer::new(&mut out, false, 80, "");
        renderer.begin().unwrap();
        renderer.sync(&chars("abc"), 0).unwrap();
        renderer.sync(&chars("abc"), 3).unwrap(); // End
        drop(renderer);

        let written = String::from_utf8(out).unwrap();
        assert!(written.ends_with("\u{8}\u{8}\u{8}abc"));
    }

    #[test]
    fn test_home_emits_backspaces() {
        let mut out: Vec<u8> = Vec::new();
        let mut renderer = LineRenderer::new(&mut out, false, 80, "");
        renderer.begin().unwrap();
        renderer.sync(&chars("abc"), 3).unwrap();
        renderer.sync(&chars("abc"), 0).unwrap(); // Home
        drop(renderer);

        assert_eq!(String::from_utf8(out).unwrap(), "abc\u{8}\u{8}\u{8}");
    }

    #[test]
    fn test_rich_menu_marks_selection_and_returns_cursor() {
        let mut out: Vec<u8> = Vec::new();
        let mut renderer = LineRenderer::new(&mut out, true, 80, "> ");
        renderer.begin().unwrap();
        renderer.sync(&chars("he"), 2).unwrap();

        let overlay = Overlay {
            suggestions: vec![Suggestion::new("hello"), Suggestion::new("help")],
            selected: 1,
            replace_start: 0,
            replace_length: 2,
            hint_line: Some("2 matches".to_string()),
            mode: MenuMode::Rich,
        };
        renderer.render_menu(&overlay).unwrap();
        drop(renderer);

        let written = String::from_utf8(out).unwrap();
        assert!(written.contains("2 matches"));
        assert!(written.contains("hello"));
        assert!(written.contains("\x1b[7mhelp\x1b[0m"));
        // Three rows down, three rows back up, cursor restored past "> he".
        assert!(written.contains("\x1b[3A\r"));
        assert!(written.ends_with("\x1b[4C"));
    }

    #[test]
    fn test_clear_overlay_wipes_rows_once() {
        let mut out: Vec<u8> = Vec::new();
        let mut renderer = LineRenderer::new(&mut out, true, 80, "");
        renderer.begin().unwrap();
        renderer.render_hint("hint").unwrap();
        renderer.clear_overlay().unwrap();
        // A second clear with no overlay open writes nothing further.
        renderer.clear_overlay().unwrap();
        drop(renderer);

        let written = String::from_utf8(out).unwrap();
        assert!(written.contains("hint"));
        assert!(written.ends_with("\r\n\x1b[2K\x1b[1A\r"));
    }

    #[test]
    fn test_basic_menu_reprints_prompt_and_line() {
        let mut out: Vec<u8> = Vec::new();
        let mut renderer = LineRenderer::new(&mut out, false, 80, "> ");
        renderer.begin().unwrap();
        renderer.sync(&chars("he"), 2).unwrap();

        let overlay = Overlay {
            suggestions: vec![Suggestion::new("hello"), Suggestion::new("help")],
            selected: 0,
            replace_start: 0,
            replace_length: 2,
            hint_line: None,
            mode: MenuMode::Basic,
        };
        renderer.render_menu(&overlay).unwrap();
        drop(renderer);

        let written = String::from_utf8(out).unwrap();
        assert!(written.ends_with("\r\nhello\r\nhelp\r\n> he"));
    }
}
