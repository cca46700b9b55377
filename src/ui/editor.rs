//! Interactive line editor
//!
//! Drives one read call: pull key events from the transport bridge, mutate
//! the edit buffer, and let the renderer emit the minimal diff after every
//! event. History navigation and autocomplete are delegated to external
//! providers; the editor only owns the state machine that sequences them.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::core::bridge::{CancelToken, TextBridge};
use crate::core::keys::{ControlKey, KeyEvent, KeyParser};
use crate::core::session::SessionStore;
use crate::history::HistoryProvider;

use super::autocomplete::{clamp_range, common_prefix, AutocompleteResolver, MenuMode, Overlay};
use super::renderer::LineRenderer;

/// Character buffer with a cursor. `0 <= cursor <= len` always holds.
#[derive(Debug, Default)]
pub struct EditBuffer {
    chars: Vec<char>,
    cursor: usize,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, c: char) {
        self.chars.insert(self.cursor, c);
        self.cursor += 1;
    }

    /// Remove the char before the cursor. Returns false at column 0.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        self.chars.remove(self.cursor);
        true
    }

    /// Remove the char at the cursor. Returns false at end of line.
    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.chars.len() {
            return false;
        }
        self.chars.remove(self.cursor);
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor >= self.chars.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn home(&mut self) -> bool {
        let moved = self.cursor > 0;
        self.cursor = 0;
        moved
    }

    pub fn end(&mut self) -> bool {
        let moved = self.cursor < self.chars.len();
        self.cursor = self.chars.len();
        moved
    }

    /// Replace the whole content, cursor at end.
    pub fn set_text(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
    }

    /// Replace `[start, start+length)` with `text`, cursor after the
    /// replacement. Out-of-range values are clamped, never an error.
    pub fn replace_range(&mut self, start: usize, length: usize, text: &str) {
        let (start, length) = clamp_range(start, length, self.chars.len());
        let replacement: Vec<char> = text.chars().collect();
        self.cursor = start + replacement.len();
        self.chars.splice(start..start + length, replacement);
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// How a read call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Enter pressed; the full line content.
    Submitted(String),
    /// The caller's cancellation signal fired.
    Cancelled,
    /// The input stream ended before Enter.
    Eof,
}

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("terminal write failed: {0}")]
    Io(#[from] io::Error),
}

/// In-progress history navigation: the fetched window, the currently shown
/// entry, and the draft the user was typing before the first Up.
struct HistoryNav {
    entries: Vec<String>,
    index: Option<usize>,
    draft: String,
}

/// What is currently shown beneath the input line.
enum Popup {
    None,
    Hint,
    Menu(Overlay),
}

impl Popup {
    fn is_open(&self) -> bool {
        !matches!(self, Popup::None)
    }
}

/// One line editor per session. Construct once, call [`read_line`] per
/// prompt; buffers and popup state are per call, never shared.
///
/// [`read_line`]: LineEditor::read_line
pub struct LineEditor<'a> {
    store: &'a SessionStore,
    session_id: u64,
    parser: KeyParser,
    resolver: Option<&'a dyn AutocompleteResolver>,
    history: Option<&'a mut dyn HistoryProvider>,
    history_window: usize,
}

impl<'a> LineEditor<'a> {
    pub fn new(store: &'a SessionStore, session_id: u64) -> Self {
        Self {
            store,
            session_id,
            parser: KeyParser::default(),
            resolver: None,
            history: None,
            history_window: 100,
        }
    }

    pub fn with_escape_timeout(mut self, timeout: Duration) -> Self {
        self.parser = KeyParser::new(timeout);
        self
    }

    pub fn with_resolver(mut self, resolver: &'a dyn AutocompleteResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_history(mut self, history: &'a mut dyn HistoryProvider, window: usize) -> Self {
        self.history = Some(history);
        self.history_window = window;
        self
    }

    /// Read one line interactively. Returns on Enter, cancellation, or end
    /// of input; the terminal is left at column 0 of a fresh row on every
    /// path, with no overlay and no partial escape sequence pending.
    pub fn read_line(
        &mut self,
        bridge: &TextBridge,
        out: &mut dyn io::Write,
        prompt: &str,
        cancel: &CancelToken,
    ) -> Result<ReadOutcome, EditorError> {
        let _active = self.store.activate(self.session_id);
        let ansi = self.store.ansi_enabled(self.session_id);
        let width = self.store.render_width(self.session_id);
        let mut renderer = LineRenderer::new(out, ansi, width, prompt);
        renderer.begin()?;

        let mut buffer = EditBuffer::new();
        let mut popup = Popup::None;
        let mut nav: Option<HistoryNav> = None;
        let mut tab_primed = false;

        loop {
            let key = match self.parser.next_key(bridge, cancel) {
                Ok(Some(key)) => key,
                Ok(None) => {
                    renderer.finish()?;
                    return Ok(ReadOutcome::Eof);
                }
                Err(_) => {
                    renderer.finish()?;
                    return Ok(ReadOutcome::Cancelled);
                }
            };

            match key {
                KeyEvent::Char(c) => {
                    tab_primed = false;
                    nav = None;
                    buffer.insert(c);
                    self.refresh_after_edit(&mut renderer, &buffer, &mut popup)?;
                }

                KeyEvent::Control(ControlKey::Enter) => {
                    if let Popup::Menu(overlay) = &popup {
                        // Commit the selection into the buffer; a second
                        // Enter is needed to submit.
                        let value = overlay.selected_value().to_string();
                        buffer.replace_range(overlay.replace_start, overlay.replace_length, &value);
                        close_popup(&mut renderer, &mut popup)?;
                        tab_primed = false;
                        renderer.sync(buffer.chars(), buffer.cursor())?;
                    } else {
                        renderer.finish()?;
                        let line = buffer.text();
                        if !line.trim().is_empty() {
                            if let Some(history) = self.history.as_deref_mut() {
                                history.append(&line);
                            }
                        }
                        return Ok(ReadOutcome::Submitted(line));
                    }
                }

                KeyEvent::Control(ControlKey::Tab) => {
                    tab_primed =
                        self.handle_tab(&mut renderer, &mut buffer, &mut popup, tab_primed)?;
                }

                KeyEvent::Control(ControlKey::Backspace) => {
                    tab_primed = false;
                    nav = None;
                    if buffer.backspace() {
                        self.refresh_after_edit(&mut renderer, &buffer, &mut popup)?;
                    }
                }

                KeyEvent::Control(ControlKey::Delete) => {
                    tab_primed = false;
                    nav = None;
                    if buffer.delete() {
                        self.refresh_after_edit(&mut renderer, &buffer, &mut popup)?;
                    }
                }

                KeyEvent::Control(ControlKey::Left) => {
                    tab_primed = false;
                    close_popup(&mut renderer, &mut popup)?;
                    if buffer.move_left() {
                        renderer.sync(buffer.chars(), buffer.cursor())?;
                    }
                }

                KeyEvent::Control(ControlKey::Right) => {
                    tab_primed = false;
                    close_popup(&mut renderer, &mut popup)?;
                    if buffer.move_right() {
                        renderer.sync(buffer.chars(), buffer.cursor())?;
                    }
                }

                KeyEvent::Control(ControlKey::Home) => {
                    tab_primed = false;
                    close_popup(&mut renderer, &mut popup)?;
                    if buffer.home() {
                        renderer.sync(buffer.chars(), buffer.cursor())?;
                    }
                }

                KeyEvent::Control(ControlKey::End) => {
                    tab_primed = false;
                    close_popup(&mut renderer, &mut popup)?;
                    if buffer.end() {
                        renderer.sync(buffer.chars(), buffer.cursor())?;
                    }
                }

                KeyEvent::Control(ControlKey::Up) => match &mut popup {
                    // Basic menus are informational; there is no selection
                    // bar to move.
                    Popup::Menu(overlay) if overlay.mode == MenuMode::Rich => {
                        if overlay.select_up() {
                            renderer.render_menu(overlay)?;
                        }
                    }
                    Popup::Menu(_) => {}
                    _ => {
                        tab_primed = false;
                        self.history_up(&mut renderer, &mut buffer, &mut popup, &mut nav)?;
                    }
                },

                KeyEvent::Control(ControlKey::Down) => match &mut popup {
                    Popup::Menu(overlay) if overlay.mode == MenuMode::Rich => {
                        if overlay.select_down() {
                            renderer.render_menu(overlay)?;
                        }
                    }
                    Popup::Menu(_) => {}
                    _ => {
                        tab_primed = false;
                        history_down(&mut renderer, &mut buffer, &mut popup, &mut nav)?;
                    }
                },

                KeyEvent::Control(ControlKey::Escape) => {
                    tab_primed = false;
                    close_popup(&mut renderer, &mut popup)?;
                }

                KeyEvent::Resize { cols, rows } => {
                    self.store.record_resize_report(self.session_id, cols, rows);
                    renderer.set_width(cols);
                }

                // No line-editing meaning; consumed silently.
                KeyEvent::Control(_) | KeyEvent::Unrecognized => {}
            }
        }
    }

    /// Re-render after a buffer mutation and keep the popup honest: an open
    /// menu closes, and in rich mode a live hint is re-queried with the
    /// updated input so guidance follows the new prefix.
    fn refresh_after_edit(
        &self,
        renderer: &mut LineRenderer<'_>,
        buffer: &EditBuffer,
        popup: &mut Popup,
    ) -> io::Result<()> {
        let was_open = popup.is_open();
        renderer.sync(buffer.chars(), buffer.cursor())?;
        if !was_open {
            return Ok(());
        }
        if renderer.ansi() {
            if let Some(resolver) = self.resolver {
                let completion = resolver.resolve(&buffer.text(), buffer.cursor(), false);
                if let Some(hint) = completion.and_then(|c| c.hint_line) {
                    renderer.render_hint(&hint)?;
                    *popup = Popup::Hint;
                    return Ok(());
                }
            }
        }
        renderer.clear_overlay()?;
        *popup = Popup::None;
        Ok(())
    }

    /// Tab: extend the token inline when the candidates allow it; a second
    /// press with no intervening change opens the selection overlay.
    /// Returns the new primed state.
    fn handle_tab(
        &self,
        renderer: &mut LineRenderer<'_>,
        buffer: &mut EditBuffer,
        popup: &mut Popup,
        primed: bool,
    ) -> Result<bool, EditorError> {
        let Some(resolver) = self.resolver else {
            return Ok(false);
        };
        if matches!(popup, Popup::Menu(_)) {
            return Ok(false);
        }

        let Some(completion) = resolver.resolve(&buffer.text(), buffer.cursor(), primed) else {
            return Ok(false);
        };
        if completion.suggestions.is_empty() {
            return Ok(false);
        }

        let (start, length) =
            clamp_range(completion.replace_start, completion.replace_length, buffer.len());
        let token: String = buffer.chars()[start..start + length].iter().collect();
        let fill = if completion.suggestions.len() == 1 {
            completion.suggestions[0].value.clone()
        } else {
            common_prefix(&completion.suggestions)
        };

        if fill.chars().count() > length && fill != token {
            buffer.replace_range(start, length, &fill);
            self.refresh_after_edit(renderer, buffer, popup)?;
            return Ok(true);
        }

        if primed {
            let mode = if renderer.ansi() {
                MenuMode::Rich
            } else {
                MenuMode::Basic
            };
            if let Some(overlay) = Overlay::from_completion(completion, mode, buffer.len()) {
                renderer.render_menu(&overlay)?;
                *popup = Popup::Menu(overlay);
            }
            return Ok(false);
        }
        Ok(true)
    }

    fn history_up(
        &mut self,
        renderer: &mut LineRenderer<'_>,
        buffer: &mut EditBuffer,
        popup: &mut Popup,
        nav: &mut Option<HistoryNav>,
    ) -> io::Result<()> {
        if nav.is_none() {
            let Some(history) = self.history.as_deref() else {
                return Ok(());
            };
            let entries = history.recent(self.history_window);
            if entries.is_empty() {
                return Ok(());
            }
            *nav = Some(HistoryNav {
                entries,
                index: None,
                draft: buffer.text(),
            });
        }
        if let Some(nav) = nav.as_mut() {
            // Clamped at the oldest entry, no wraparound.
            let index = match nav.index {
                None => nav.entries.len() - 1,
                Some(0) => 0,
                Some(i) => i - 1,
            };
            nav.index = Some(index);
            buffer.set_text(&nav.entries[index]);
            close_popup(renderer, popup)?;
            renderer.sync(buffer.chars(), buffer.cursor())?;
        }
        Ok(())
    }
}

fn history_down(
    renderer: &mut LineRenderer<'_>,
    buffer: &mut EditBuffer,
    popup: &mut Popup,
    nav: &mut Option<HistoryNav>,
) -> io::Result<()> {
    let Some(state) = nav.as_mut() else {
        return Ok(());
    };
    match state.index {
        Some(i) if i + 1 < state.entries.len() => {
            state.index = Some(i + 1);
            buffer.set_text(&state.entries[i + 1]);
        }
        Some(_) => {
            // Past the newest entry: restore the draft exactly and leave
            // navigation mode.
            buffer.set_text(&state.draft);
            *nav = None;
        }
        None => return Ok(()),
    }
    close_popup(renderer, popup)?;
    renderer.sync(buffer.chars(), buffer.cursor())
}

fn close_popup(renderer: &mut LineRenderer<'_>, popup: &mut Popup) -> io::Result<()> {
    if popup.is_open() {
        renderer.clear_overlay()?;
        *popup = Popup::None;
    }
    Ok(())
}
