//! Escape-sequence key parser
//!
//! Decodes one key event per logical keypress from the character stream.
//! ESC alone and ESC-as-sequence-prefix are disambiguated with a short
//! bounded wait; malformed sequences degrade to a neutral no-op event
//! instead of an error.

use std::time::Duration;

use super::bridge::{CancelToken, Cancelled, TextBridge};

/// How long to wait after a bare ESC before concluding the user pressed
/// the Escape key rather than a sequence-producing key.
pub const DEFAULT_ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

/// Non-printing keys the editor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    Enter,
    Tab,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Escape,
    F1,
    F2,
    F3,
    F4,
}

/// One decoded key event. Exactly one variant per parse cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// A plain printable character.
    Char(char),
    /// A control or navigation key.
    Control(ControlKey),
    /// In-band DTTERM window-size report (`CSI 8 ; rows ; cols t`).
    Resize { cols: u16, rows: u16 },
    /// Malformed or unsupported sequence, fully consumed. Callers skip it.
    Unrecognized,
}

/// Stateless decoder over a [`TextBridge`].
pub struct KeyParser {
    escape_timeout: Duration,
}

impl Default for KeyParser {
    fn default() -> Self {
        Self::new(DEFAULT_ESCAPE_TIMEOUT)
    }
}

impl KeyParser {
    pub fn new(escape_timeout: Duration) -> Self {
        Self { escape_timeout }
    }

    /// Decode the next key event. `Ok(None)` means end-of-stream. Only
    /// external cancellation produces an error; the internal escape
    /// disambiguation timeout is swallowed.
    pub fn next_key(
        &self,
        bridge: &TextBridge,
        cancel: &CancelToken,
    ) -> Result<Option<KeyEvent>, Cancelled> {
        let Some(c) = bridge.read_char(cancel)? else {
            return Ok(None);
        };

        let event = match c {
            '\r' | '\n' => KeyEvent::Control(ControlKey::Enter),
            '\t' => KeyEvent::Control(ControlKey::Tab),
            '\x7f' | '\x08' => KeyEvent::Control(ControlKey::Backspace),
            '\x1b' => self.parse_escape(bridge, cancel)?,
            c => KeyEvent::Char(c),
        };
        Ok(Some(event))
    }

    fn parse_escape(
        &self,
        bridge: &TextBridge,
        cancel: &CancelToken,
    ) -> Result<KeyEvent, Cancelled> {
        match bridge.read_char_timeout(self.escape_timeout, cancel)? {
            // Nothing followed within the window: the user pressed Escape.
            None => Ok(KeyEvent::Control(ControlKey::Escape)),
            Some('[') => self.parse_csi(bridge, cancel),
            Some('O') => self.parse_ss3(bridge, cancel),
            Some(_) => Ok(KeyEvent::Unrecognized),
        }
    }

    /// CSI: up to 3 numeric parameters separated by `;`, then a final byte.
    fn parse_csi(&self, bridge: &TextBridge, cancel: &CancelToken) -> Result<KeyEvent, Cancelled> {
        let mut params: Vec<u32> = Vec::with_capacity(3);
        let mut current: Option<u32> = None;
        let mut malformed = false;

        loop {
            let Some(c) = bridge.read_char(cancel)? else {
                // Stream ended mid-sequence.
                return Ok(KeyEvent::Unrecognized);
            };
            match c {
                '0'..='9' => {
                    let digit = c as u32 - '0' as u32;
                    current = Some(
                        current
                            .unwrap_or(0)
                            .saturating_mul(10)
                            .saturating_add(digit),
                    );
                }
                ';' => {
                    params.push(current.take().unwrap_or(0));
                    if params.len() > 3 {
                        malformed = true;
                    }
                }
                '\x40'..='\x7e' => {
                    if let Some(p) = current.take() {
                        params.push(p);
                    }
                    if malformed || params.len() > 3 {
                        return Ok(KeyEvent::Unrecognized);
                    }
                    return Ok(dispatch_csi(&params, c));
                }
                _ => {
                    // Intermediate or private-mode byte we do not handle.
                    malformed = true;
                }
            }
        }
    }

    /// SS3: single final byte, used by some emulations for Home/End/F1-F4.
    fn parse_ss3(&self, bridge: &TextBridge, cancel: &CancelToken) -> Result<KeyEvent, Cancelled> {
        let Some(c) = bridge.read_char(cancel)? else {
            return Ok(KeyEvent::Unrecognized);
        };
        let key = match c {
            'H' => ControlKey::Home,
            'F' => ControlKey::End,
            'P' => ControlKey::F1,
            'Q' => ControlKey::F2,
            'R' => ControlKey::F3,
            'S' => ControlKey::F4,
            _ => return Ok(KeyEvent::Unrecognized),
        };
        Ok(KeyEvent::Control(key))
    }
}

fn dispatch_csi(params: &[u32], final_byte: char) -> KeyEvent {
    match final_byte {
        'A' => KeyEvent::Control(ControlKey::Up),
        'B' => KeyEvent::Control(ControlKey::Down),
        'C' => KeyEvent::Control(ControlKey::Right),
        'D' => KeyEvent::Control(ControlKey::Left),
        'H' => KeyEvent::Control(ControlKey::Home),
        'F' => KeyEvent::Control(ControlKey::End),
        '~' => match params.first() {
            Some(1) => KeyEvent::Control(ControlKey::Home),
            Some(2) => KeyEvent::Control(ControlKey::Insert),
            Some(3) => KeyEvent::Control(ControlKey::Delete),
            Some(4) => KeyEvent::Control(ControlKey::End),
            Some(5) => KeyEvent::Control(ControlKey::PageUp),
            Some(6) => KeyEvent::Control(ControlKey::PageDown),
            _ => KeyEvent::Unrecognized,
        },
        // DTTERM resize report. Out-of-range components consume the
        // sequence but suppress the event.
        't' => match params {
            [8, rows, cols] if *rows > 0 && *cols > 0 => {
                match (u16::try_from(*cols), u16::try_from(*rows)) {
                    (Ok(cols), Ok(rows)) => KeyEvent::Resize { cols, rows },
                    _ => KeyEvent::Unrecognized,
                }
            }
            _ => KeyEvent::Unrecognized,
        },
        _ => {
            tracing::debug!("unknown CSI: params={:?}, final={:?}", params, final_byte);
            KeyEvent::Unrecognized
        }
    }
}
