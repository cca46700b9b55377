//! Transport text bridge
//!
//! Transports deliver text in arbitrarily sized chunks whenever the peer
//! feels like sending them. The key parser wants to pull one character (or
//! one line) at a time. This module sits between the two: `push` appends a
//! chunk, `complete` marks the end of the stream, and the read methods drain
//! the buffer, blocking when it is empty.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Granularity of the blocking wait. Short slices keep cancellation
/// responsive without a registered wakeup.
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// External cancellation signal. Every blocking read checks it; internal
/// timeouts (escape disambiguation, probe capture) never set it.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A read was cancelled by the caller's [`CancelToken`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("read cancelled")]
pub struct Cancelled;

struct BridgeState {
    buf: VecDeque<char>,
    completed: bool,
    /// Last character appended, tracked across chunk boundaries so a `\n`
    /// that completes a `\r\n` pair split between chunks is still dropped.
    last_pushed: Option<char>,
}

enum Pull {
    Char(char),
    Eof,
    TimedOut,
}

/// Push-to-pull text buffer for one session.
///
/// Single-producer/single-consumer: one transport feeds it, one read loop
/// drains it. `\r\n` pairs are collapsed to `\r` on the way in so that a
/// CRLF line ending produces exactly one terminator (and one Enter key).
pub struct TextBridge {
    state: Mutex<BridgeState>,
    data_ready: Condvar,
}

impl Default for TextBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBridge {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BridgeState {
                buf: VecDeque::new(),
                completed: false,
                last_pushed: None,
            }),
            data_ready: Condvar::new(),
        }
    }

    /// Append a chunk of text. Empty input is a no-op.
    pub fn push(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut state = self.lock();
        for ch in text.chars() {
            if ch == '\n' && state.last_pushed == Some('\r') {
                state.last_pushed = Some('\n');
                continue;
            }
            state.buf.push_back(ch);
            state.last_pushed = Some(ch);
        }
        drop(state);
        self.data_ready.notify_all();
    }

    /// Signal that no more input will ever arrive. Pending reads drain the
    /// remaining buffer, then observe end-of-stream.
    pub fn complete(&self) {
        let mut state = self.lock();
        state.completed = true;
        drop(state);
        self.data_ready.notify_all();
    }

    /// Read one character, blocking until data arrives. `Ok(None)` means
    /// end-of-stream.
    pub fn read_char(&self, cancel: &CancelToken) -> Result<Option<char>, Cancelled> {
        match self.pull(None, cancel)? {
            Pull::Char(c) => Ok(Some(c)),
            Pull::Eof | Pull::TimedOut => Ok(None),
        }
    }

    /// Read one character, waiting at most `timeout`. `Ok(None)` covers both
    /// timeout and end-of-stream; the caller treats either as "nothing
    /// followed". Timing out is an expected outcome, not an error.
    pub fn read_char_timeout(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<Option<char>, Cancelled> {
        match self.pull(Some(Instant::now() + timeout), cancel)? {
            Pull::Char(c) => Ok(Some(c)),
            Pull::Eof | Pull::TimedOut => Ok(None),
        }
    }

    /// Read one logical line, reassembled across chunk boundaries. `\n`,
    /// `\r\n`, and bare `\r` all terminate; the terminator is consumed but
    /// never included. After `complete()`, a trailing partial line is
    /// returned once, then reads yield `Ok(None)`.
    pub fn read_line(&self, cancel: &CancelToken) -> Result<Option<String>, Cancelled> {
        let mut line = String::new();
        let mut saw_any = false;
        loop {
            match self.pull(None, cancel)? {
                Pull::Char('\r') | Pull::Char('\n') => return Ok(Some(line)),
                Pull::Char(c) => {
                    saw_any = true;
                    line.push(c);
                }
                Pull::Eof | Pull::TimedOut => {
                    return Ok(if saw_any { Some(line) } else { None });
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pull(&self, deadline: Option<Instant>, cancel: &CancelToken) -> Result<Pull, Cancelled> {
        let mut state = self.lock();
        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            if let Some(c) = state.buf.pop_front() {
                return Ok(Pull::Char(c));
            }
            if state.completed {
                return Ok(Pull::Eof);
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return Ok(Pull::TimedOut);
                }
            }
            state = match self.data_ready.wait_timeout(state, WAIT_SLICE) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn none() -> CancelToken {
        CancelToken::new()
    }

    #[test]
    fn test_line_reassembly_across_chunks() {
        let bridge = TextBridge::new();
        bridge.push("hel");
        bridge.push("lo\nwor");
        bridge.push("ld");
        bridge.complete();

        assert_eq!(bridge.read_line(&none()).unwrap(), Some("hello".to_string()));
        assert_eq!(bridge.read_line(&none()).unwrap(), Some("world".to_string()));
        assert_eq!(bridge.read_line(&none()).unwrap(), None);
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let bridge = TextBridge::new();
        bridge.push("one\r");
        bridge.push("\ntwo\r\n");
        bridge.complete();

        assert_eq!(bridge.read_line(&none()).unwrap(), Some("one".to_string()));
        assert_eq!(bridge.read_line(&none()).unwrap(), Some("two".to_string()));
        assert_eq!(bridge.read_line(&none()).unwrap(), None);
    }

    #[test]
    fn test_bare_cr_terminates() {
        let bridge = TextBridge::new();
        bridge.push("alpha\rbeta\r");
        bridge.complete();

        assert_eq!(bridge.read_line(&none()).unwrap(), Some("alpha".to_string()));
        assert_eq!(bridge.read_line(&none()).unwrap(), Some("beta".to_string()));
        assert_eq!(bridge.read_line(&none()).unwrap(), None);
    }

    #[test]
    fn test_empty_push_is_noop() {
        let bridge = TextBridge::new();
        bridge.push("");
        bridge.complete();
        assert_eq!(bridge.read_char(&none()).unwrap(), None);
    }

    #[test]
    fn test_char_reads_drain_before_eof() {
        let bridge = TextBridge::new();
        bridge.push("ab");
        bridge.complete();

        assert_eq!(bridge.read_char(&none()).unwrap(), Some('a'));
        assert_eq!(bridge.read_char(&none()).unwrap(), Some('b'));
        assert_eq!(bridge.read_char(&none()).unwrap(), None);
    }

    #[test]
    fn test_timeout_returns_none_without_error() {
        let bridge = TextBridge::new();
        let got = bridge
            .read_char_timeout(Duration::from_millis(30), &none())
            .unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn test_blocking_read_wakes_on_push() {
        let bridge = Arc::new(TextBridge::new());
        let writer = bridge.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            writer.push("x");
        });

        assert_eq!(bridge.read_char(&none()).unwrap(), Some('x'));
        handle.join().unwrap();
    }

    #[test]
    fn test_cancel_unblocks_reader() {
        let bridge = Arc::new(TextBridge::new());
        let token = CancelToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            canceller.cancel();
        });

        assert_eq!(bridge.read_char(&token), Err(Cancelled));
        handle.join().unwrap();
    }

    #[test]
    fn test_partial_line_returned_once() {
        let bridge = TextBridge::new();
        bridge.push("dangling");
        bridge.complete();

        assert_eq!(
            bridge.read_line(&none()).unwrap(),
            Some("dangling".to_string())
        );
        assert_eq!(bridge.read_line(&none()).unwrap(), None);
    }
}
