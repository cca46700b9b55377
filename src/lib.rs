//! termline - transport-agnostic interactive line editing
//!
//! termline is the readline layer for REPL and CLI hosts whose terminal may
//! be on the other side of a socket. It accepts raw text chunks from any
//! transport (local console, Telnet, WebSocket), decodes VT/ANSI escape
//! sequences into key events, and re-renders the input line by minimal diff
//! rather than clearing the screen, so the same byte stream drives a local
//! terminal and a remote one identically.
//!
//! # Features
//!
//! - **Transport bridge**: push arbitrary-sized chunks in, pull chars and
//!   lines out, with clean end-of-stream and cancellation semantics
//! - **Key parsing**: CSI/SS3 decoding with timed ESC disambiguation and
//!   in-band DTTERM resize reports
//! - **Capability probe**: one-shot ANSI and window-size detection for
//!   unknown remote terminals
//! - **Session metadata**: per-connection size/ANSI/capability records the
//!   renderer consults, with host overrides and policy defaults
//! - **Line editing**: history navigation plus inline and menu-based
//!   autocomplete, on ANSI and dumb terminals alike
//!
//! # Quick Start
//!
//! ```no_run
//! use termline::core::{CancelToken, SessionStore, TextBridge};
//! use termline::ui::{LineEditor, ReadOutcome};
//!
//! let store = SessionStore::default();
//! store.ensure(1, "console");
//!
//! let bridge = TextBridge::new();
//! bridge.push("hello\r");
//!
//! let mut out: Vec<u8> = Vec::new();
//! let mut editor = LineEditor::new(&store, 1);
//! let outcome = editor
//!     .read_line(&bridge, &mut out, "> ", &CancelToken::new())
//!     .unwrap();
//! assert_eq!(outcome, ReadOutcome::Submitted("hello".to_string()));
//! ```

pub mod config;
pub mod core;
pub mod history;
pub mod ui;

pub use config::Config;
pub use core::{
    AnsiMode, CancelToken, Capabilities, CapabilityProbe, KeyEvent, KeyParser, ProbeReport,
    Session, SessionOverrides, SessionStore, TextBridge,
};
pub use history::{CommandHistory, HistoryProvider};
pub use ui::{AutocompleteResolver, LineEditor, ReadOutcome};
