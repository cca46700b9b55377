//! Terminal capability probe
//!
//! Best-effort, one-shot detection of a remote terminal's ANSI support and
//! window size, run before interactive editing begins. Writes a
//! Device-Attributes query and a window-size query, then captures whatever
//! response bytes arrive within a bounded window. Terminals that do not
//! answer are common; no response is the expected outcome, not an error.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use thiserror::Error;

use super::bridge::{CancelToken, Cancelled, TextBridge};

/// Primary Device Attributes query (`CSI c`). ANSI-capable terminals answer
/// with a `CSI ? ... c` report.
pub const DEVICE_ATTRIBUTES_QUERY: &str = "\x1b[c";

/// DTTERM window-size query (`CSI 18 t`). Answered with
/// `CSI 8 ; rows ; cols t`.
pub const WINDOW_SIZE_QUERY: &str = "\x1b[18t";

/// How long to wait for probe responses by default.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to write probe query: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// What the probe learned. Absence of a signal leaves a field at its
/// "unknown" value; callers apply their own default policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProbeReport {
    /// True when the response contained a `CSI ?` device-attributes report.
    pub ansi_detected: bool,
    /// `(cols, rows)` from a size report, if one arrived with valid
    /// components.
    pub window_size: Option<(u16, u16)>,
}

pub struct CapabilityProbe {
    response_timeout: Duration,
}

impl Default for CapabilityProbe {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_TIMEOUT)
    }
}

impl CapabilityProbe {
    pub fn new(response_timeout: Duration) -> Self {
        Self { response_timeout }
    }

    /// Write both queries, then capture response bytes from `bridge` until
    /// the timeout expires, the stream ends, or both signals have been
    /// seen. Partial or absent responses are fine.
    pub fn run(
        &self,
        bridge: &TextBridge,
        out: &mut dyn Write,
        cancel: &CancelToken,
    ) -> Result<ProbeReport, ProbeError> {
        out.write_all(DEVICE_ATTRIBUTES_QUERY.as_bytes())?;
        out.write_all(WINDOW_SIZE_QUERY.as_bytes())?;
        out.flush()?;

        let deadline = Instant::now() + self.response_timeout;
        let mut response = String::new();
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match bridge.read_char_timeout(deadline - now, cancel)? {
                Some(c) => response.push(c),
                None => break,
            }
            let report = parse_response(&response);
            if report.ansi_detected && report.window_size.is_some() {
                break;
            }
        }

        let report = parse_response(&response);
        tracing::debug!(
            "probe captured {} bytes: ansi={}, size={:?}",
            response.len(),
            report.ansi_detected,
            report.window_size
        );
        Ok(report)
    }
}

/// Extract both signals from a captured response, wherever they appear.
pub fn parse_response(response: &str) -> ProbeReport {
    ProbeReport {
        ansi_detected: response.contains("\x1b[?"),
        window_size: parse_size_report(response),
    }
}

/// Find the first `ESC [ 8 ; rows ; cols t` with valid components and
/// return `(cols, rows)`. Zero components leave the size unknown.
fn parse_size_report(response: &str) -> Option<(u16, u16)> {
    let mut rest = response;
    while let Some(pos) = rest.find("\x1b[8;") {
        let tail = &rest[pos + 4..];
        if let Some(size) = parse_size_params(tail) {
            return Some(size);
        }
        rest = &rest[pos + 4..];
    }
    None
}

/// Parse `rows ; cols t` from the head of `tail`.
fn parse_size_params(tail: &str) -> Option<(u16, u16)> {
    let (rows_str, after_rows) = tail.split_once(';')?;
    let end = after_rows.find('t')?;
    let cols_str = &after_rows[..end];

    let rows: u16 = rows_str.parse().ok()?;
    let cols: u16 = cols_str.parse().ok()?;
    if rows == 0 || cols == 0 {
        return None;
    }
    Some((cols, rows))
}
