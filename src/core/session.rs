//! Session metadata store
//!
//! One record per connection holding what we know about the terminal on the
//! other side: window size, ANSI support, negotiated capabilities, identity.
//! The renderer asks this store "what is the best available width / ANSI
//! state right now" and falls back to policy defaults when there is no
//! session to ask.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::probe::ProbeReport;

/// Render width used when no session reports a size.
pub const DEFAULT_FALLBACK_WIDTH: u16 = 80;

bitflags::bitflags! {
    /// Terminal capabilities observed for a session. Flags only ever
    /// accumulate; a later update can add but never remove one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u8 {
        const ANSI = 0b0001;
        const RESIZE_REPORTING = 0b0010;
        const IDENTITY_REPORTING = 0b0100;
        const VT_INPUT = 0b1000;
    }
}

/// Policy for ANSI output when a session has no explicit or detected answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnsiMode {
    /// Always emit ANSI sequences.
    Always,
    /// Never emit ANSI sequences; use backspace-based erasure only.
    Never,
    /// Trust detection, defaulting to ANSI-capable when nothing contradicts.
    #[default]
    Auto,
}

/// Everything known about one connected terminal.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: u64,
    pub transport_name: String,
    pub remote_peer: Option<String>,
    pub terminal_identity: Option<String>,
    /// Last reported (cols, rows). Fully replaced on every valid update.
    pub window_size: Option<(u16, u16)>,
    /// Host-supplied ANSI override. Takes precedence over detection.
    pub ansi_override: Option<bool>,
    /// ANSI support confirmed by the capability probe.
    pub ansi_detected: Option<bool>,
    pub capabilities: Capabilities,
    pub last_updated: SystemTime,
}

impl Session {
    fn new(id: u64, transport_name: &str) -> Self {
        Self {
            id,
            transport_name: transport_name.to_string(),
            remote_peer: None,
            terminal_identity: None,
            window_size: None,
            ansi_override: None,
            ansi_detected: None,
            capabilities: Capabilities::empty(),
            last_updated: SystemTime::now(),
        }
    }

    /// Effective ANSI answer for this record under the given policy.
    pub fn ansi_enabled(&self, mode: AnsiMode) -> bool {
        if let Some(explicit) = self.ansi_override {
            return explicit;
        }
        match mode {
            AnsiMode::Always => true,
            AnsiMode::Never => false,
            AnsiMode::Auto => self.ansi_detected.unwrap_or(true),
        }
    }
}

/// Host-supplied values applied before the probe runs. Any set field takes
/// precedence over automatic detection for that field only.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    pub transport_name: Option<String>,
    pub remote_peer: Option<String>,
    pub terminal_identity: Option<String>,
    pub window_size: Option<(u16, u16)>,
    pub ansi: Option<bool>,
    pub capabilities: Option<Capabilities>,
}

struct StoreInner {
    sessions: HashMap<u64, Session>,
    /// Stack of activated session ids; the top is the current context.
    active: Vec<u64>,
}

/// Registry of session records plus the policy defaults used when a session
/// is missing. Field updates are atomic per record; scalars are
/// last-write-wins, capability flags OR-merge.
pub struct SessionStore {
    inner: Mutex<StoreInner>,
    ansi_mode: AnsiMode,
    fallback_width: u16,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(AnsiMode::Auto, DEFAULT_FALLBACK_WIDTH)
    }
}

impl SessionStore {
    pub fn new(ansi_mode: AnsiMode, fallback_width: u16) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                sessions: HashMap::new(),
                active: Vec::new(),
            }),
            ansi_mode,
            fallback_width,
        }
    }

    pub fn ansi_mode(&self) -> AnsiMode {
        self.ansi_mode
    }

    /// Create the record for a session if it does not exist yet. Calling
    /// twice is a no-op; existing data is never reset.
    pub fn ensure(&self, id: u64, transport_name: &str) {
        let mut inner = self.lock();
        inner
            .sessions
            .entry(id)
            .or_insert_with(|| Session::new(id, transport_name));
    }

    /// Remove a session record. Never fails; removing a missing session is
    /// a no-op.
    pub fn remove(&self, id: u64) {
        let mut inner = self.lock();
        if inner.sessions.remove(&id).is_some() {
            tracing::info!("session {} removed", id);
        }
    }

    /// Snapshot of a session record, or `None` if it was never created or
    /// already removed. Callers fall back to policy defaults on `None`.
    pub fn get(&self, id: u64) -> Option<Session> {
        self.lock().sessions.get(&id).cloned()
    }

    pub fn apply_overrides(&self, id: u64, overrides: &SessionOverrides) {
        self.update(id, |session| {
            if let Some(name) = &overrides.transport_name {
                session.transport_name = name.clone();
            }
            if let Some(peer) = &overrides.remote_peer {
                session.remote_peer = Some(peer.clone());
            }
            if let Some(identity) = &overrides.terminal_identity {
                session.terminal_identity = Some(identity.clone());
            }
            if let Some((cols, rows)) = overrides.window_size {
                if cols > 0 && rows > 0 {
                    session.window_size = Some((cols, rows));
                }
            }
            if let Some(ansi) = overrides.ansi {
                session.ansi_override = Some(ansi);
            }
            if let Some(caps) = overrides.capabilities {
                session.capabilities |= caps;
            }
        });
    }

    /// Record an in-band resize report. The size fully replaces the previous
    /// one; zero components are rejected and ignored.
    pub fn record_resize_report(&self, id: u64, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            return;
        }
        self.update(id, |session| {
            session.window_size = Some((cols, rows));
            session.capabilities |= Capabilities::RESIZE_REPORTING;
        });
    }

    /// Record a negotiated terminal identity.
    pub fn record_identity(&self, id: u64, identity: &str) {
        self.update(id, |session| {
            session.terminal_identity = Some(identity.to_string());
            session.capabilities |= Capabilities::IDENTITY_REPORTING;
        });
    }

    /// Explicit ANSI override; replaces rather than merges.
    pub fn set_ansi_override(&self, id: u64, ansi: bool) {
        self.update(id, |session| {
            session.ansi_override = Some(ansi);
        });
    }

    /// OR additional capability flags into the record.
    pub fn add_capabilities(&self, id: u64, caps: Capabilities) {
        self.update(id, |session| {
            session.capabilities |= caps;
        });
    }

    /// Fold probe results into the record. Absence of a signal leaves the
    /// field untouched so the policy default still applies.
    pub fn apply_probe(&self, id: u64, report: &ProbeReport) {
        self.update(id, |session| {
            if report.ansi_detected {
                session.ansi_detected = Some(true);
                session.capabilities |= Capabilities::ANSI;
            }
            if let Some((cols, rows)) = report.window_size {
                if cols > 0 && rows > 0 {
                    session.window_size = Some((cols, rows));
                }
            }
        });
    }

    /// Best available render width for the session right now.
    pub fn render_width(&self, id: u64) -> u16 {
        self.get(id)
            .and_then(|s| s.window_size)
            .map(|(cols, _)| cols)
            .unwrap_or(self.fallback_width)
    }

    /// Best available ANSI answer for the session right now.
    pub fn ansi_enabled(&self, id: u64) -> bool {
        match self.get(id) {
            Some(session) => session.ansi_enabled(self.ansi_mode),
            None => match self.ansi_mode {
                AnsiMode::Always | AnsiMode::Auto => true,
                AnsiMode::Never => false,
            },
        }
    }

    /// Make `id` the current session context until the returned guard is
    /// dropped. The previous context is restored on every exit path.
    pub fn activate(&self, id: u64) -> ActiveSessionGuard<'_> {
        self.lock().active.push(id);
        ActiveSessionGuard { store: self, id }
    }

    /// The currently activated session id, if any.
    pub fn current(&self) -> Option<u64> {
        self.lock().active.last().copied()
    }

    fn update(&self, id: u64, f: impl FnOnce(&mut Session)) {
        let mut inner = self.lock();
        if let Some(session) = inner.sessions.get_mut(&id) {
            f(session);
            session.last_updated = SystemTime::now();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scope guard for the active session context. Dropping it restores the
/// previously active session, whether the scope ended normally or not.
pub struct ActiveSessionGuard<'a> {
    store: &'a SessionStore,
    id: u64,
}

impl ActiveSessionGuard<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ActiveSessionGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.store.lock();
        if let Some(pos) = inner.active.iter().rposition(|&id| id == self.id) {
            inner.active.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_is_idempotent() {
        let store = SessionStore::default();
        store.ensure(1, "telnet");
        store.record_identity(1, "xterm");
        store.ensure(1, "telnet");

        let session = store.get(1).unwrap();
        assert_eq!(session.terminal_identity.as_deref(), Some("xterm"));
    }

    #[test]
    fn test_size_updates_are_last_write_wins() {
        let store = SessionStore::default();
        store.ensure(1, "telnet");
        store.record_resize_report(1, 80, 24);
        store.record_resize_report(1, 120, 40);

        let session = store.get(1).unwrap();
        assert_eq!(session.window_size, Some((120, 40)));
        assert!(session.capabilities.contains(Capabilities::RESIZE_REPORTING));
    }

    #[test]
    fn test_zero_size_components_are_rejected() {
        let store = SessionStore::default();
        store.ensure(1, "telnet");
        store.record_resize_report(1, 80, 24);
        store.record_resize_report(1, 0, 40);
        store.record_resize_report(1, 120, 0);

        assert_eq!(store.get(1).unwrap().window_size, Some((80, 24)));
    }

    #[test]
    fn test_capability_flags_or_merge() {
        let store = SessionStore::default();
        store.ensure(1, "telnet");
        store.record_resize_report(1, 120, 40);
        // A later identity update must not clear previously observed flags.
        store.record_identity(1, "vt220");

        let caps = store.get(1).unwrap().capabilities;
        assert!(caps.contains(Capabilities::RESIZE_REPORTING));
        assert!(caps.contains(Capabilities::IDENTITY_REPORTING));
    }

    #[test]
    fn test_removed_session_queries_return_none() {
        let store = SessionStore::default();
        store.ensure(1, "telnet");
        store.record_resize_report(1, 120, 40);
        store.remove(1);
        store.remove(1); // no-op, must not panic

        assert!(store.get(1).is_none());
        assert_eq!(store.render_width(1), DEFAULT_FALLBACK_WIDTH);
        assert!(store.ansi_enabled(1)); // Auto default
    }

    #[test]
    fn test_override_beats_detection() {
        let store = SessionStore::default();
        store.ensure(1, "telnet");
        store.set_ansi_override(1, false);
        store.apply_probe(
            1,
            &ProbeReport {
                ansi_detected: true,
                window_size: None,
            },
        );

        assert!(!store.ansi_enabled(1));
        // Detection is still recorded for inspection.
        assert_eq!(store.get(1).unwrap().ansi_detected, Some(true));
    }

    #[test]
    fn test_probe_results_fill_session() {
        let store = SessionStore::default();
        store.ensure(1, "websocket");
        store.apply_probe(
            1,
            &ProbeReport {
                ansi_detected: true,
                window_size: Some((132, 50)),
            },
        );

        let session = store.get(1).unwrap();
        assert_eq!(session.window_size, Some((132, 50)));
        assert!(session.capabilities.contains(Capabilities::ANSI));
        assert_eq!(store.render_width(1), 132);
    }

    #[test]
    fn test_ansi_mode_policies() {
        let never = SessionStore::new(AnsiMode::Never, 80);
        never.ensure(1, "console");
        assert!(!never.ansi_enabled(1));

        let always = SessionStore::new(AnsiMode::Always, 80);
        assert!(always.ansi_enabled(7)); // even with no session

        let auto = SessionStore::new(AnsiMode::Auto, 80);
        auto.ensure(1, "console");
        // No contrary signal: default to capable.
        assert!(auto.ansi_enabled(1));
    }

    #[test]
    fn test_activation_guard_restores_previous_context() {
        let store = SessionStore::default();
        store.ensure(1, "telnet");
        store.ensure(2, "telnet");

        assert_eq!(store.current(), None);
        let outer = store.activate(1);
        assert_eq!(store.current(), Some(1));
        {
            let _inner = store.activate(2);
            assert_eq!(store.current(), Some(2));
        }
        assert_eq!(store.current(), Some(1));
        drop(outer);
        assert_eq!(store.current(), None);
    }

    #[test]
    fn test_overrides_apply_set_fields_only() {
        let store = SessionStore::default();
        store.ensure(1, "console");
        store.record_identity(1, "xterm");
        store.apply_overrides(
            1,
            &SessionOverrides {
                window_size: Some((100, 30)),
                ansi: Some(true),
                ..Default::default()
            },
        );

        let session = store.get(1).unwrap();
        assert_eq!(session.window_size, Some((100, 30)));
        assert_eq!(session.ansi_override, Some(true));
        assert_eq!(session.terminal_identity.as_deref(), Some("xterm"));
    }
}
