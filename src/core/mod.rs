//! Core engine plumbing: transport buffering, key decoding, capability
//! probing, and per-session terminal metadata.

pub mod bridge;
pub mod keys;
pub mod probe;
pub mod session;

pub use bridge::{CancelToken, Cancelled, TextBridge};
pub use keys::{ControlKey, KeyEvent, KeyParser};
pub use probe::{CapabilityProbe, ProbeError, ProbeReport};
pub use session::{
    ActiveSessionGuard, AnsiMode, Capabilities, Session, SessionOverrides, SessionStore,
};
