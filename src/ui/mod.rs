//! Line editing and rendering: buffer mutation, diff-based redraw, history
//! navigation, and autocomplete overlays.

pub mod autocomplete;
pub mod editor;
pub mod renderer;

pub use autocomplete::{
    AutocompleteResolver, Completion, MenuMode, Overlay, Suggestion, WordListResolver,
};
pub use editor::{EditBuffer, EditorError, LineEditor, ReadOutcome};
pub use renderer::LineRenderer;
