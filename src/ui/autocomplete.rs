//! Autocomplete contract and overlay state
//!
//! The editor never knows what it is completing. An external
//! [`AutocompleteResolver`] maps the current input and cursor to candidate
//! replacements; this module holds the resolver contract, the overlay state
//! machine the editor drives, and the common-prefix logic for inline
//! completion.

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub value: String,
    pub description: Option<String>,
}

impl Suggestion {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: None,
        }
    }

    pub fn with_description(value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: Some(description.into()),
        }
    }
}

/// Resolver output: which slice of the buffer to replace, with what
/// candidates, plus an optional one-line hint.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Char index where the replaced token starts.
    pub replace_start: usize,
    /// Char length of the replaced token.
    pub replace_length: usize,
    pub suggestions: Vec<Suggestion>,
    /// Single auxiliary guidance line shown without opening the menu.
    pub hint_line: Option<String>,
}

/// Supplied by the host. Called on Tab and, while a menu or hint is
/// showing, on every keystroke (`menu_requested = false` for the lighter
/// live-hint refresh). Must be safe to call that often.
pub trait AutocompleteResolver {
    fn resolve(&self, input: &str, cursor: usize, menu_requested: bool) -> Option<Completion>;
}

/// How an open overlay is presented. Rich mode needs ANSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuMode {
    /// Plain candidate lines printed below the input line.
    Basic,
    /// In-place hint line plus a selectable, cursor-styled menu.
    Rich,
}

/// An open autocomplete menu. `selected` stays in bounds by construction;
/// an empty candidate list never becomes an overlay.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub suggestions: Vec<Suggestion>,
    pub selected: usize,
    pub replace_start: usize,
    pub replace_length: usize,
    pub hint_line: Option<String>,
    pub mode: MenuMode,
}

impl Overlay {
    /// Build an overlay from resolver output, clamping the replace range to
    /// the buffer. Returns `None` for an empty candidate list.
    pub fn from_completion(completion: Completion, mode: MenuMode, buffer_len: usize) -> Option<Self> {
        if completion.suggestions.is_empty() {
            return None;
        }
        let (replace_start, replace_length) =
            clamp_range(completion.replace_start, completion.replace_length, buffer_len);
        Some(Self {
            suggestions: completion.suggestions,
            selected: 0,
            replace_start,
            replace_length,
            hint_line: completion.hint_line,
            mode,
        })
    }

    /// Move selection up; clamped, no wraparound. Returns true if it moved.
    pub fn select_up(&mut self) -> bool {
        if self.selected > 0 {
            self.selected -= 1;
            true
        } else {
            false
        }
    }

    /// Move selection down; clamped, no wraparound. Returns true if it moved.
    pub fn select_down(&mut self) -> bool {
        if self.selected + 1 < self.suggestions.len() {
            self.selected += 1;
            true
        } else {
            false
        }
    }

    pub fn selected_value(&self) -> &str {
        &self.suggestions[self.selected].value
    }
}

/// Clamp a resolver-supplied replace range to the buffer bounds. Malformed
/// ranges degrade instead of erroring.
pub fn clamp_range(start: usize, length: usize, buffer_len: usize) -> (usize, usize) {
    let start = start.min(buffer_len);
    let length = length.min(buffer_len - start);
    (start, length)
}

/// Longest prefix shared by every candidate, by chars.
pub fn common_prefix(suggestions: &[Suggestion]) -> String {
    let Some(first) = suggestions.first() else {
        return String::new();
    };
    let mut prefix: Vec<char> = first.value.chars().collect();
    for suggestion in &suggestions[1..] {
        let mut matched = 0;
        for (a, b) in prefix.iter().zip(suggestion.value.chars()) {
            if *a != b {
                break;
            }
            matched += 1;
        }
        prefix.truncate(matched);
        if prefix.is_empty() {
            break;
        }
    }
    prefix.into_iter().collect()
}

/// Resolver over a fixed word list. Completes the whitespace-delimited
/// token under the cursor; useful for command-name completion and tests.
pub struct WordListResolver {
    words: Vec<Suggestion>,
}

impl WordListResolver {
    pub fn new(words: Vec<Suggestion>) -> Self {
        Self { words }
    }

    /// (start, length) in chars of the token ending at `cursor`.
    fn token_at(input: &str, cursor: usize) -> (usize, usize) {
        let chars: Vec<char> = input.chars().collect();
        let cursor = cursor.min(chars.len());
        let mut start = cursor;
        while start > 0 && !chars[start - 1].is_whitespace() {
            start -= 1;
        }
        (start, cursor - start)
    }
}

impl AutocompleteResolver for WordListResolver {
    fn resolve(&self, input: &str, cursor: usize, _menu_requested: bool) -> Option<Completion> {
        let (start, length) = Self::token_at(input, cursor);
        let token: String = input.chars().skip(start).take(length).collect();

        let suggestions: Vec<Suggestion> = self
            .words
            .iter()
            .filter(|s| s.value.starts_with(&token))
            .cloned()
            .collect();
        if suggestions.is_empty() {
            return None;
        }

        let hint_line = if suggestions.len() == 1 {
            suggestions[0]
                .description
                .clone()
                .map(|d| format!("{}: {}", suggestions[0].value, d))
        } else {
            Some(format!("{} matches", suggestions.len()))
        };

        Some(Completion {
            replace_start: start,
            replace_length: length,
            suggestions,
            hint_line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sug(values: &[&str]) -> Vec<Suggestion> {
        values.iter().map(|v| Suggestion::new(*v)).collect()
    }

    #[test]
    fn test_common_prefix() {
        assert_eq!(common_prefix(&sug(&["hello", "help"])), "hel");
        assert_eq!(common_prefix(&sug(&["abc"])), "abc");
        assert_eq!(common_prefix(&sug(&["foo", "bar"])), "");
        assert_eq!(common_prefix(&[]), "");
    }

    #[test]
    fn test_clamp_range() {
        assert_eq!(clamp_range(0, 5, 5), (0, 5));
        assert_eq!(clamp_range(3, 10, 5), (3, 2));
        assert_eq!(clamp_range(10, 4, 5), (5, 0));
    }

    #[test]
    fn test_overlay_rejects_empty_suggestions() {
        let overlay = Overlay::from_completion(Completion::default(), MenuMode::Basic, 0);
        assert!(overlay.is_none());
    }

    #[test]
    fn test_overlay_selection_clamps() {
        let completion = Completion {
            suggestions: sug(&["a", "b"]),
            ..Default::default()
        };
        let mut overlay = Overlay::from_completion(completion, MenuMode::Rich, 0).unwrap();

        assert!(!overlay.select_up()); // already at top
        assert!(overlay.select_down());
        assert!(!overlay.select_down()); // clamped at bottom
        assert_eq!(overlay.selected_value(), "b");
    }

    #[test]
    fn test_word_list_resolver_token() {
        let resolver = WordListResolver::new(sug(&["hello", "help", "quit"]));
        let completion = resolver.resolve("say he", 6, false).unwrap();
        assert_eq!(completion.replace_start, 4);
        assert_eq!(completion.replace_length, 2);
        assert_eq!(completion.suggestions.len(), 2);
    }

    #[test]
    fn test_word_list_resolver_no_match() {
        let resolver = WordListResolver::new(sug(&["hello"]));
        assert!(resolver.resolve("xyz", 3, false).is_none());
    }
}
