//! Command history
//!
//! The editor only needs the [`HistoryProvider`] contract: a bounded window
//! of recent entries for Up/Down navigation and an append after each
//! submitted line. [`CommandHistory`] is the default implementation,
//! persisting to `~/.termline/history` with consecutive-duplicate and
//! sensitive-command filtering.

use std::fs;
use std::path::PathBuf;

use crate::config::home_dir;

/// Maximum number of history entries
const HISTORY_LIMIT: usize = 1000;

/// What the line editor requires from a history source. Entries are plain
/// strings, most-recent last; the editor reads at navigation start and
/// appends submitted non-empty lines.
pub trait HistoryProvider {
    /// Up to `max` most recent entries, oldest first / most-recent last.
    fn recent(&self, max: usize) -> Vec<String>;
    /// Record a submitted line.
    fn append(&mut self, entry: &str);
}

/// A single history entry
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    /// The command text
    pub command: String,
    /// Unix timestamp
    pub timestamp: u64,
}

/// Command history storage
pub struct CommandHistory {
    /// All history entries (newest last)
    entries: Vec<HistoryEntry>,
    /// File path for persistence
    file_path: Option<PathBuf>,
    /// Maximum entries
    max_entries: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHistory {
    /// Create a file-backed history, loading any existing entries.
    pub fn new() -> Self {
        let file_path = Self::history_path();
        let mut history = Self {
            entries: Vec::new(),
            file_path,
            max_entries: HISTORY_LIMIT,
        };
        history.load();
        history
    }

    /// Create a purely in-memory history (no persistence).
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            file_path: None,
            max_entries,
        }
    }

    /// Get history file path
    fn history_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let dir = home.join(".termline");
            if !dir.exists() {
                let _ = fs::create_dir_all(&dir);
            }
            return Some(dir.join("history"));
        }
        None
    }

    /// Load history from file
    fn load(&mut self) {
        if let Some(ref path) = self.file_path {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(path) {
                    for line in content.lines() {
                        if let Some((ts_str, cmd)) = line.split_once(';') {
                            if let Ok(timestamp) = ts_str.parse::<u64>() {
                                self.entries.push(HistoryEntry {
                                    command: cmd.to_string(),
                                    timestamp,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    /// Save history to file
    fn save(&self) {
        if let Some(ref path) = self.file_path {
            let content: String = self
                .entries
                .iter()
                .map(|e| format!("{};{}", e.timestamp, e.command))
                .collect::<Vec<_>>()
                .join("\n");
            let _ = fs::write(path, content);
        }
    }

    /// Add a command to history
    pub fn add(&mut self, command: &str) {
        // Skip empty or whitespace-only commands
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return;
        }

        // Skip if same as last command (dedup consecutive)
        if let Some(last) = self.entries.last() {
            if last.command == trimmed {
                return;
            }
        }

        // Skip sensitive commands
        if Self::is_sensitive(trimmed) {
            return;
        }

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.entries.push(HistoryEntry {
            command: trimmed.to_string(),
            timestamp,
        });

        // Trim if exceeding limit
        while self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }

        self.save();
    }

    /// Check if command is sensitive (shouldn't be saved)
    fn is_sensitive(command: &str) -> bool {
        let lower = command.to_lowercase();
        let sensitive_patterns = [
            "password", "passwd", "secret", "token", "api_key", "apikey", "credential",
        ];
        sensitive_patterns.iter().any(|p| lower.contains(p))
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HistoryProvider for CommandHistory {
    fn recent(&self, max: usize) -> Vec<String> {
        let skip = self.entries.len().saturating_sub(max);
        self.entries
            .iter()
            .skip(skip)
            .map(|e| e.command.clone())
            .collect()
    }

    fn append(&mut self, entry: &str) {
        self.add(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_is_most_recent_last() {
        let mut history = CommandHistory::in_memory(10);
        history.append("first");
        history.append("second");
        history.append("third");

        assert_eq!(history.recent(2), vec!["second", "third"]);
        assert_eq!(history.recent(10), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_consecutive_duplicates_skipped() {
        let mut history = CommandHistory::in_memory(10);
        history.append("ls");
        history.append("ls");
        history.append("cd /");
        history.append("ls");

        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_empty_entries_skipped() {
        let mut history = CommandHistory::in_memory(10);
        history.append("");
        history.append("   ");
        assert!(history.is_empty());
    }

    #[test]
    fn test_sensitive_commands_skipped() {
        let mut history = CommandHistory::in_memory(10);
        history.append("export API_KEY=abc");
        history.append("echo hello");

        assert_eq!(history.recent(10), vec!["echo hello"]);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = CommandHistory::in_memory(2);
        history.append("one");
        history.append("two");
        history.append("three");

        assert_eq!(history.recent(10), vec!["two", "three"]);
    }
}
