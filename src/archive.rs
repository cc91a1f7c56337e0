//! Archive data structures

use crate::error::{Error, FormatError, Result};
use std::path::{Component, Path};

// Wire format constants
pub const FILENAME_PREFIX: &str = "Filename: ";
pub const CHECKSUM_PREFIX: &str = "Checksum: ";
pub const DESCRIPTION_PREFIX: &str = "Description: ";
pub const SHA256_ALGORITHM: &str = "SHA256";
pub const CHECKSUM_HEX_LEN: usize = 64;

/// Separator used when none is given
pub const DEFAULT_SEPARATOR: &str = "========= BOUNDARY ==========";

/// A validated separator token.
///
/// Never empty, never contains a line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separator(String);

impl Separator {
    /// Validate a separator supplied as configuration (encode path).
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::config("separator cannot be empty"));
        }
        if value.contains(|c: char| c == '\n' || c == '\r') {
            return Err(Error::config("separator cannot contain a line terminator"));
        }
        // Decoding trims the first line, so padding would never match again
        if value.trim() != value {
            return Err(Error::config("separator cannot start or end with whitespace"));
        }
        Ok(Self(value))
    }

    /// Detect the separator from the first line of a stream (decode path).
    /// Surrounding whitespace is trimmed.
    pub fn detect(first_line: &str) -> Result<Self> {
        let trimmed = first_line.trim();
        if trimmed.is_empty() {
            return Err(Error::format(1, FormatError::InvalidSeparator));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact comparison against a raw, untrimmed line
    pub fn matches(&self, line: &str) -> bool {
        line == self.0
    }
}

impl Default for Separator {
    fn default() -> Self {
        Self(DEFAULT_SEPARATOR.to_string())
    }
}

impl std::fmt::Display for Separator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check that a filename is a relative path to a file that stays under the
/// destination root.
pub fn is_safe_relative_path(name: &str) -> bool {
    if name.is_empty() || name.contains(|c: char| c == '\n' || c == '\r') {
        return false;
    }
    // `components()` drops a trailing `.` or `/`, both of which name a directory
    if name.ends_with('/') || name.rsplit('/').next() == Some(".") {
        return false;
    }
    let mut has_normal = false;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    has_normal
}

/// Represents a single file in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Relative path of the file (may include subdirectories)
    pub name: String,
    /// Contents of the file, every line newline-terminated
    pub data: Vec<u8>,
    /// Lowercase hex SHA-256 digest, when the archive carried one
    pub checksum: Option<String>,
}

impl Entry {
    /// Create an entry without a checksum
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            checksum: None,
        }
    }
}

/// Represents a bundle containing multiple files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    /// Free-text description from the header section
    pub description: String,
    /// Entries in archive order
    pub entries: Vec<Entry>,
}

impl Archive {
    /// Create a new empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an archive with a description
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Add an entry. Names are not required to be unique: an entry with the
    /// same name replaces the earlier one in place.
    pub fn add_entry(&mut self, entry: Entry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Look up an entry by name
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_rejects_empty() {
        assert!(matches!(Separator::new(""), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_separator_rejects_newline() {
        assert!(matches!(Separator::new("a\nb"), Err(Error::Configuration(_))));
        assert!(matches!(Separator::new("a\r"), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_separator_detect_trims() {
        let sep = Separator::detect("  ==SEP==\t").unwrap();
        assert_eq!(sep.as_str(), "==SEP==");
        assert!(sep.matches("==SEP=="));
        // Comparison against content lines is exact
        assert!(!sep.matches(" ==SEP=="));
    }

    #[test]
    fn test_separator_rejects_padding() {
        assert!(matches!(Separator::new("=== SEP === "), Err(Error::Configuration(_))));
        assert!(matches!(Separator::new("\t==SEP=="), Err(Error::Configuration(_))));
        assert!(Separator::new("=== SEP ===").is_ok());
    }

    #[test]
    fn test_separator_new_agrees_with_detect() {
        for value in ["==SEP==", "=== BOUNDARY ===", "-", DEFAULT_SEPARATOR] {
            let configured = Separator::new(value).unwrap();
            let detected = Separator::detect(configured.as_str()).unwrap();
            assert_eq!(configured, detected);
            assert!(detected.matches(configured.as_str()));
        }
    }

    #[test]
    fn test_separator_detect_blank_line() {
        let err = Separator::detect("   ").unwrap_err();
        assert_eq!(err.format_kind(), Some(&FormatError::InvalidSeparator));
    }

    #[test]
    fn test_safe_relative_path() {
        assert!(is_safe_relative_path("a.txt"));
        assert!(is_safe_relative_path("dir/sub/file.rs"));
        assert!(is_safe_relative_path("./dir/file.rs"));
        assert!(!is_safe_relative_path(""));
        assert!(!is_safe_relative_path("/etc/passwd"));
        assert!(!is_safe_relative_path("../outside.txt"));
        assert!(!is_safe_relative_path("dir/../../outside.txt"));
        assert!(!is_safe_relative_path("two\nlines"));
        assert!(!is_safe_relative_path("."));
        assert!(!is_safe_relative_path("./"));
        assert!(!is_safe_relative_path("dir/."));
        assert!(!is_safe_relative_path("dir/"));
    }

    #[test]
    fn test_add_entry_last_write_wins() {
        let mut archive = Archive::new();
        archive.add_entry(Entry::new("a.txt", "first\n"));
        archive.add_entry(Entry::new("b.txt", "other\n"));
        archive.add_entry(Entry::new("a.txt", "second\n"));

        assert_eq!(archive.len(), 2);
        assert_eq!(archive.entries[0].name, "a.txt");
        assert_eq!(archive.get("a.txt").unwrap().data, b"second\n");
    }
}
