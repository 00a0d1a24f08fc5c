//! ID list files
//!
//! Series lists and membership lists share one line format:
//!
//! ```text
//! # comment lines and blank lines are ignored
//! SERIES-1 : Introduction to Physics
//! SERIES-2
//! ```
//!
//! The first whitespace-delimited token of a line is the ID. Whatever follows
//! it is an annotation for humans and never takes part in matching.

use crate::error::{CommonError, Result};
use serde::Serialize;
use std::path::Path;

/// Character that starts a comment line
pub const COMMENT_MARKER: char = '#';

/// A single entry of an ID list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    /// The identifier (first token of the line)
    pub id: String,

    /// Free-text remainder of the line, trimmed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,

    /// 1-based line number in the source file
    pub line: usize,
}

/// Parsed ID list, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdList {
    entries: Vec<ListEntry>,
}

impl IdList {
    /// Read and parse an ID list file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CommonError::ListFile {
            path: path.to_path_buf(),
            source,
        })?;
        let list = Self::parse(&content);
        tracing::debug!(path = %path.display(), entries = list.len(), "Loaded ID list");
        Ok(list)
    }

    /// Parse ID list content
    pub fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .enumerate()
            .filter_map(|(idx, line)| parse_line(line, idx + 1))
            .collect();
        Self { entries }
    }

    /// Build a list from bare IDs (used for a series given on the command line)
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = ids
            .into_iter()
            .enumerate()
            .map(|(idx, id)| ListEntry {
                id: id.into(),
                annotation: None,
                line: idx + 1,
            })
            .collect();
        Self { entries }
    }

    /// All entries in file order
    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }

    /// Iterate over entries in file order
    pub fn iter(&self) -> impl Iterator<Item = &ListEntry> {
        self.entries.iter()
    }

    /// Iterate over IDs in file order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a single line; `None` for blank and comment lines
pub fn parse_line(line: &str, line_number: usize) -> Option<ListEntry> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
        return None;
    }

    let (id, rest) = match trimmed.find(char::is_whitespace) {
        Some(pos) => (&trimmed[..pos], trimmed[pos..].trim()),
        None => (trimmed, ""),
    };

    Some(ListEntry {
        id: id.to_string(),
        annotation: (!rest.is_empty()).then(|| rest.to_string()),
        line: line_number,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let list = IdList::parse(
            "# series selected for migration\n\
             \n\
             S1 : Physics 101\n   \n\
             \t# indented comment\n\
             S2\n",
        );

        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[0].id, "S1");
        assert_eq!(list.entries()[0].annotation.as_deref(), Some(": Physics 101"));
        assert_eq!(list.entries()[0].line, 3);
        assert_eq!(list.entries()[1].id, "S2");
        assert_eq!(list.entries()[1].annotation, None);
        assert_eq!(list.entries()[1].line, 6);
    }

    #[test]
    fn test_leading_whitespace_and_tabs() {
        let entry = parse_line("   A\tnote-ignored  ", 1).unwrap();
        assert_eq!(entry.id, "A");
        assert_eq!(entry.annotation.as_deref(), Some("note-ignored"));
    }

    #[test]
    fn test_hash_inside_id_is_not_a_comment() {
        let entry = parse_line("abc#1 trailing", 1).unwrap();
        assert_eq!(entry.id, "abc#1");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = IdList::load(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, CommonError::ListFile { .. }));
        assert!(err.to_string().contains("missing.txt"));
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("series.txt");
        std::fs::write(&path, "S1\r\nS2 second\r\n").unwrap();

        let list = IdList::load(&path).unwrap();
        assert_eq!(list.ids().collect::<Vec<_>>(), vec!["S1", "S2"]);
    }

    #[test]
    fn test_from_ids_keeps_order() {
        let list = IdList::from_ids(["b", "a"]);
        assert_eq!(list.ids().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    proptest! {
        #[test]
        fn prop_ids_are_never_empty_or_whitespace(content in "[ \\t#a-zA-Z0-9:\\n-]{0,200}") {
            let list = IdList::parse(&content);
            for entry in list.iter() {
                prop_assert!(!entry.id.is_empty());
                prop_assert!(!entry.id.chars().any(char::is_whitespace));
                prop_assert!(!entry.id.starts_with(COMMENT_MARKER));
            }
        }

        #[test]
        fn prop_annotation_never_changes_id(id in "[A-Za-z0-9_-]{1,24}", note in "[ a-z:]{0,30}") {
            let line = format!("{id} {note}");
            let entry = parse_line(&line, 1).unwrap();
            prop_assert_eq!(entry.id, id);
        }
    }
}
