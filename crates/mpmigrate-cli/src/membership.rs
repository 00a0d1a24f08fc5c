//! Membership classification
//!
//! Decides which destination queue an item belongs to, based on an externally
//! supplied membership list.

use crate::error::{CliError, Result};
use mpmigrate_common::IdList;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// How list entries are compared with item IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The entry equals the item ID
    #[default]
    Exact,
    /// The item ID occurs anywhere inside the entry.
    ///
    /// Compatibility mode for lists prepared for the old shell tooling. An ID
    /// that is a substring of another ID is misrouted in this mode.
    Substring,
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::Substring => write!(f, "substring"),
        }
    }
}

/// Routing decision for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    InList,
    NotInList,
}

/// A loaded membership list
#[derive(Debug, Clone)]
pub struct MembershipList {
    ids: Vec<String>,
    exact: HashSet<String>,
    mode: MatchMode,
}

impl MembershipList {
    /// Load the membership list at `path`.
    ///
    /// An unreadable file is a classification error, never an empty list.
    pub fn load(path: impl AsRef<Path>, mode: MatchMode) -> Result<Self> {
        let list = IdList::load(path.as_ref())
            .map_err(|e| CliError::classification("membership list", e))?;
        Ok(Self::from_id_list(&list, mode))
    }

    pub fn from_id_list(list: &IdList, mode: MatchMode) -> Self {
        let ids: Vec<String> = list.ids().map(str::to_string).collect();
        let exact = ids.iter().cloned().collect();
        Self { ids, exact, mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Whether `item_id` is a member of the list
    pub fn contains(&self, item_id: &str) -> bool {
        if item_id.is_empty() {
            return false;
        }
        match self.mode {
            MatchMode::Exact => self.exact.contains(item_id),
            MatchMode::Substring => self.ids.iter().any(|id| id.contains(item_id)),
        }
    }

    pub fn classify(&self, item_id: &str) -> Route {
        if self.contains(item_id) {
            Route::InList
        } else {
            Route::NotInList
        }
    }
}

/// Classify a single item against the membership file at `path`
pub fn classify(item_id: &str, path: impl AsRef<Path>, mode: MatchMode) -> Result<Route> {
    Ok(MembershipList::load(path, mode)?.classify(item_id))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn list(content: &str, mode: MatchMode) -> MembershipList {
        MembershipList::from_id_list(&IdList::parse(content), mode)
    }

    #[test]
    fn test_routing() {
        let members = list("# members\nS123 kept for archive\n", MatchMode::Exact);
        assert_eq!(members.classify("S123"), Route::InList);
        assert_eq!(members.classify("S999"), Route::NotInList);
    }

    #[test]
    fn test_annotation_is_not_matched() {
        let members = list("A note-ignored\n", MatchMode::Exact);
        assert_eq!(members.classify("note-ignored"), Route::NotInList);
        assert_eq!(members.classify("A"), Route::InList);
    }

    #[test]
    fn test_commented_ids_are_not_members() {
        let members = list("#S1\n  # S2\nS3\n", MatchMode::Exact);
        assert_eq!(members.classify("S1"), Route::NotInList);
        assert_eq!(members.classify("S2"), Route::NotInList);
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn test_exact_mode_does_not_match_prefixes() {
        let members = list("S12\n", MatchMode::Exact);
        assert_eq!(members.classify("S1"), Route::NotInList);
    }

    #[test]
    fn test_substring_mode_reproduces_old_behaviour() {
        let members = list("S12\n", MatchMode::Substring);
        assert_eq!(members.classify("S1"), Route::InList);
        assert_eq!(members.classify("S12"), Route::InList);
        assert_eq!(members.classify("S123"), Route::NotInList);
        assert_eq!(members.classify(""), Route::NotInList);
    }

    #[test]
    fn test_unreadable_file_is_classification_error() {
        let dir = TempDir::new().unwrap();
        let err = classify("S1", dir.path().join("absent.txt"), MatchMode::Exact).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Classification);
    }

    #[test]
    fn test_classify_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("members.txt");
        std::fs::write(&path, "S123\n").unwrap();
        assert_eq!(classify("S123", &path, MatchMode::Exact).unwrap(), Route::InList);
    }
}
