//! Durable storage for the filter selection.

use crate::filter::FilterSelection;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Reads and writes the persisted `FilterSelection` as JSON.
#[derive(Debug, Clone)]
pub struct FilterStore {
    state_file: PathBuf,
}

impl FilterStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    pub fn path(&self) -> &Path {
        &self.state_file
    }

    /// Missing, unreadable or invalid files all yield the default selection.
    pub fn load(&self) -> FilterSelection {
        let content = match std::fs::read_to_string(&self.state_file) {
            Ok(c) => c,
            Err(_) => return FilterSelection::default(),
        };
        match serde_json::from_str::<FilterSelection>(&content) {
            Ok(filter) => filter,
            Err(e) => {
                warn!(
                    "ignoring filter state in {}: {}",
                    self.state_file.display(),
                    e
                );
                FilterSelection::default()
            }
        }
    }

    pub fn save(&self, filter: &FilterSelection) -> anyhow::Result<()> {
        if let Some(parent) = self.state_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(filter)?;
        std::fs::write(&self.state_file, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Selection;

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilterStore::new(dir.path().join("filters.json"));
        let filter = store.load();
        assert!(filter.include_mixes());
        assert!(!filter.include_tunes());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilterStore::new(dir.path().join("sub").join("filters.json"));
        let filter = FilterSelection::new(false, true).unwrap();
        store.save(&filter).unwrap();
        assert_eq!(store.load().selection(), Selection::Tunes);
    }

    #[test]
    fn test_empty_selection_on_disk_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filters.json");
        std::fs::write(&path, r#"{"include_mixes":false,"include_tunes":false}"#).unwrap();
        let store = FilterStore::new(path);
        assert_eq!(store.load(), FilterSelection::default());
    }
}
