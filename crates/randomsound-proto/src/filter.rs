//! Genre filter: which pools (mixes, tunes) a random pick may come from.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("at least one of mixes or tunes must be selected")]
    Empty,
}

/// Pool of files the server picks from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Mixes,
    Tunes,
    All,
}

impl Selection {
    /// Path segment as it appears after `random/`.
    pub fn as_str(self) -> &'static str {
        match self {
            Selection::Mixes => "mixes",
            Selection::Tunes => "tunes",
            Selection::All => "all",
        }
    }

    /// Relative endpoint on the metadata API, e.g. `random/mixes`.
    pub fn endpoint(self) -> String {
        format!("random/{}", self.as_str())
    }

    /// Parse a selection segment.  Unknown values return `None`; the server
    /// decides what to fall back to.
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "mixes" => Some(Selection::Mixes),
            "tunes" => Some(Selection::Tunes),
            "all" => Some(Selection::All),
            _ => None,
        }
    }
}

/// Which pools the user wants.  Never both false: constructors and toggles
/// refuse that value, and deserialisation falls back to the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFilter")]
pub struct FilterSelection {
    include_mixes: bool,
    include_tunes: bool,
}

#[derive(Deserialize)]
struct RawFilter {
    #[serde(default = "default_true")]
    include_mixes: bool,
    #[serde(default)]
    include_tunes: bool,
}

fn default_true() -> bool {
    true
}

impl TryFrom<RawFilter> for FilterSelection {
    type Error = FilterError;

    fn try_from(raw: RawFilter) -> Result<Self, Self::Error> {
        FilterSelection::new(raw.include_mixes, raw.include_tunes)
    }
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            include_mixes: true,
            include_tunes: false,
        }
    }
}

impl FilterSelection {
    pub fn new(include_mixes: bool, include_tunes: bool) -> Result<Self, FilterError> {
        if !include_mixes && !include_tunes {
            return Err(FilterError::Empty);
        }
        Ok(Self {
            include_mixes,
            include_tunes,
        })
    }

    pub fn include_mixes(&self) -> bool {
        self.include_mixes
    }

    pub fn include_tunes(&self) -> bool {
        self.include_tunes
    }

    /// Flip the mixes flag, refusing to leave nothing selected.
    pub fn toggled_mixes(&self) -> Result<Self, FilterError> {
        Self::new(!self.include_mixes, self.include_tunes)
    }

    /// Flip the tunes flag, refusing to leave nothing selected.
    pub fn toggled_tunes(&self) -> Result<Self, FilterError> {
        Self::new(self.include_mixes, !self.include_tunes)
    }

    pub fn selection(&self) -> Selection {
        match (self.include_mixes, self.include_tunes) {
            (true, true) => Selection::All,
            (false, true) => Selection::Tunes,
            // (false, false) cannot be constructed
            _ => Selection::Mixes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_selection() {
        assert_eq!(FilterSelection::new(false, false), Err(FilterError::Empty));
        assert!(FilterSelection::new(true, false).is_ok());
        assert!(FilterSelection::new(false, true).is_ok());
        assert!(FilterSelection::new(true, true).is_ok());
    }

    #[test]
    fn test_toggle_keeps_one_pool() {
        let only_mixes = FilterSelection::default();
        assert_eq!(only_mixes.toggled_mixes(), Err(FilterError::Empty));

        let both = only_mixes.toggled_tunes().unwrap();
        assert_eq!(both.selection(), Selection::All);

        let only_tunes = both.toggled_mixes().unwrap();
        assert_eq!(only_tunes.selection(), Selection::Tunes);
        assert_eq!(only_tunes.toggled_tunes(), Err(FilterError::Empty));
    }

    #[test]
    fn test_every_valid_selection_has_a_pool() {
        for mixes in [false, true] {
            for tunes in [false, true] {
                if let Ok(f) = FilterSelection::new(mixes, tunes) {
                    assert!(f.include_mixes() || f.include_tunes());
                }
            }
        }
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(Selection::Mixes.endpoint(), "random/mixes");
        assert_eq!(Selection::Tunes.endpoint(), "random/tunes");
        assert_eq!(Selection::All.endpoint(), "random/all");
        assert_eq!(FilterSelection::default().selection(), Selection::Mixes);
    }

    #[test]
    fn test_deserialize_rejects_empty() {
        let ok: FilterSelection =
            serde_json::from_str(r#"{"include_mixes":false,"include_tunes":true}"#).unwrap();
        assert_eq!(ok.selection(), Selection::Tunes);

        let bad = serde_json::from_str::<FilterSelection>(
            r#"{"include_mixes":false,"include_tunes":false}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(Selection::parse("mixes"), Some(Selection::Mixes));
        assert_eq!(Selection::parse("all"), Some(Selection::All));
        assert_eq!(Selection::parse("songs"), None);
    }
}
