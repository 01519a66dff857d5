use crossterm::style::Color;
use serde::{Deserialize, Serialize};

use crate::report::theme;

/// Terminal status of a spec or suite as reported by the in-page reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecStatus {
    Passed,
    Failed,
    Pending,
    Excluded,
    /// Also absorbs status strings this version does not know about.
    #[serde(other)]
    None,
}

impl SpecStatus {
    pub const ALL: [SpecStatus; 5] = [
        SpecStatus::Passed,
        SpecStatus::Failed,
        SpecStatus::Pending,
        SpecStatus::Excluded,
        SpecStatus::None,
    ];

    /// Glyph used in the one-line progress summary.
    pub fn symbol(&self) -> &'static str {
        match self {
            SpecStatus::Passed => ".",
            SpecStatus::Failed => "F",
            SpecStatus::Pending => "*",
            SpecStatus::Excluded | SpecStatus::None => "",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            SpecStatus::Passed => theme::GREEN,
            SpecStatus::Failed => theme::RED,
            SpecStatus::Pending => theme::YELLOW,
            SpecStatus::Excluded | SpecStatus::None => theme::RESET,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecStatus::Passed => "passed",
            SpecStatus::Failed => "failed",
            SpecStatus::Pending => "pending",
            SpecStatus::Excluded => "excluded",
            SpecStatus::None => "none",
        }
    }
}

impl std::fmt::Display for SpecStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_decodes_lowercase_names() {
        let statuses: Vec<SpecStatus> =
            serde_json::from_str(r#"["passed","failed","pending","excluded","none"]"#).unwrap();
        assert_eq!(statuses, SpecStatus::ALL);
    }

    #[test]
    fn test_unknown_status_falls_back_to_none() {
        let status: SpecStatus = serde_json::from_str(r#""incomplete""#).unwrap();
        assert_eq!(status, SpecStatus::None);
    }

    #[test]
    fn test_only_reported_outcomes_have_glyphs() {
        assert_eq!(SpecStatus::Passed.symbol(), ".");
        assert_eq!(SpecStatus::Failed.symbol(), "F");
        assert_eq!(SpecStatus::Pending.symbol(), "*");
        assert!(SpecStatus::Excluded.symbol().is_empty());
        assert!(SpecStatus::None.symbol().is_empty());
    }
}
