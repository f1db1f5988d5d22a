//! Settings shared by the fixture generator and the CLI.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::dump::PrintOptions;
use crate::summary::DEFAULT_LINE_LENGTH;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    /// Total width of the summary table.
    pub line_length: usize,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            line_length: DEFAULT_LINE_LENGTH,
        }
    }
}

/// Everything that shapes fixture output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureSettings {
    /// Seed for weight initialization. `None` draws one from OS entropy.
    pub seed: Option<u64>,
    pub print: PrintOptions,
    pub summary: SummarySettings,
}

impl FixtureSettings {
    /// Load settings from a JSON file; missing fields take their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: FixtureSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings.sanitize();
        Ok(settings)
    }

    /// Replace values that would make the output unreadable with defaults.
    fn sanitize(&mut self) {
        let defaults = PrintOptions::default();
        if self.print.line_width < 10 {
            warn!(
                "print.line_width {} is too small; using {}",
                self.print.line_width, defaults.line_width
            );
            self.print.line_width = defaults.line_width;
        }
        if self.print.edge_items == 0 {
            warn!("print.edge_items must be > 0; using {}", defaults.edge_items);
            self.print.edge_items = defaults.edge_items;
        }
        if self.summary.line_length < 20 {
            warn!(
                "summary.line_length {} is too small; using {DEFAULT_LINE_LENGTH}",
                self.summary.line_length
            );
            self.summary.line_length = DEFAULT_LINE_LENGTH;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(file, r#"{{"seed": 42, "print": {{"precision": 4}}}}"#).expect("write");

        let settings = FixtureSettings::load_from_path(file.path()).expect("load");
        assert_eq!(settings.seed, Some(42));
        assert_eq!(settings.print.precision, 4);
        assert_eq!(settings.print.line_width, 75);
        assert_eq!(settings.summary.line_length, DEFAULT_LINE_LENGTH);
    }

    #[test]
    fn degenerate_widths_fall_back() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(
            file,
            r#"{{"print": {{"line_width": 2, "edge_items": 0}}, "summary": {{"line_length": 5}}}}"#
        )
        .expect("write");

        let settings = FixtureSettings::load_from_path(file.path()).expect("load");
        assert_eq!(settings.print, PrintOptions::default());
        assert_eq!(settings.summary, SummarySettings::default());
    }

    #[test]
    fn malformed_json_reports_path() {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(file, "not json").expect("write");
        let err = FixtureSettings::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse settings JSON"));
    }
}
