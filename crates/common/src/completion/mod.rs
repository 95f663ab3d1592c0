//! Report completion estimator
//!
//! Completion is an advisory measure of how filled-in a report's panels are.
//! Every panel contributes three checks (text, images, stats) and the
//! percentage is taken over all checks combined, so a half-filled panel earns
//! partial credit. It is independent of the analyst-declared
//! [`ReportStatus`](crate::models::ReportStatus) and never gates saving.

use crate::models::{Panel, Report};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Panel text must be longer than this many characters to count
pub const MIN_CONTENT_CHARS: usize = 50;

/// Checks evaluated per panel
pub const CHECKS_PER_PANEL: u32 = 3;

/// Raw tally behind a completion percentage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionTally {
    pub completed: u32,
    pub total: u32,
}

impl CompletionTally {
    /// `round(100 * completed / total)`, 0 when there is nothing to check
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let ratio = f64::from(self.completed) / f64::from(self.total);
        (ratio * 100.0).round() as u8
    }
}

fn panel_checks(panel: &Panel) -> [bool; CHECKS_PER_PANEL as usize] {
    let has_content = panel
        .content
        .as_deref()
        .is_some_and(|text| text.chars().count() > MIN_CONTENT_CHARS);
    let has_images = !panel.images.is_empty();
    let has_stats = panel.stats.values().any(|value| *value > 0.0);
    [has_content, has_images, has_stats]
}

/// Tally the checks across every panel
pub fn tally_panels(panels: &BTreeMap<String, Panel>) -> CompletionTally {
    panels
        .values()
        .flat_map(panel_checks)
        .fold(CompletionTally::default(), |mut tally, passed| {
            tally.total += 1;
            if passed {
                tally.completed += 1;
            }
            tally
        })
}

/// Completion percentage (0..=100) of a report; 0 when it has no panels
pub fn calculate_completion(report: &Report) -> u8 {
    report
        .panels
        .as_ref()
        .map_or(0, |panels| tally_panels(panels).percent())
}

/// Three-way view of a completion percentage, used for filtering and sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionBucket {
    NotStarted,
    InProgress,
    Completed,
}

impl CompletionBucket {
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            0 => CompletionBucket::NotStarted,
            100.. => CompletionBucket::Completed,
            _ => CompletionBucket::InProgress,
        }
    }

    pub fn of(report: &Report) -> Self {
        Self::from_percent(calculate_completion(report))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionBucket::NotStarted => "not-started",
            CompletionBucket::InProgress => "in-progress",
            CompletionBucket::Completed => "completed",
        }
    }
}

impl fmt::Display for CompletionBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not-started" => Ok(CompletionBucket::NotStarted),
            "in-progress" => Ok(CompletionBucket::InProgress),
            "completed" => Ok(CompletionBucket::Completed),
            other => Err(format!("unknown completion bucket '{}'", other)),
        }
    }
}
