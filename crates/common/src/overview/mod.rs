//! Reports list and dashboard views
//!
//! Search, bucket filtering and sorting over already-fetched reports, plus
//! the per-team status roll-up shown on the analyst dashboard.

use crate::completion::{calculate_completion, CompletionBucket};
use crate::models::{Report, ReportStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

pub const UNKNOWN_TEAM: &str = "Unknown Team";

/// One row of the reports overview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewRow {
    pub report: Report,
    pub team_name: String,
    pub completion: u8,
    pub bucket: CompletionBucket,
}

impl OverviewRow {
    pub fn new(report: Report) -> Self {
        let completion = calculate_completion(&report);
        let team_name = report
            .team_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_TEAM.to_string());
        Self {
            bucket: CompletionBucket::from_percent(completion),
            completion,
            team_name,
            report,
        }
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.report.updated_at.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Bucket(CompletionBucket),
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            s.parse().map(StatusFilter::Bucket)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortField {
    TeamName,
    #[default]
    LastUpdated,
    Completion,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "team-name" | "team" => Ok(SortField::TeamName),
            "last-updated" | "updated" => Ok(SortField::LastUpdated),
            "completion" => Ok(SortField::Completion),
            other => Err(format!("unknown sort field '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Filter and ordering for the reports overview
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportQuery {
    pub search: Option<String>,
    pub filter: StatusFilter,
    pub sort: SortField,
    pub direction: SortDirection,
}

impl ReportQuery {
    fn matches(&self, row: &OverviewRow) -> bool {
        let search_hit = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term_lower = term.to_lowercase();
                row.team_name.to_lowercase().contains(&term_lower)
                    || row.report.id.is_some_and(|id| id.to_string().contains(term))
            }
        };
        let filter_hit = match self.filter {
            StatusFilter::All => true,
            StatusFilter::Bucket(bucket) => row.bucket == bucket,
        };
        search_hit && filter_hit
    }

    fn compare(&self, a: &OverviewRow, b: &OverviewRow) -> Ordering {
        let ordering = match self.sort {
            SortField::TeamName => a.team_name.to_lowercase().cmp(&b.team_name.to_lowercase()),
            SortField::LastUpdated => a.updated_at().cmp(&b.updated_at()),
            SortField::Completion => a.completion.cmp(&b.completion),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Build the overview rows for `reports`
    pub fn apply(&self, reports: Vec<Report>) -> Vec<OverviewRow> {
        let mut rows: Vec<OverviewRow> = reports
            .into_iter()
            .map(OverviewRow::new)
            .filter(|row| self.matches(row))
            .collect();
        rows.sort_by(|a, b| self.compare(a, b));
        rows
    }
}

/// Dashboard status for a team from the reports filed on it.
///
/// No reports means not started; any report not marked completed keeps the
/// team in progress.
pub fn team_status(reports: &[Report]) -> ReportStatus {
    if reports.is_empty() {
        ReportStatus::NotStarted
    } else if reports.iter().any(|r| r.status != ReportStatus::Completed) {
        ReportStatus::InProgress
    } else {
        ReportStatus::Completed
    }
}
