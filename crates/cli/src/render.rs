//! Plain-text rendering of reports, dashboards and notifications

use chrono::{DateTime, Utc};
use scoutdeck_common::{
    completion::calculate_completion,
    lifecycle::TeamStatusRow,
    models::{Activity, Report, Team},
    overview::{OverviewRow, UNKNOWN_TEAM},
};
use std::fmt::Write;

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn or_dash(text: &str) -> &str {
    if text.trim().is_empty() {
        "-"
    } else {
        text
    }
}

pub fn teams(teams: &[Team]) -> String {
    let mut out = String::new();
    for team in teams {
        let _ = writeln!(out, "{:>4}  {:<26} {:<16} {}", team.id, team.name, team.league, team.color);
    }
    out
}

pub fn overview(rows: &[OverviewRow]) -> String {
    if rows.is_empty() {
        return "No reports found.\n".to_string();
    }
    let mut out = format!(
        "{:>5}  {:<26} {:<12} {:>10}  {}\n",
        "ID", "TEAM", "STATUS", "COMPLETION", "UPDATED"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:>5}  {:<26} {:<12} {:>9}%  {}",
            row.report.id.map(|id| id.to_string()).unwrap_or_default(),
            row.team_name,
            row.report.status.label(),
            row.completion,
            timestamp(row.report.updated_at)
        );
    }
    out
}

pub fn dashboard(rows: &[TeamStatusRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "{:>4}  {:<26} {:<12} ({} report{})",
            row.team.id,
            row.team.name,
            row.status.label(),
            row.report_count,
            if row.report_count == 1 { "" } else { "s" }
        );
    }
    out
}

pub fn report(report: &Report) -> String {
    let mut out = String::new();
    let team = report.team_name.as_deref().unwrap_or(UNKNOWN_TEAM);
    let _ = writeln!(out, "Report #{} on {}", report.id.unwrap_or_default(), team);
    if let Some(author) = report.author_name.as_deref().filter(|a| !a.is_empty()) {
        let _ = writeln!(out, "Author:      {}", author);
    }
    let _ = writeln!(out, "Status:      {}", report.status.label());
    let _ = writeln!(out, "Completion:  {}%", calculate_completion(report));
    let _ = writeln!(out, "Updated:     {}", timestamp(report.updated_at));

    let _ = writeln!(out, "\nKey players");
    if report.key_players.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for player in &report.key_players {
        let rating = player
            .rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<24} {:<8} {:>4}  {}",
            or_dash(&player.name),
            or_dash(&player.position),
            rating,
            player.strengths
        );
    }

    let stats = &report.match_stats;
    let stat = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "\nMatch stats");
    let _ = writeln!(
        out,
        "  possession {}%  shots {} ({} on target)  passes {} ({}% accurate)  corners {}  fouls {}",
        stat(stats.possession),
        stat(stats.shots),
        stat(stats.shots_on_target),
        stat(stats.passes),
        stat(stats.pass_accuracy),
        stat(stats.corners),
        stat(stats.fouls)
    );

    let summary = &report.tactical_summary;
    let _ = writeln!(out, "\nTactical summary");
    let _ = writeln!(
        out,
        "  formation:  {}",
        summary.formation.map(|f| f.to_string()).unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(out, "  overview:   {}", or_dash(&summary.overview));
    let _ = writeln!(out, "  strengths:  {}", or_dash(&summary.strengths));
    let _ = writeln!(out, "  weaknesses: {}", or_dash(&summary.weaknesses));

    let _ = writeln!(out, "\nPerformance insights\n  {}", or_dash(&report.performance_insights));
    out
}

pub fn activity(activity: &Activity) -> String {
    format!("[{}] {}", activity.created_at.format("%Y-%m-%d %H:%M"), activity.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoutdeck_common::models::{Formation, KeyPlayer, ReportStatus};
    use scoutdeck_common::overview::ReportQuery;

    #[test]
    fn test_empty_overview() {
        assert_eq!(overview(&[]), "No reports found.\n");
    }

    #[test]
    fn test_overview_row_shows_status_label_and_completion() {
        let rows = ReportQuery::default().apply(vec![Report {
            id: Some(12),
            team: 1,
            team_name: Some("Arsenal".into()),
            status: ReportStatus::InProgress,
            ..Default::default()
        }]);
        let text = overview(&rows);
        assert!(text.contains("Arsenal"));
        assert!(text.contains("In Progress"));
        assert!(text.contains("0%"));
    }

    #[test]
    fn test_report_detail() {
        let mut report = Report {
            id: Some(3),
            team: 2,
            status: ReportStatus::Completed,
            performance_insights: "Presses high after losses".into(),
            ..Default::default()
        };
        report.key_players.push(KeyPlayer {
            id: 1,
            name: "Ollie Watkins".into(),
            position: "ST".into(),
            rating: Some(7.25),
            strengths: "Runs in behind".into(),
        });
        report.tactical_summary.formation = Some(Formation::FourTwoThreeOne);

        let text = super::report(&report);
        assert!(text.starts_with("Report #3 on Unknown Team"));
        assert!(text.contains("Status:      Completed"));
        assert!(text.contains("Ollie Watkins"));
        assert!(text.contains("7.2") || text.contains("7.3"));
        assert!(text.contains("formation:  4-2-3-1"));
        assert!(text.contains("Presses high after losses"));
    }
}
