//! Scouting report entity and its typed sub-sections

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Analyst-declared report status.
///
/// Never derived from the completion percentage; see
/// [`crate::completion::CompletionBucket`] for the computed view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::NotStarted => "not-started",
            ReportStatus::InProgress => "in-progress",
            ReportStatus::Completed => "completed",
        }
    }

    /// Human label used by list views
    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::NotStarted => "Not Started",
            ReportStatus::InProgress => "In Progress",
            ReportStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not-started" => Ok(ReportStatus::NotStarted),
            "in-progress" => Ok(ReportStatus::InProgress),
            "completed" => Ok(ReportStatus::Completed),
            other => Err(format!("unknown report status '{}'", other)),
        }
    }
}

/// Standard formations offered by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Formation {
    #[serde(rename = "4-4-2")]
    FourFourTwo,
    #[serde(rename = "4-3-3")]
    FourThreeThree,
    #[serde(rename = "4-2-3-1")]
    FourTwoThreeOne,
    #[serde(rename = "3-5-2")]
    ThreeFiveTwo,
    #[serde(rename = "3-4-3")]
    ThreeFourThree,
    #[serde(rename = "5-3-2")]
    FiveThreeTwo,
    #[serde(rename = "5-4-1")]
    FiveFourOne,
}

impl Formation {
    pub const ALL: [Formation; 7] = [
        Formation::FourFourTwo,
        Formation::FourThreeThree,
        Formation::FourTwoThreeOne,
        Formation::ThreeFiveTwo,
        Formation::ThreeFourThree,
        Formation::FiveThreeTwo,
        Formation::FiveFourOne,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Formation::FourFourTwo => "4-4-2",
            Formation::FourThreeThree => "4-3-3",
            Formation::FourTwoThreeOne => "4-2-3-1",
            Formation::ThreeFiveTwo => "3-5-2",
            Formation::ThreeFourThree => "3-4-3",
            Formation::FiveThreeTwo => "5-3-2",
            Formation::FiveFourOne => "5-4-1",
        }
    }
}

impl fmt::Display for Formation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Formation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formation::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| format!("unknown formation '{}'", s))
    }
}

impl<'de> Deserialize<'de> for Formation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Accepts `null`, `""`, numbers and numeric strings.
///
/// Form state travels as raw input text, so a stat or rating the analyst
/// never touched arrives as an empty string.
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                Ok(None)
            } else {
                text.parse::<f64>().map(Some).map_err(de::Error::custom)
            }
        }
    }
}

fn lenient_formation<'de, D>(deserializer: D) -> Result<Option<Formation>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => text.parse().map(Some).map_err(de::Error::custom),
    }
}

/// A player singled out in the report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct KeyPlayer {
    #[serde(default)]
    pub id: u32,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 50))]
    pub position: String,

    /// 0-10, continuous
    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0, max = 10.0))]
    pub rating: Option<f64>,

    #[serde(default)]
    pub strengths: String,
}

impl KeyPlayer {
    pub fn empty(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Fixed-shape match statistics; every field starts unset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchStats {
    /// Possession percentage
    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub possession: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0))]
    pub shots: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0))]
    pub shots_on_target: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0))]
    pub passes: Option<f64>,

    /// Pass accuracy percentage
    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub pass_accuracy: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0))]
    pub corners: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number")]
    #[validate(range(min = 0.0))]
    pub fouls: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TacticalSummary {
    #[serde(default, deserialize_with = "lenient_formation")]
    pub formation: Option<Formation>,

    #[serde(default)]
    pub overview: String,

    #[serde(default)]
    pub strengths: String,

    #[serde(default)]
    pub weaknesses: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Panel stats keyed by name. A cleared input is sent as `null` (or `""`);
/// such entries are dropped rather than failing the whole report.
fn lenient_stats<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Stat(#[serde(deserialize_with = "lenient_number")] Option<f64>);

    let raw = Option::<BTreeMap<String, Stat>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, Stat(value))| value.filter(|v| v.is_finite()).map(|v| (name, v)))
        .collect())
}

/// A named report section (e.g. in-possession, out-of-possession)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<String>,

    #[serde(default, deserialize_with = "lenient_stats")]
    pub stats: BTreeMap<String, f64>,
}

/// A scouting report as the backend returns it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Absent for an unsaved draft
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    pub team: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_logo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    #[serde(default)]
    pub status: ReportStatus,

    #[serde(default)]
    pub key_players: Vec<KeyPlayer>,

    #[serde(default)]
    pub match_stats: MatchStats,

    #[serde(default)]
    pub tactical_summary: TacticalSummary,

    #[serde(default)]
    pub performance_insights: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panels: Option<BTreeMap<String, Panel>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// The analyst-editable part of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReportForm {
    #[serde(default)]
    #[validate(nested)]
    pub key_players: Vec<KeyPlayer>,

    #[serde(default)]
    #[validate(nested)]
    pub match_stats: MatchStats,

    #[serde(default)]
    pub tactical_summary: TacticalSummary,

    #[serde(default)]
    pub performance_insights: String,

    #[serde(default = "default_form_status")]
    pub status: ReportStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panels: Option<BTreeMap<String, Panel>>,
}

fn default_form_status() -> ReportStatus {
    ReportStatus::InProgress
}

impl Default for ReportForm {
    /// A fresh draft: one blank player row, status `in-progress`
    fn default() -> Self {
        Self {
            key_players: vec![KeyPlayer::empty(1)],
            match_stats: MatchStats::default(),
            tactical_summary: TacticalSummary::default(),
            performance_insights: String::new(),
            status: default_form_status(),
            panels: None,
        }
    }
}

impl ReportForm {
    pub fn from_report(report: &Report) -> Self {
        Self {
            key_players: report.key_players.clone(),
            match_stats: report.match_stats.clone(),
            tactical_summary: report.tactical_summary.clone(),
            performance_insights: report.performance_insights.clone(),
            status: report.status,
            panels: report.panels.clone(),
        }
    }

    /// Next player id: one past the highest in use, or 1
    pub fn next_player_id(&self) -> u32 {
        self.key_players.iter().map(|p| p.id).max().map_or(1, |max| max + 1)
    }

    pub fn into_payload(self, team_id: i64) -> ReportPayload {
        ReportPayload { team_id, form: self }
    }
}

/// Create / update body: the report shape with `team_id` in place of `team`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ReportPayload {
    #[validate(range(min = 1))]
    pub team_id: i64,

    #[serde(flatten)]
    #[validate(nested)]
    pub form: ReportForm,
}

/// Body of `PUT /reports/{id}/status/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ReportStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_value(ReportStatus::InProgress).unwrap(), json!("in-progress"));
        let status: ReportStatus = serde_json::from_value(json!("not-started")).unwrap();
        assert_eq!(status, ReportStatus::NotStarted);
        assert_eq!("Completed".parse::<ReportStatus>().unwrap(), ReportStatus::Completed);
        assert!("done".parse::<ReportStatus>().is_err());
    }

    #[test]
    fn test_form_strings_are_accepted() {
        let stats: MatchStats = serde_json::from_value(json!({
            "possession": "",
            "shots": "12",
            "shotsOnTarget": 5,
            "passes": null,
            "passAccuracy": " 87.5 "
        }))
        .unwrap();
        assert_eq!(stats.possession, None);
        assert_eq!(stats.shots, Some(12.0));
        assert_eq!(stats.shots_on_target, Some(5.0));
        assert_eq!(stats.passes, None);
        assert_eq!(stats.pass_accuracy, Some(87.5));
        assert_eq!(stats.corners, None);
    }

    #[test]
    fn test_non_numeric_stat_is_rejected() {
        let result: Result<MatchStats, _> = serde_json::from_value(json!({ "shots": "lots" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_panel_tolerates_null_images_and_stats() {
        let report: Report = serde_json::from_value(json!({
            "team": 4,
            "panels": {
                "a": { "images": null, "stats": { "xg": null, "ppda": "", "shots": 5 } },
                "b": { "content": null, "stats": null }
            }
        }))
        .unwrap();

        let panels = report.panels.unwrap();
        assert!(panels["a"].images.is_empty());
        assert_eq!(panels["a"].stats.len(), 1);
        assert_eq!(panels["a"].stats["shots"], 5.0);
        assert_eq!(panels["b"], Panel::default());
    }

    #[test]
    fn test_empty_formation_is_unset() {
        let summary: TacticalSummary =
            serde_json::from_value(json!({ "formation": "", "overview": "compact" })).unwrap();
        assert_eq!(summary.formation, None);

        let summary: TacticalSummary =
            serde_json::from_value(json!({ "formation": "4-2-3-1" })).unwrap();
        assert_eq!(summary.formation, Some(Formation::FourTwoThreeOne));
        assert_eq!(serde_json::to_value(Formation::FiveFourOne).unwrap(), json!("5-4-1"));

        let bad: Result<TacticalSummary, _> = serde_json::from_value(json!({ "formation": "2-3-5" }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_default_form_is_a_fresh_draft() {
        let form = ReportForm::default();
        assert_eq!(form.key_players.len(), 1);
        assert_eq!(form.key_players[0].id, 1);
        assert_eq!(form.status, ReportStatus::InProgress);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_next_player_id() {
        let mut form = ReportForm::default();
        form.key_players = vec![KeyPlayer::empty(4), KeyPlayer::empty(2)];
        assert_eq!(form.next_player_id(), 5);
        form.key_players.clear();
        assert_eq!(form.next_player_id(), 1);
    }

    #[test]
    fn test_payload_substitutes_team_id() {
        let payload = ReportForm::default().into_payload(9);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["team_id"], json!(9));
        assert!(value.get("team").is_none());
        assert_eq!(value["status"], json!("in-progress"));
        assert!(value["key_players"].is_array());
    }

    #[test]
    fn test_rating_out_of_range_fails_validation() {
        let mut form = ReportForm::default();
        form.key_players[0].rating = Some(11.0);
        assert!(form.validate().is_err());

        form.key_players[0].rating = Some(7.5);
        form.match_stats.possession = Some(140.0);
        assert!(form.validate().is_err());

        form.match_stats.possession = Some(55.0);
        assert!(form.into_payload(0).validate().is_err());
    }

    #[test]
    fn test_report_missing_status_defaults_to_not_started() {
        let report: Report = serde_json::from_value(json!({ "id": 3, "team": 1 })).unwrap();
        assert_eq!(report.status, ReportStatus::NotStarted);
        assert!(report.is_persisted());
        assert!(report.panels.is_none());
        assert!(report.key_players.is_empty());
    }
}
