//! In-memory persistence for the reference backend
//!
//! One lock guards all tables so that multi-table rules (one report per
//! team and author, cascading team deletes) are checked and applied
//! atomically.

use crate::middleware::AuthUser;
use chrono::Utc;
use scoutdeck_common::errors::{AppError, Result};
use scoutdeck_common::models::{
    Activity, ActivityVerb, RegisterRequest, Report, ReportPayload, ReportStatus, Role, Team,
    TeamInput, User,
};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// Clubs available out of the box: (name, primary color)
const PREMIER_LEAGUE_CLUBS: [(&str, &str); 20] = [
    ("Arsenal", "#EF0107"),
    ("Aston Villa", "#670E36"),
    ("Bournemouth", "#DA291C"),
    ("Brentford", "#E30613"),
    ("Brighton & Hove Albion", "#0057B8"),
    ("Chelsea", "#034694"),
    ("Crystal Palace", "#1B458F"),
    ("Everton", "#003399"),
    ("Fulham", "#000000"),
    ("Ipswich Town", "#3A64A3"),
    ("Leicester City", "#003090"),
    ("Liverpool", "#C8102E"),
    ("Manchester City", "#6CABDD"),
    ("Manchester United", "#DA291C"),
    ("Newcastle United", "#241F20"),
    ("Nottingham Forest", "#DD0000"),
    ("Southampton", "#D71920"),
    ("Tottenham Hotspur", "#132257"),
    ("West Ham United", "#7A263A"),
    ("Wolverhampton Wanderers", "#FDB913"),
];

pub const PREMIER_LEAGUE: &str = "Premier League";

/// Most recent activities returned by the feed
pub const ACTIVITY_FEED_LIMIT: usize = 50;

struct StoredUser {
    user: User,
    password_hash: String,
}

struct StoredActivity {
    activity: Activity,
    /// Author of the report the activity concerns
    report_author: i64,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, StoredUser>,
    teams: BTreeMap<i64, Team>,
    reports: BTreeMap<i64, Report>,
    activities: Vec<StoredActivity>,
    next_user_id: i64,
    next_team_id: i64,
    next_report_id: i64,
    next_activity_id: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn team(&self, team_id: i64) -> Result<&Team> {
        self.teams.get(&team_id).ok_or_else(|| AppError::TeamNotFound {
            id: team_id.to_string(),
        })
    }

    fn display_name(&self, user_id: i64) -> String {
        self.users
            .get(&user_id)
            .map(|stored| stored.user.display_name())
            .unwrap_or_default()
    }

    /// Fill in the read-only joined fields
    fn hydrate(&self, report: &Report) -> Report {
        let team = self.teams.get(&report.team);
        Report {
            team_name: team.map(|t| t.name.clone()),
            team_logo: team.map(|t| t.logo.clone()).filter(|logo| !logo.is_empty()),
            author_name: report.author.map(|id| self.display_name(id)),
            ..report.clone()
        }
    }

    fn visible(report: &Report, caller: &AuthUser) -> bool {
        caller.role == Role::Coach || report.author == Some(caller.id)
    }

    /// A report the caller may see; others' reports do not exist for an analyst
    fn visible_report(&self, caller: &AuthUser, report_id: i64) -> Result<&Report> {
        self.reports
            .get(&report_id)
            .filter(|report| Self::visible(report, caller))
            .ok_or_else(|| AppError::ReportNotFound {
                id: report_id.to_string(),
            })
    }

    /// A report the caller may modify
    fn owned_report(&self, caller: &AuthUser, report_id: i64) -> Result<&Report> {
        let report = self.visible_report(caller, report_id)?;
        if report.author != Some(caller.id) {
            return Err(AppError::Forbidden {
                message: "You do not have permission to perform this action.".to_string(),
            });
        }
        Ok(report)
    }

    fn has_report(&self, author: i64, team_id: i64, except: Option<i64>) -> bool {
        self.reports
            .values()
            .any(|r| r.author == Some(author) && r.team == team_id && r.id != except)
    }

    fn sorted(&self, reports: impl Iterator<Item = Report>) -> Vec<Report> {
        let mut reports: Vec<Report> = reports.map(|r| self.hydrate(&r)).collect();
        reports.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        reports
    }

    fn record(&mut self, actor: i64, verb: ActivityVerb, report: &Report) {
        let actor_name = self.display_name(actor);
        let team_name = self
            .teams
            .get(&report.team)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "an unknown team".to_string());
        let action = match verb {
            ActivityVerb::Created => "created a report on",
            ActivityVerb::Updated => "updated the report on",
            ActivityVerb::Completed => "completed the report on",
            ActivityVerb::Deleted => "deleted the report on",
        };

        let activity = Activity {
            id: next(&mut self.next_activity_id),
            message: format!("{} {} {}", actor_name, action, team_name),
            actor: actor_name,
            verb,
            report_id: report.id,
            team_id: Some(report.team),
            created_at: Utc::now(),
        };
        self.activities.push(StoredActivity {
            activity,
            report_author: report.author.unwrap_or(actor),
        });
        self.prune_activities();
    }

    /// Keep only what some feed can still show: the newest entries overall
    /// and each author's newest entries, `ACTIVITY_FEED_LIMIT` of each.
    fn prune_activities(&mut self) {
        let total = self.activities.len();
        if total <= ACTIVITY_FEED_LIMIT {
            return;
        }

        let mut per_author: BTreeMap<i64, usize> = BTreeMap::new();
        let mut keep = vec![false; total];
        for (age, index) in (0..total).rev().enumerate() {
            let seen = per_author.entry(self.activities[index].report_author).or_default();
            *seen += 1;
            keep[index] = age < ACTIVITY_FEED_LIMIT || *seen <= ACTIVITY_FEED_LIMIT;
        }

        let mut keep = keep.into_iter();
        self.activities.retain(|_| keep.next().unwrap_or(true));
    }
}

fn apply_payload(report: &mut Report, payload: ReportPayload) {
    let form = payload.form;
    report.team = payload.team_id;
    report.status = form.status;
    report.key_players = form.key_players;
    report.match_stats = form.match_stats;
    report.tactical_summary = form.tactical_summary;
    report.performance_insights = form.performance_insights;
    report.panels = form.panels;
    report.updated_at = Some(Utc::now());
}

/// Verb for a write that moved a report from `before` to `after`
fn write_verb(before: ReportStatus, after: ReportStatus) -> ActivityVerb {
    if after == ReportStatus::Completed && before != ReportStatus::Completed {
        ActivityVerb::Completed
    } else {
        ActivityVerb::Updated
    }
}

pub struct Store {
    tables: RwLock<Tables>,
}

impl Store {
    /// Store pre-populated with the Premier League clubs
    pub fn seeded() -> Self {
        let mut tables = Tables::default();
        for (name, color) in PREMIER_LEAGUE_CLUBS {
            let id = next(&mut tables.next_team_id);
            let now = Utc::now();
            tables.teams.insert(
                id,
                Team {
                    id,
                    name: name.to_string(),
                    logo: String::new(),
                    color: color.to_string(),
                    league: PREMIER_LEAGUE.to_string(),
                    created_by: None,
                    created_at: Some(now),
                    updated_at: Some(now),
                },
            );
        }
        Self {
            tables: RwLock::new(tables),
        }
    }

    // =====================================
    // Users
    // =====================================

    pub async fn create_user(&self, request: &RegisterRequest, password_hash: String) -> Result<User> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .users
            .values()
            .any(|stored| stored.user.username.eq_ignore_ascii_case(&request.username));
        if taken {
            return Err(AppError::Validation {
                message: "A user with that username already exists.".to_string(),
                field: Some("username".to_string()),
            });
        }

        let user = User {
            id: next(&mut tables.next_user_id),
            username: request.username.clone(),
            email: request.email.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            role: request.role,
        };
        tables.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }

    /// User and stored password hash for a login attempt
    pub async fn credentials(&self, username: &str) -> Option<(User, String)> {
        let tables = self.tables.read().await;
        tables
            .users
            .values()
            .find(|stored| stored.user.username.eq_ignore_ascii_case(username))
            .map(|stored| (stored.user.clone(), stored.password_hash.clone()))
    }

    pub async fn user(&self, user_id: i64) -> Option<User> {
        let tables = self.tables.read().await;
        tables.users.get(&user_id).map(|stored| stored.user.clone())
    }

    // =====================================
    // Teams
    // =====================================

    pub async fn teams(&self) -> Vec<Team> {
        let tables = self.tables.read().await;
        let mut teams: Vec<Team> = tables.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        teams
    }

    pub async fn team(&self, team_id: i64) -> Result<Team> {
        let tables = self.tables.read().await;
        tables.team(team_id).cloned()
    }

    pub async fn create_team(&self, input: TeamInput, created_by: i64) -> Result<Team> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let team = Team {
            id: next(&mut tables.next_team_id),
            name: input.name,
            logo: input.logo,
            color: input.color,
            league: input.league,
            created_by: Some(created_by),
            created_at: Some(now),
            updated_at: Some(now),
        };
        tables.teams.insert(team.id, team.clone());
        Ok(team)
    }

    pub async fn update_team(&self, team_id: i64, input: TeamInput) -> Result<Team> {
        let mut tables = self.tables.write().await;
        let team = tables.teams.get_mut(&team_id).ok_or_else(|| AppError::TeamNotFound {
            id: team_id.to_string(),
        })?;
        team.name = input.name;
        team.logo = input.logo;
        team.color = input.color;
        team.league = input.league;
        team.updated_at = Some(Utc::now());
        Ok(team.clone())
    }

    /// Remove a team and every report filed on it
    pub async fn delete_team(&self, team_id: i64) -> Result<usize> {
        let mut tables = self.tables.write().await;
        tables.team(team_id)?;
        tables.teams.remove(&team_id);
        let before = tables.reports.len();
        tables.reports.retain(|_, report| report.team != team_id);
        Ok(before - tables.reports.len())
    }

    pub async fn leagues(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        tables
            .teams
            .values()
            .map(|team| team.league.clone())
            .filter(|league| !league.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    // =====================================
    // Reports
    // =====================================

    /// Coaches see every report, analysts their own; newest first
    pub async fn reports(&self, caller: &AuthUser) -> Vec<Report> {
        let tables = self.tables.read().await;
        tables.sorted(
            tables
                .reports
                .values()
                .filter(|report| Tables::visible(report, caller))
                .cloned(),
        )
    }

    pub async fn team_reports(&self, caller: &AuthUser, team_id: i64) -> Vec<Report> {
        let tables = self.tables.read().await;
        tables.sorted(
            tables
                .reports
                .values()
                .filter(|report| report.team == team_id && Tables::visible(report, caller))
                .cloned(),
        )
    }

    pub async fn report(&self, caller: &AuthUser, report_id: i64) -> Result<Report> {
        let tables = self.tables.read().await;
        let report = tables.visible_report(caller, report_id)?;
        Ok(tables.hydrate(report))
    }

    /// The caller's own report on a team
    pub async fn my_report(&self, caller: &AuthUser, team_id: i64) -> Result<Report> {
        let tables = self.tables.read().await;
        tables
            .reports
            .values()
            .find(|report| report.team == team_id && report.author == Some(caller.id))
            .map(|report| tables.hydrate(report))
            .ok_or_else(|| AppError::NotFound {
                resource_type: "report".to_string(),
                id: format!("team {}", team_id),
            })
    }

    pub async fn create_report(&self, caller: &AuthUser, payload: ReportPayload) -> Result<Report> {
        let mut tables = self.tables.write().await;
        let team_id = payload.team_id;
        if tables.team(team_id).is_err() {
            return Err(AppError::Validation {
                message: format!("Invalid team {}", team_id),
                field: Some("team_id".to_string()),
            });
        }
        if tables.has_report(caller.id, team_id, None) {
            return Err(AppError::DuplicateReport { team_id });
        }

        let now = Utc::now();
        let id = next(&mut tables.next_report_id);
        let mut report = Report {
            id: Some(id),
            author: Some(caller.id),
            created_at: Some(now),
            ..Default::default()
        };
        apply_payload(&mut report, payload);

        let verb = match report.status {
            ReportStatus::Completed => ActivityVerb::Completed,
            _ => ActivityVerb::Created,
        };
        tables.record(caller.id, verb, &report);
        tables.reports.insert(id, report.clone());
        Ok(tables.hydrate(&report))
    }

    pub async fn update_report(
        &self,
        caller: &AuthUser,
        report_id: i64,
        payload: ReportPayload,
    ) -> Result<Report> {
        let mut tables = self.tables.write().await;
        let mut report = tables.owned_report(caller, report_id)?.clone();
        if payload.team_id != report.team {
            tables.team(payload.team_id).map_err(|_| AppError::Validation {
                message: format!("Invalid team {}", payload.team_id),
                field: Some("team_id".to_string()),
            })?;
            if tables.has_report(caller.id, payload.team_id, Some(report_id)) {
                return Err(AppError::DuplicateReport {
                    team_id: payload.team_id,
                });
            }
        }

        let before = report.status;
        apply_payload(&mut report, payload);
        tables.record(caller.id, write_verb(before, report.status), &report);
        tables.reports.insert(report_id, report.clone());
        Ok(tables.hydrate(&report))
    }

    pub async fn set_status(&self, caller: &AuthUser, report_id: i64, status: ReportStatus) -> Result<Report> {
        let mut tables = self.tables.write().await;
        let mut report = tables.owned_report(caller, report_id)?.clone();
        let before = report.status;
        report.status = status;
        report.updated_at = Some(Utc::now());
        tables.record(caller.id, write_verb(before, status), &report);
        tables.reports.insert(report_id, report.clone());
        Ok(tables.hydrate(&report))
    }

    pub async fn delete_report(&self, caller: &AuthUser, report_id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        let report = tables.owned_report(caller, report_id)?.clone();
        tables.reports.remove(&report_id);
        tables.record(caller.id, ActivityVerb::Deleted, &report);
        Ok(())
    }

    // =====================================
    // Activities
    // =====================================

    /// Newest first; analysts only see activity on their own reports
    pub async fn activities(&self, caller: &AuthUser) -> Vec<Activity> {
        let tables = self.tables.read().await;
        tables
            .activities
            .iter()
            .rev()
            .filter(|stored| caller.role == Role::Coach || stored.report_author == caller.id)
            .take(ACTIVITY_FEED_LIMIT)
            .map(|stored| stored.activity.clone())
            .collect()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoutdeck_common::models::ReportForm;

    fn caller(id: i64, role: Role) -> AuthUser {
        AuthUser { id, role }
    }

    async fn store_with_users() -> Store {
        let store = Store::seeded();
        for (name, role) in [("ana", Role::Analyst), ("ben", Role::Analyst), ("cole", Role::Coach)] {
            let request = RegisterRequest {
                username: name.to_string(),
                email: format!("{}@club.example", name),
                password: "password123".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                role,
            };
            store.create_user(&request, "hash".to_string()).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_seeded_teams_and_leagues() {
        let store = Store::seeded();
        let teams = store.teams().await;
        assert_eq!(teams.len(), 20);
        assert_eq!(teams[0].name, "Arsenal");
        assert_eq!(store.leagues().await, vec![PREMIER_LEAGUE.to_string()]);
    }

    #[tokio::test]
    async fn test_username_is_unique() {
        let store = store_with_users().await;
        let request = RegisterRequest {
            username: "ANA".to_string(),
            email: "other@club.example".to_string(),
            password: "password123".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            role: Role::Analyst,
        };
        assert!(matches!(
            store.create_user(&request, "hash".into()).await,
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_one_report_per_team_and_author() {
        let store = store_with_users().await;
        let ana = caller(1, Role::Analyst);
        let ben = caller(2, Role::Analyst);

        store.create_report(&ana, ReportForm::default().into_payload(3)).await.unwrap();
        let second = store.create_report(&ana, ReportForm::default().into_payload(3)).await;
        assert!(matches!(second, Err(AppError::DuplicateReport { team_id: 3 })));

        // a different analyst may report on the same team
        store.create_report(&ben, ReportForm::default().into_payload(3)).await.unwrap();
    }

    #[tokio::test]
    async fn test_visibility_by_role() {
        let store = store_with_users().await;
        let ana = caller(1, Role::Analyst);
        let ben = caller(2, Role::Analyst);
        let cole = caller(3, Role::Coach);

        let report = store.create_report(&ana, ReportForm::default().into_payload(1)).await.unwrap();
        let id = report.id.unwrap();
        assert_eq!(report.team_name.as_deref(), Some("Arsenal"));
        assert_eq!(report.author_name.as_deref(), Some("ana"));

        assert_eq!(store.reports(&ana).await.len(), 1);
        assert!(store.reports(&ben).await.is_empty());
        assert_eq!(store.reports(&cole).await.len(), 1);

        assert!(matches!(store.report(&ben, id).await, Err(AppError::ReportNotFound { .. })));
        assert!(store.report(&cole, id).await.is_ok());
        assert!(matches!(
            store.delete_report(&cole, id).await,
            Err(AppError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_completion_activity_and_cascade() {
        let store = store_with_users().await;
        let ana = caller(1, Role::Analyst);
        let cole = caller(3, Role::Coach);

        let report = store.create_report(&ana, ReportForm::default().into_payload(2)).await.unwrap();
        let id = report.id.unwrap();
        store.set_status(&ana, id, ReportStatus::Completed).await.unwrap();

        let feed = store.activities(&cole).await;
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].verb, ActivityVerb::Completed);
        assert_eq!(feed[1].verb, ActivityVerb::Created);
        assert!(feed[1].message.contains("Aston Villa"));
        assert!(store.activities(&caller(2, Role::Analyst)).await.is_empty());

        assert_eq!(store.delete_team(2).await.unwrap(), 1);
        assert!(store.reports(&cole).await.is_empty());
        assert!(matches!(store.team(2).await, Err(AppError::TeamNotFound { .. })));
    }

    #[tokio::test]
    async fn test_activity_history_is_bounded() {
        let store = store_with_users().await;
        let ana = caller(1, Role::Analyst);
        let ben = caller(2, Role::Analyst);
        let cole = caller(3, Role::Coach);

        store.create_report(&ana, ReportForm::default().into_payload(1)).await.unwrap();
        let report = store.create_report(&ben, ReportForm::default().into_payload(2)).await.unwrap();
        let id = report.id.unwrap();
        for _ in 0..ACTIVITY_FEED_LIMIT + 20 {
            store
                .update_report(&ben, id, ReportForm::default().into_payload(2))
                .await
                .unwrap();
        }

        assert_eq!(store.activities(&cole).await.len(), ACTIVITY_FEED_LIMIT);
        assert_eq!(store.activities(&ben).await.len(), ACTIVITY_FEED_LIMIT);
        // ana's only entry fell out of the shared window but is still hers to see
        let own = store.activities(&ana).await;
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].verb, ActivityVerb::Created);

        assert_eq!(store.tables.read().await.activities.len(), ACTIVITY_FEED_LIMIT + 1);
    }

    #[tokio::test]
    async fn test_my_report_missing_is_not_found() {
        let store = store_with_users().await;
        let err = store.my_report(&caller(1, Role::Analyst), 5).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
