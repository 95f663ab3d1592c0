//! Report lifecycle: loading, editing and persisting one analyst's report
//!
//! A report moves from an unsaved draft to a persisted `in-progress` record
//! and may be marked `completed`. The transitions are not one-way: setting
//! the status back to `in-progress` and saving again is allowed.
//!
//! The editor is shared (`Arc<ReportEditor<_>>`) between the code that edits
//! the form and the code that triggers saves, so its state lives behind a
//! short-lived lock that is never held across a network call.

use crate::client::ReportsApi;
use crate::completion::tally_panels;
use crate::errors::{AppError, Result};
use crate::metrics::record_save;
use crate::models::{KeyPlayer, Report, ReportForm, ReportStatus, Team};
use crate::overview::team_status;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};
use validator::Validate;

/// Payload fragments that mark a uniqueness violation
const CONFLICT_MARKERS: [&str; 3] = ["unique", "already exists", "already created"];

/// Why a save (or mark-complete) did not persist. The form is kept either way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveFailure {
    /// Rejected before any request was made
    #[error("{message}")]
    Invalid {
        message: String,
        field: Option<String>,
    },

    #[error("A save is already in progress for this report")]
    InFlight,

    #[error("You have already created a report for this team. Please edit your existing report.")]
    Conflict,

    #[error("{0}")]
    Generic(String),

    /// The editor was closed or re-opened while the request was pending
    #[error("The editor was closed before the save finished")]
    Abandoned,

    #[error("No team is open in the editor")]
    NoTeam,
}

impl SaveFailure {
    /// Classify a failed create / update
    pub fn from_error(err: AppError) -> Self {
        if is_conflict(&err) {
            return SaveFailure::Conflict;
        }
        match err {
            AppError::SaveInFlight => SaveFailure::InFlight,
            AppError::Validation { message, field } => SaveFailure::Invalid { message, field },
            AppError::Api { message, .. } => SaveFailure::Generic(message),
            other => SaveFailure::Generic(other.to_string()),
        }
    }

    fn outcome_label(&self) -> &'static str {
        match self {
            SaveFailure::Conflict => "conflict",
            SaveFailure::Invalid { .. } => "invalid",
            SaveFailure::InFlight => "in_flight",
            SaveFailure::Abandoned => "abandoned",
            SaveFailure::Generic(_) | SaveFailure::NoTeam => "error",
        }
    }
}

impl From<SaveFailure> for AppError {
    fn from(failure: SaveFailure) -> Self {
        match failure {
            SaveFailure::Invalid { message, field } => AppError::Validation { message, field },
            SaveFailure::InFlight => AppError::SaveInFlight,
            SaveFailure::Conflict => AppError::Duplicate {
                message: SaveFailure::Conflict.to_string(),
            },
            SaveFailure::NoTeam => AppError::MissingField {
                field: "team_id".to_string(),
            },
            other => AppError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// True when the backend rejected a create because the analyst already has
/// a report for the team
pub fn is_conflict(err: &AppError) -> bool {
    let has_marker = |text: &str| {
        let lowered = text.to_lowercase();
        CONFLICT_MARKERS.iter().any(|marker| lowered.contains(marker))
    };

    match err {
        AppError::DuplicateReport { .. } | AppError::Duplicate { .. } => true,
        AppError::Api {
            status,
            message,
            payload,
        } => *status == 409 || has_marker(message) || has_marker(&payload.to_string()),
        _ => false,
    }
}

#[derive(Debug, Clone, Default)]
struct EditorState {
    team_id: Option<i64>,
    team: Option<Team>,
    report_id: Option<i64>,
    form: ReportForm,
    last_saved: Option<Report>,
    error: Option<String>,
}

/// Clears the in-flight flag when the save finishes or its future is dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> std::result::Result<Self, SaveFailure> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlightGuard(flag))
            .map_err(|_| SaveFailure::InFlight)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Editor for the current analyst's report on one team
pub struct ReportEditor<A: ReportsApi> {
    api: Arc<A>,
    state: Mutex<EditorState>,
    saving: AtomicBool,
    generation: AtomicU64,
}

impl<A: ReportsApi> ReportEditor<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            state: Mutex::new(EditorState::default()),
            saving: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// State lock, provided no `close()` or `open()` happened since `generation`.
    ///
    /// The generation only moves while the state lock is held, so the check
    /// and the write that follows cannot be split by a close.
    fn lock_if_current(&self, generation: u64) -> Option<MutexGuard<'_, EditorState>> {
        let state = self.lock();
        (self.current_generation() == generation).then_some(state)
    }

    /// Load the team and the analyst's report for it.
    ///
    /// Both requests run concurrently. A missing report yields a fresh draft;
    /// a failed team lookup falls back to a placeholder team. Opening a team
    /// abandons whatever the editor was doing for the previous one.
    pub async fn open(&self, team_id: i64) -> Result<()> {
        let generation = {
            let mut state = self.lock();
            *state = EditorState {
                team_id: Some(team_id),
                ..Default::default()
            };
            self.generation.fetch_add(1, Ordering::AcqRel) + 1
        };

        let (team, report) = tokio::join!(
            self.api.get_team(team_id),
            self.api.my_report_for_team(team_id)
        );

        let Some(mut state) = self.lock_if_current(generation) else {
            debug!(team_id, "Discarding load for a closed editor");
            return Ok(());
        };

        let team = team.unwrap_or_else(|e| {
            warn!(team_id, error = %e, "Team lookup failed, using placeholder");
            Team::placeholder(team_id)
        });
        state.team = Some(team);
        match report {
            Ok(Some(report)) => {
                debug!(team_id, report_id = ?report.id, "Loaded existing report");
                state.report_id = report.id;
                state.form = ReportForm::from_report(&report);
                state.last_saved = Some(report);
                Ok(())
            }
            Ok(None) => {
                debug!(team_id, "No report yet, starting a draft");
                Ok(())
            }
            Err(e) => {
                warn!(team_id, error = %e, "Failed to load report");
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Abandon the editor; pending responses will not touch its state
    pub fn close(&self) {
        let mut state = self.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        *state = EditorState::default();
    }

    pub fn team_id(&self) -> Option<i64> {
        self.lock().team_id
    }

    pub fn team(&self) -> Option<Team> {
        self.lock().team.clone()
    }

    pub fn report_id(&self) -> Option<i64> {
        self.lock().report_id
    }

    /// Copy of the in-memory form
    pub fn form(&self) -> ReportForm {
        self.lock().form.clone()
    }

    /// The record as last returned by the backend
    pub fn last_saved(&self) -> Option<Report> {
        self.lock().last_saved.clone()
    }

    /// Message from the last failed load or save
    pub fn last_error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// Completion of the form's panels, as the list views would show it
    pub fn completion(&self) -> u8 {
        self.lock()
            .form
            .panels
            .as_ref()
            .map_or(0, |panels| tally_panels(panels).percent())
    }

    /// Edit the form in place (local only until the next save)
    pub fn update<R>(&self, edit: impl FnOnce(&mut ReportForm) -> R) -> R {
        edit(&mut self.lock().form)
    }

    /// Replace the whole form
    pub fn set_form(&self, form: ReportForm) {
        self.lock().form = form;
    }

    pub fn set_status(&self, status: ReportStatus) {
        self.lock().form.status = status;
    }

    /// Append a blank player row and return its id
    pub fn add_player(&self) -> u32 {
        let mut state = self.lock();
        let id = state.form.next_player_id();
        state.form.key_players.push(KeyPlayer::empty(id));
        id
    }

    pub fn remove_player(&self, index: usize) -> Option<KeyPlayer> {
        let mut state = self.lock();
        if index < state.form.key_players.len() {
            Some(state.form.key_players.remove(index))
        } else {
            None
        }
    }

    /// Persist the form with its current status.
    ///
    /// Creates the report when it has no id yet, updates it otherwise.
    pub async fn save(&self) -> std::result::Result<Report, SaveFailure> {
        let guard = InFlightGuard::acquire(&self.saving)?;
        self.persist(&guard).await
    }

    /// Set the status to `completed`, then save. No field is required first.
    ///
    /// The form is left untouched when another save is already running.
    pub async fn mark_complete(&self) -> std::result::Result<Report, SaveFailure> {
        let guard = InFlightGuard::acquire(&self.saving)?;
        self.set_status(ReportStatus::Completed);
        self.persist(&guard).await
    }

    async fn persist(&self, _guard: &InFlightGuard<'_>) -> std::result::Result<Report, SaveFailure> {
        let (generation, team_id, report_id, form) = {
            let state = self.lock();
            let team_id = state.team_id.ok_or(SaveFailure::NoTeam)?;
            (self.current_generation(), team_id, state.report_id, state.form.clone())
        };
        let created = report_id.is_none();

        let payload = form.into_payload(team_id);
        if let Err(errors) = payload.validate() {
            let failure = SaveFailure::from_error(errors.into());
            record_save(failure.outcome_label(), created);
            if let Some(mut state) = self.lock_if_current(generation) {
                state.error = Some(failure.to_string());
            }
            return Err(failure);
        }

        let result = match report_id {
            None => self.api.create_report(&payload).await,
            Some(id) => self.api.update_report(id, &payload).await,
        };

        let Some(mut state) = self.lock_if_current(generation) else {
            debug!(team_id, "Discarding save response for a closed editor");
            record_save(SaveFailure::Abandoned.outcome_label(), created);
            return Err(SaveFailure::Abandoned);
        };

        match result {
            Ok(report) => {
                info!(
                    team_id,
                    report_id = ?report.id,
                    status = %report.status,
                    created,
                    "Report saved"
                );
                record_save("success", created);
                state.report_id = report.id.or(report_id);
                state.last_saved = Some(report.clone());
                state.error = None;
                Ok(report)
            }
            Err(e) => {
                let failure = SaveFailure::from_error(e);
                warn!(team_id, error = %failure, "Report save failed");
                record_save(failure.outcome_label(), created);
                state.error = Some(failure.to_string());
                Err(failure)
            }
        }
    }
}

/// One row of the analyst dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStatusRow {
    pub team: Team,
    pub status: ReportStatus,
    pub report_count: usize,
}

/// Status of every team, from the reports filed on each.
///
/// Per-team lookups run concurrently; a failed lookup shows the team as not
/// started rather than failing the whole dashboard.
pub async fn team_dashboard<A: ReportsApi + ?Sized>(api: &A) -> Result<Vec<TeamStatusRow>> {
    let teams = api.list_teams().await?;
    let lookups = teams.iter().map(|team| api.team_reports(team.id));
    let results = futures::future::join_all(lookups).await;

    Ok(teams
        .into_iter()
        .zip(results)
        .map(|(team, reports)| {
            let reports = reports.unwrap_or_else(|e| {
                warn!(team_id = team.id, error = %e, "Failed to load team reports");
                Vec::new()
            });
            TeamStatusRow {
                status: team_status(&reports),
                report_count: reports.len(),
                team,
            }
        })
        .collect())
}
