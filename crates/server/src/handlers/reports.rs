//! Report handlers
//!
//! Coaches read every report; analysts read and write only their own.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::middleware::AuthUser;
use crate::AppState;
use scoutdeck_common::{
    errors::Result,
    models::{Report, ReportPayload, StatusUpdate},
};

pub async fn list_reports(State(state): State<AppState>, auth: AuthUser) -> Json<Vec<Report>> {
    Json(state.store.reports(&auth).await)
}

pub async fn create_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ReportPayload>,
) -> Result<(StatusCode, Json<Report>)> {
    auth.require_analyst("create reports")?;
    payload.validate()?;

    let report = state.store.create_report(&auth, payload).await?;

    tracing::info!(
        report_id = ?report.id,
        team_id = report.team,
        author = auth.id,
        status = %report.status,
        "Report created"
    );

    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn get_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(report_id): Path<i64>,
) -> Result<Json<Report>> {
    Ok(Json(state.store.report(&auth, report_id).await?))
}

pub async fn update_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(report_id): Path<i64>,
    Json(payload): Json<ReportPayload>,
) -> Result<Json<Report>> {
    auth.require_analyst("edit reports")?;
    payload.validate()?;

    let report = state.store.update_report(&auth, report_id, payload).await?;
    tracing::info!(report_id, status = %report.status, "Report updated");
    Ok(Json(report))
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(report_id): Path<i64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Report>> {
    auth.require_analyst("edit reports")?;
    let report = state.store.set_status(&auth, report_id, update.status).await?;
    tracing::info!(report_id, status = %report.status, "Report status changed");
    Ok(Json(report))
}

pub async fn delete_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(report_id): Path<i64>,
) -> Result<StatusCode> {
    auth.require_analyst("delete reports")?;
    state.store.delete_report(&auth, report_id).await?;
    tracing::info!(report_id, deleted_by = auth.id, "Report deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Reports on one team (all of them for a coach, own for an analyst)
pub async fn team_reports(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<i64>,
) -> Json<Vec<Report>> {
    Json(state.store.team_reports(&auth, team_id).await)
}

/// The caller's own report on a team; 404 when there is none yet
pub async fn my_report_for_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<i64>,
) -> Result<Json<Report>> {
    Ok(Json(state.store.my_report(&auth, team_id).await?))
}
