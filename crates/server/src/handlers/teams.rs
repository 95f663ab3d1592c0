//! Team handlers

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
    models::{Team, TeamInput},
};

pub async fn list_teams(State(state): State<AppState>, _auth: AuthUser) -> Json<Vec<Team>> {
    Json(state.store.teams().await)
}

pub async fn get_team(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(team_id): Path<i64>,
) -> Result<Json<Team>> {
    Ok(Json(state.store.team(team_id).await?))
}

pub async fn create_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<TeamInput>,
) -> Result<(StatusCode, Json<Team>)> {
    input.validate()?;
    let team = state.store.create_team(input, auth.id).await?;
    tracing::info!(team_id = team.id, name = %team.name, created_by = auth.id, "Team created");
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn update_team(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(team_id): Path<i64>,
    Json(input): Json<TeamInput>,
) -> Result<Json<Team>> {
    input.validate()?;
    Ok(Json(state.store.update_team(team_id, input).await?))
}

/// Delete a team and, with it, every report on it
pub async fn delete_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<i64>,
) -> Result<StatusCode> {
    let removed = state.store.delete_team(team_id).await?;
    tracing::info!(team_id, reports_removed = removed, deleted_by = auth.id, "Team deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_leagues(State(state): State<AppState>, _auth: AuthUser) -> Json<Vec<String>> {
    Json(state.store.leagues().await)
}
