//! Activity feed (the client's notifications)

use axum::{extract::State, Json};

use crate::middleware::AuthUser;
use crate::AppState;
use scoutdeck_common::models::Activity;

pub async fn list_activities(State(state): State<AppState>, auth: AuthUser) -> Json<Vec<Activity>> {
    Json(state.store.activities(&auth).await)
}
