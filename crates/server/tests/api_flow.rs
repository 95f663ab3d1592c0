//! End-to-end flows: the API client and report editor against a live server

use scoutdeck_common::{
    auth::Session,
    config::AppConfig,
    errors::AppError,
    lifecycle::{team_dashboard, SaveFailure},
    models::{ActivityVerb, AuthTokens, RegisterRequest, ReportForm, ReportStatus, Role},
    polling::NotificationPoller,
    ApiClient, ReportEditor, SessionStore,
};
use scoutdeck_server::{create_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn spawn_server() -> String {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some("integration-secret".to_string());
    let app = create_router(AppState::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn client(base_url: &str) -> Arc<ApiClient> {
    Arc::new(
        ApiClient::new(base_url, Duration::from_secs(5), Arc::new(SessionStore::in_memory())).unwrap(),
    )
}

async fn registered(base_url: &str, username: &str, role: Role) -> Arc<ApiClient> {
    let api = client(base_url);
    api.register(&RegisterRequest {
        username: username.to_string(),
        email: format!("{}@club.example", username),
        password: "correct-horse".to_string(),
        first_name: String::new(),
        last_name: String::new(),
        role,
    })
    .await
    .unwrap();
    api
}

#[tokio::test]
async fn test_report_lifecycle_end_to_end() {
    let base = spawn_server().await;
    let analyst = registered(&base, "ana", Role::Analyst).await;

    let editor = ReportEditor::new(analyst.clone());
    editor.open(1).await.unwrap();
    assert_eq!(editor.team().unwrap().name, "Arsenal");
    assert_eq!(editor.report_id(), None);
    assert!(editor.last_error().is_none());

    editor.update(|form| {
        form.key_players[0].name = "Bukayo Saka".into();
        form.key_players[0].position = "RW".into();
        form.key_players[0].rating = Some(8.5);
        form.match_stats.possession = Some(58.0);
    });

    let created = editor.save().await.unwrap();
    assert_eq!(created.status, ReportStatus::InProgress);
    assert_eq!(created.team_name.as_deref(), Some("Arsenal"));

    let updated = editor.save().await.unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.key_players, created.key_players);
    assert_eq!(updated.match_stats, created.match_stats);
    assert_eq!(updated.status, created.status);
    assert!(updated.updated_at >= created.updated_at);

    let completed = editor.mark_complete().await.unwrap();
    assert_eq!(completed.status, ReportStatus::Completed);

    // completed is not terminal
    editor.set_status(ReportStatus::InProgress);
    let reopened = editor.save().await.unwrap();
    assert_eq!(reopened.status, ReportStatus::InProgress);

    // a coach sees the analyst's report
    let coach = registered(&base, "cole", Role::Coach).await;
    let reports = coach.list_reports().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].author_name.as_deref(), Some("ana"));

    let dashboard = team_dashboard(coach.as_ref()).await.unwrap();
    assert_eq!(dashboard.len(), 20);
    let arsenal = dashboard.iter().find(|row| row.team.id == 1).unwrap();
    assert_eq!(arsenal.status, ReportStatus::InProgress);
    assert_eq!(arsenal.report_count, 1);
}

#[tokio::test]
async fn test_missing_report_is_empty_state() {
    let base = spawn_server().await;
    let analyst = registered(&base, "ana", Role::Analyst).await;

    assert!(analyst.my_report_for_team(4).await.unwrap().is_none());
    assert!(matches!(
        analyst.get_report(999).await,
        Err(AppError::ReportNotFound { .. })
    ));
}

#[tokio::test]
async fn test_second_report_for_team_is_conflict() {
    let base = spawn_server().await;
    let analyst = registered(&base, "ana", Role::Analyst).await;

    let first = ReportEditor::new(analyst.clone());
    let second = ReportEditor::new(analyst.clone());
    first.open(3).await.unwrap();
    second.open(3).await.unwrap();

    first.save().await.unwrap();
    let failure = second.save().await.unwrap_err();
    assert_eq!(failure, SaveFailure::Conflict);
    assert_eq!(
        failure.to_string(),
        "You have already created a report for this team. Please edit your existing report."
    );

    // another analyst is unaffected
    let other = registered(&base, "ben", Role::Analyst).await;
    let editor = ReportEditor::new(other);
    editor.open(3).await.unwrap();
    assert!(editor.save().await.is_ok());
}

#[tokio::test]
async fn test_coach_cannot_create_reports() {
    let base = spawn_server().await;
    let coach = registered(&base, "cole", Role::Coach).await;

    let editor = ReportEditor::new(coach);
    editor.open(2).await.unwrap();
    match editor.save().await.unwrap_err() {
        SaveFailure::Generic(message) => assert!(message.contains("Only analysts can create reports")),
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_rejects_invalid_payload() {
    let base = spawn_server().await;
    let analyst = registered(&base, "ana", Role::Analyst).await;

    let mut form = ReportForm::default();
    form.key_players[0].rating = Some(11.0);
    let err = analyst.create_report(&form.into_payload(1)).await.unwrap_err();
    assert!(matches!(err, AppError::Api { status: 400, .. }));
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed() {
    let base = spawn_server().await;
    let analyst = registered(&base, "ana", Role::Analyst).await;

    let session = analyst.session().get().unwrap();
    analyst
        .session()
        .replace(session.with_access("not-a-valid-token".to_string()))
        .unwrap();

    let me = analyst.current_user().await.unwrap();
    assert_eq!(me.username, "ana");
    let refreshed = analyst.session().get().unwrap();
    assert_ne!(refreshed.tokens.access, "not-a-valid-token");
    assert_eq!(refreshed.tokens.refresh, session.tokens.refresh);
}

#[tokio::test]
async fn test_failed_refresh_clears_session() {
    let base = spawn_server().await;
    let api = client(&base);
    api.session()
        .replace(Session::new(
            AuthTokens {
                access: "bogus".to_string(),
                refresh: Some("also-bogus".to_string()),
            },
            None,
        ))
        .unwrap();

    let err = api.list_reports().await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized { .. }));
    assert!(!api.session().is_authenticated());
}

#[tokio::test]
async fn test_login_and_bad_password() {
    let base = spawn_server().await;
    registered(&base, "ana", Role::Analyst).await;

    let api = client(&base);
    assert!(matches!(
        api.login("ana", "wrong-password").await,
        Err(AppError::InvalidCredentials)
    ));
    assert!(!api.session().is_authenticated());

    let user = api.login("ana", "correct-horse").await.unwrap();
    assert_eq!(user.role, Role::Analyst);
    assert!(api.session().is_authenticated());

    api.logout().unwrap();
    assert!(matches!(
        api.current_user().await,
        Err(AppError::Unauthorized { .. })
    ));
}

#[tokio::test]
async fn test_delete_report() {
    let base = spawn_server().await;
    let analyst = registered(&base, "ana", Role::Analyst).await;

    let created = analyst
        .create_report(&ReportForm::default().into_payload(5))
        .await
        .unwrap();
    let id = created.id.unwrap();

    let coach = registered(&base, "cole", Role::Coach).await;
    assert!(matches!(
        coach.delete_report(id).await,
        Err(AppError::Api { status: 403, .. })
    ));

    analyst.delete_report(id).await.unwrap();
    assert!(matches!(
        analyst.get_report(id).await,
        Err(AppError::ReportNotFound { .. })
    ));
    assert!(analyst.list_reports().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_notifications_follow_report_activity() {
    let base = spawn_server().await;
    let analyst = registered(&base, "ana", Role::Analyst).await;
    let coach = registered(&base, "cole", Role::Coach).await;

    let created = analyst
        .create_report(&ReportForm::default().into_payload(6))
        .await
        .unwrap();
    analyst
        .update_report_status(created.id.unwrap(), ReportStatus::Completed)
        .await
        .unwrap();

    let handle = NotificationPoller::new(coach)
        .with_interval(Duration::from_millis(50))
        .start();
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|state| !state.loading))
        .await
        .unwrap()
        .unwrap();

    let state = handle.current();
    assert!(state.last_error.is_none());
    assert_eq!(state.activities.len(), 2);
    assert_eq!(state.activities[0].verb, ActivityVerb::Completed);
    assert!(state.activities[1].message.contains("Chelsea"));
    handle.stop();
}
